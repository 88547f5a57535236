//! The process-wide, read-only registry of resource definitions.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use super::ResourceDefinition;
use crate::Error;

static GLOBAL: OnceLock<ResourceRegistry> = OnceLock::new();

/// Resource definitions keyed by name, with a reference key index.
///
/// Built once at startup and never mutated afterwards. Names and reference
/// keys must be unique.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    by_name: BTreeMap<String, Arc<ResourceDefinition>>,
    by_reference: BTreeMap<String, Arc<ResourceDefinition>>,
}

impl ResourceRegistry {
    /// Builds a registry.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error on a duplicate name or reference key.
    pub fn new<I>(definitions: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = ResourceDefinition>,
    {
        let mut registry = Self::default();
        for definition in definitions {
            let definition = Arc::new(definition);

            if let Some(key) = definition.reference_key() {
                if registry.by_reference.contains_key(key) {
                    return Err(Error::configuration(format!(
                        "Duplicate resource reference key `{}`",
                        key
                    )));
                }
                registry
                    .by_reference
                    .insert(key.to_owned(), Arc::clone(&definition));
            }

            if registry
                .by_name
                .insert(definition.name().to_owned(), Arc::clone(&definition))
                .is_some()
            {
                return Err(Error::configuration(format!(
                    "Duplicate resource name `{}`",
                    definition.name()
                )));
            }
        }
        Ok(registry)
    }

    /// Installs this registry as the process-wide one.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if a registry is already installed.
    pub fn install(self) -> Result<&'static ResourceRegistry, Error> {
        let mut fresh = Some(self);
        let installed = GLOBAL.get_or_init(|| fresh.take().unwrap_or_default());
        if fresh.is_some() {
            return Err(Error::configuration("Resource registry is already installed"));
        }
        tracing::debug!(resources = installed.len(), "resource registry installed");
        Ok(installed)
    }

    /// Returns the process-wide registry, if installed.
    pub fn global() -> Option<&'static ResourceRegistry> {
        GLOBAL.get()
    }

    /// Looks up a definition by resource name.
    pub fn get(&self, name: &str) -> Option<&ResourceDefinition> {
        self.by_name.get(name).map(Arc::as_ref)
    }

    /// Resolves a cross-resource reference key.
    pub fn by_reference_key(&self, key: &str) -> Option<&ResourceDefinition> {
        self.by_reference.get(key).map(Arc::as_ref)
    }

    /// Iterates over definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceDefinition> {
        self.by_name.values().map(Arc::as_ref)
    }

    /// Returns the number of definitions.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns `true` if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
