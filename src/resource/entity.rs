//! Wire shapes of server entities and paginated lists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Opaque invocation handle of an action, normally a URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionHandle(String);

impl ActionHandle {
    /// Creates a handle.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Returns the handle as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActionHandle {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ActionHandle {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The `@actions` object of an entity: action name to handle.
///
/// A key being present is the only authorization signal; the server omits
/// actions the caller may not perform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityMap(BTreeMap<String, ActionHandle>);

impl CapabilityMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `action` is permitted.
    pub fn contains(&self, action: &str) -> bool {
        self.0.contains_key(action)
    }

    /// Returns the handle for `action`.
    pub fn get(&self, action: &str) -> Option<&ActionHandle> {
        self.0.get(action)
    }

    /// Returns the permitted action names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns the number of permitted actions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no action is permitted.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for CapabilityMap
where
    K: Into<String>,
    V: Into<ActionHandle>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A party bound to an entity, identified by claims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// Claim name to accepted values, e.g. `email` to a list of addresses.
    #[serde(default)]
    pub claims: BTreeMap<String, Vec<String>>,
}

impl Party {
    /// Creates a party matched by a single claim value.
    pub fn with_claim(claim: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claims: BTreeMap::from([(claim.into(), vec![value.into()])]),
        }
    }
}

/// A server entity: identity, state, capabilities and typed payload.
///
/// ```rust
/// use capgate::resource::Entity;
///
/// let entity: Entity = serde_json::from_str(
///     r#"{"@id": "d1", "@state": "drafted", "@actions": {"edit": "https://api/d1/edit"}, "content": "hi"}"#,
/// ).unwrap();
/// assert_eq!(entity.id, "d1");
/// assert!(entity.actions.contains("edit"));
/// assert_eq!(entity.data["content"], "hi");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity<T = serde_json::Map<String, serde_json::Value>> {
    /// Entity identifier.
    #[serde(rename = "@id")]
    pub id: String,

    /// Lifecycle state, if the entity has one.
    #[serde(rename = "@state", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Actions the caller may perform on this entity.
    #[serde(rename = "@actions", default)]
    pub actions: CapabilityMap,

    /// Parties bound to the entity by role name.
    #[serde(rename = "@parties", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parties: BTreeMap<String, Party>,

    /// The resource-specific fields.
    #[serde(flatten)]
    pub data: T,
}

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Page number, starting at 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Total number of pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    /// Total number of items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
}

impl<T> Page<T> {
    /// Returns `true` if a page after `page` may exist, given that
    /// `page_size` items were requested.
    ///
    /// A reported total is authoritative. Without one, an empty or short
    /// page is the last.
    pub fn has_more_after(&self, page: u32, page_size: u32) -> bool {
        if self.items.is_empty() {
            return false;
        }
        match self.total_pages {
            Some(total) => page < total,
            None => u32::try_from(self.items.len()).is_ok_and(|len| len >= page_size),
        }
    }
}
