//! Durable credential storage.
//!
//! [`CredentialStore`] keeps three named slots on top of any
//! [`KeyValueStore`]: the access token, the refresh token and the expiry
//! instant in epoch milliseconds. Absence of a slot is meaningful.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use super::{Session, expiry_safety_margin};
use crate::Error;

/// Default slot prefix.
pub const DEFAULT_NAMESPACE: &str = "capgate_";

const ACCESS_TOKEN_SLOT: &str = "access_token";
const REFRESH_TOKEN_SLOT: &str = "refresh_token";
const TOKEN_EXPIRY_SLOT: &str = "token_expiry";

/// A string key/value medium.
///
/// Reads are infallible: a medium that cannot be read reports the key as
/// absent. Writes may fail.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), Error>;
}

/// In-process key/value store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.entries.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Key/value store persisted as a JSON object in a single file.
///
/// The file is read once on [`open`](Self::open) and rewritten through a
/// temporary sibling and a rename after every mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`, creating it lazily on first write.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the file exists but cannot be read or is
    /// not a JSON object of strings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                Error::storage(format!("Credential file {} is corrupt", path.display()))
                    .with_source(e)
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), Error> {
        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| Error::storage("Failed to encode credentials").with_source(e))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn mutate(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), Error> {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        f(&mut next);
        if next == *entries {
            return Ok(());
        }
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.mutate(|entries| {
            entries.insert(key.to_owned(), value.to_owned());
        })
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }
}

/// The three credential slots on top of a [`KeyValueStore`].
///
/// Slots are prefixed with a namespace so several application instances can
/// share one medium.
#[derive(Clone)]
pub struct CredentialStore {
    medium: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Creates a store with the default namespace.
    pub fn new(medium: Arc<dyn KeyValueStore>) -> Self {
        Self::with_namespace(medium, DEFAULT_NAMESPACE)
    }

    /// Creates a store with a custom namespace.
    pub fn with_namespace(medium: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            medium,
            namespace: namespace.into(),
        }
    }

    /// Creates a store backed by a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Returns the slot namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn key(&self, slot: &str) -> String {
        format!("{}{}", self.namespace, slot)
    }

    /// Writes all three slots from `session`. Absent values clear their slot.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the medium rejects a write.
    pub fn set(&self, session: &Session) -> Result<(), Error> {
        self.medium
            .set(&self.key(ACCESS_TOKEN_SLOT), session.access_token())?;

        match session.refresh_token() {
            Some(refresh_token) => self.medium.set(&self.key(REFRESH_TOKEN_SLOT), refresh_token)?,
            None => self.medium.remove(&self.key(REFRESH_TOKEN_SLOT))?,
        }

        match session.expires_at() {
            Some(expires_at) => self.medium.set(
                &self.key(TOKEN_EXPIRY_SLOT),
                &expires_at.timestamp_millis().to_string(),
            )?,
            None => self.medium.remove(&self.key(TOKEN_EXPIRY_SLOT))?,
        }
        Ok(())
    }

    /// Returns the stored access token.
    pub fn access_token(&self) -> Option<String> {
        self.medium.get(&self.key(ACCESS_TOKEN_SLOT))
    }

    /// Returns the stored refresh token.
    pub fn refresh_token(&self) -> Option<String> {
        self.medium.get(&self.key(REFRESH_TOKEN_SLOT))
    }

    /// Returns the stored expiry instant.
    ///
    /// A slot that does not hold epoch milliseconds reads as the Unix epoch,
    /// so the stored token counts as expired.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.medium.get(&self.key(TOKEN_EXPIRY_SLOT))?;
        let parsed = raw
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
        Some(parsed.unwrap_or_else(|| {
            tracing::warn!(namespace = %self.namespace, "stored token expiry is malformed");
            DateTime::<Utc>::UNIX_EPOCH
        }))
    }

    /// Returns `true` if no expiry is recorded or the safety margin has been
    /// reached.
    pub fn is_expired(&self) -> bool {
        match self.expires_at() {
            Some(expires_at) => Utc::now() + expiry_safety_margin() >= expires_at,
            None => true,
        }
    }

    /// Reads the stored session, if an access token is present.
    pub fn load(&self) -> Option<Session> {
        let access_token = self.access_token()?;
        Some(
            Session::new(access_token)
                .with_refresh_token_opt(self.refresh_token())
                .with_expires_at_opt(self.expires_at()),
        )
    }

    /// Removes all three slots.
    ///
    /// Every slot is attempted; the first failure is returned.
    pub fn clear(&self) -> Result<(), Error> {
        [ACCESS_TOKEN_SLOT, REFRESH_TOKEN_SLOT, TOKEN_EXPIRY_SLOT]
            .iter()
            .map(|slot| self.medium.remove(&self.key(slot)))
            .fold(Ok(()), |acc, result| acc.and(result))
    }
}
