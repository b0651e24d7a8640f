//! Credential storage backends.
//!
//! The session reads and writes tokens through the `CredentialStore` trait so the
//! backing storage can be chosen by the host: an in-memory map for tests, a JSON file
//! in the user's data directory, or the OS keychain.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

/// Key under which the access token is stored
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Key under which the refresh token is stored
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Keychain service name for `KeyringStore`
pub const KEYRING_SERVICE: &str = "sessiongate";

/// Application name used for the data directory
const APP_NAME: &str = "sessiongate";

/// Credentials file name in the data directory
const CREDENTIALS_FILE: &str = "credentials.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Credential storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Credential store lock poisoned")]
    Poisoned,

    #[error("Could not determine a data directory for credentials")]
    NoDataDir,
}

/// Synchronous key-value storage for string credentials.
///
/// `set` must replace any previous value atomically: a concurrent `get` observes
/// either the old value or the new one.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Remove `key` unless it holds a non-empty value other than `expected`.
    /// Returns `false` when a different value was found and kept.
    ///
    /// The default implementation reads then removes in two steps; stores that can
    /// do both under one lock override it.
    fn remove_if_current(&self, key: &str, expected: Option<&str>) -> Result<bool, StoreError> {
        if !is_current(self.get(key)?.as_deref(), expected) {
            return Ok(false);
        }
        self.remove(key)?;
        Ok(true)
    }
}

fn is_current(stored: Option<&str>, expected: Option<&str>) -> bool {
    match stored {
        None | Some("") => true,
        Some(value) => expected == Some(value),
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with an access token
    pub fn with_access_token(token: &str) -> Self {
        let store = Self::new();
        if let Ok(mut entries) = store.entries.write() {
            entries.insert(ACCESS_TOKEN_KEY.to_string(), token.to_string());
        }
        store
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn remove_if_current(&self, key: &str, expected: Option<&str>) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        if !is_current(entries.get(key).map(String::as_str), expected) {
            return Ok(false);
        }
        entries.remove(key);
        Ok(true)
    }
}

// ============================================================================
// JSON file
// ============================================================================

/// Stores all credentials in a single JSON object on disk.
///
/// Writes go to a sibling temp file which is then renamed over the original, so a
/// reader never sees a half-written file.
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Store in the per-user data directory, e.g. `~/.local/share/sessiongate/credentials.json`
    pub fn in_data_dir() -> Result<Self, StoreError> {
        let dir = dirs::data_dir().ok_or(StoreError::NoDataDir)?;
        Ok(Self::new(dir.join(APP_NAME).join(CREDENTIALS_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), keys = entries.len(), "Credential file written");
        Ok(())
    }

    fn update<F>(&self, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut HashMap<String, String>) -> bool,
    {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.read_all()?;
        if mutate(&mut entries) {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| entries.remove(key).is_some())
    }

    fn remove_if_current(&self, key: &str, expected: Option<&str>) -> Result<bool, StoreError> {
        let mut kept = false;
        self.update(|entries| {
            if !is_current(entries.get(key).map(String::as_str), expected) {
                kept = true;
                return false;
            }
            entries.remove(key).is_some()
        })?;
        Ok(!kept)
    }
}

// ============================================================================
// OS keychain
// ============================================================================

/// Stores each credential as its own keychain entry under a common service name
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE)
    }
}

impl CredentialStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
