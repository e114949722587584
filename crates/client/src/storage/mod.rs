//! Persisted client state.
//!
//! The storefront keeps a handful of string entries in a flat key-value
//! store (browser local storage in the web build). Two backends exist:
//!
//! - [`MemoryStore`] - process-local, used by tests and short-lived tools
//! - [`FileStore`] - a JSON object on disk, rewritten atomically on change
//!
//! [`SessionStore`] layers the authentication session on top of whichever
//! backend is in use.

mod file;
mod session;

pub use file::FileStore;
pub use session::{Session, SessionEvent, SessionStore};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

/// Access token of the signed-in shopper.
pub const TOKEN_KEY: &str = "token";
/// Refresh token exchanged for a new access token on expiry.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// JSON-encoded profile of the signed-in shopper.
pub const USER_KEY: &str = "user";
/// Price-mode preference, stored in a versioned state envelope.
pub const PRICE_MODE_KEY: &str = "price-mode-storage";
/// Selected UI language.
pub const LOCALE_KEY: &str = "i18nextLng";

/// Errors raised by a key-value backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The backing file is not a JSON object of strings.
    #[error("Corrupt state file {}: {source}", .path.display())]
    Corrupt {
        /// File being parsed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be encoded for storage.
    #[error("Failed to encode value for key {key}: {source}")]
    Encode {
        /// Key being written.
        key: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// A flat string-to-string store shared by the whole client.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove several keys in one write.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError>;

    /// Remove `key` if present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.remove_all(&[key])
    }
}

/// In-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert!(store.get(TOKEN_KEY).unwrap().is_none());

        store.set(TOKEN_KEY, "abc").unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));

        store.set(TOKEN_KEY, "def").unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("def"));
        assert_eq!(store.len(), 1);

        store.remove(TOKEN_KEY).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_store_remove_all_ignores_missing_keys() {
        let store = MemoryStore::new();
        store.set(TOKEN_KEY, "a").unwrap();
        store.set(LOCALE_KEY, "en").unwrap();

        store
            .remove_all(&[TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY])
            .unwrap();

        assert!(store.get(TOKEN_KEY).unwrap().is_none());
        assert_eq!(store.get(LOCALE_KEY).unwrap().as_deref(), Some("en"));
    }
}
