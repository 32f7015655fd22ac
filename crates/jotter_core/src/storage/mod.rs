//! Key-value persistence boundary and its backends.
//!
//! # Responsibility
//! - Define the `get_item`/`set_item` contract the note repository writes through.
//! - Provide in-memory, file and SQLite backends behind one trait.
//!
//! # Invariants
//! - An absent key reads as `None`, never as an error.
//! - `set_item` replaces the whole value of a key; there are no partial writes.
//! - `update_item` on the default path is get-then-set and is NOT atomic;
//!   backends that override it document their atomicity.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod file;
mod memory;
pub mod migrations;
mod sqlite;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

pub type StorageResult<T> = Result<T, StorageError>;

/// Failure raised by a storage backend.
#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Sqlite(rusqlite::Error),
    /// The stored value could not be encoded or decoded.
    Serialization(serde_json::Error),
    /// The write would grow the medium past its configured quota.
    QuotaExceeded {
        key: String,
        required: usize,
        quota: usize,
    },
    InvalidKey(String),
    LockTimeout {
        path: PathBuf,
        waited: Duration,
    },
    /// An in-process lock was poisoned by a panicking writer.
    Poisoned(&'static str),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "stored value encoding failed: {err}"),
            Self::QuotaExceeded {
                key,
                required,
                quota,
            } => write!(
                f,
                "storage quota exceeded writing `{key}`: {required} bytes required, {quota} allowed"
            ),
            Self::InvalidKey(key) => write!(f, "invalid storage key `{key}`"),
            Self::LockTimeout { path, waited } => write!(
                f,
                "lock timed out after {:?} at {}",
                waited,
                path.display()
            ),
            Self::Poisoned(what) => write!(f, "{what} lock poisoned"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Sqlite(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Durable string key-value medium.
pub trait KvStorage {
    /// Reads the value stored under `key`, `None` when absent.
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Read-modify-write of one key.
    ///
    /// `apply` receives the current value and returns the value to write
    /// (`None` skips the write) together with the caller's output.
    fn update_item<T, E, F>(&self, key: &str, apply: F) -> Result<T, E>
    where
        F: FnOnce(Option<String>) -> Result<(Option<String>, T), E>,
        E: From<StorageError>,
    {
        let current = self.get_item(key)?;
        let (next, output) = apply(current)?;
        if let Some(value) = next {
            self.set_item(key, &value)?;
        }
        Ok(output)
    }
}

impl<S: KvStorage> KvStorage for Arc<S> {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        self.as_ref().get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.as_ref().set_item(key, value)
    }

    fn update_item<T, E, F>(&self, key: &str, apply: F) -> Result<T, E>
    where
        F: FnOnce(Option<String>) -> Result<(Option<String>, T), E>,
        E: From<StorageError>,
    {
        self.as_ref().update_item(key, apply)
    }
}

/// Backend selected at runtime from configuration.
#[derive(Debug)]
pub enum StorageBackend {
    Memory(MemoryStorage),
    File(FileStorage),
    Sqlite(SqliteStorage),
}

impl StorageBackend {
    /// Short backend name used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::File(_) => "file",
            Self::Sqlite(_) => "sqlite",
        }
    }
}

impl KvStorage for StorageBackend {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        match self {
            Self::Memory(storage) => storage.get_item(key),
            Self::File(storage) => storage.get_item(key),
            Self::Sqlite(storage) => storage.get_item(key),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        match self {
            Self::Memory(storage) => storage.set_item(key, value),
            Self::File(storage) => storage.set_item(key, value),
            Self::Sqlite(storage) => storage.set_item(key, value),
        }
    }

    fn update_item<T, E, F>(&self, key: &str, apply: F) -> Result<T, E>
    where
        F: FnOnce(Option<String>) -> Result<(Option<String>, T), E>,
        E: From<StorageError>,
    {
        match self {
            Self::Memory(storage) => storage.update_item(key, apply),
            Self::File(storage) => storage.update_item(key, apply),
            Self::Sqlite(storage) => storage.update_item(key, apply),
        }
    }
}

/// Validates a storage key for backends that map keys onto names.
///
/// Trims nothing: a key is used verbatim once accepted. Rejects empty keys,
/// surrounding whitespace, dot-prefixed names and characters that are not
/// valid in file names (`/`, `\`, `:`, `"`, `*`, `?`, `<`, `>`, `|`).
pub fn validate_key(key: &str) -> StorageResult<&str> {
    if key.is_empty() || key.trim() != key || key.starts_with('.') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }

    if key.contains(&['/', '\\', ':', '"', '*', '?', '<', '>', '|', '\0'][..]) {
        return Err(StorageError::InvalidKey(key.to_string()));
    }

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::{validate_key, KvStorage, MemoryStorage, StorageError, StorageResult};
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Backend relying on the default, non-atomic `update_item`.
    #[derive(Default)]
    struct PlainStorage {
        items: RefCell<HashMap<String, String>>,
    }

    impl KvStorage for PlainStorage {
        fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
            Ok(self.items.borrow().get(key).cloned())
        }

        fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
            self.items
                .borrow_mut()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    #[test]
    fn default_update_item_skips_write_when_apply_returns_none() {
        let storage = PlainStorage::default();
        let seen = storage
            .update_item::<_, StorageError, _>("notes", |current| Ok((None, current)))
            .unwrap();
        assert_eq!(seen, None);
        assert_eq!(storage.get_item("notes").unwrap(), None);

        storage
            .update_item::<_, StorageError, _>("notes", |_| Ok((Some("[]".to_string()), ())))
            .unwrap();
        assert_eq!(storage.get_item("notes").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn default_update_item_propagates_apply_errors_without_writing() {
        let storage = PlainStorage::default();
        storage.set_item("notes", "before").unwrap();

        let err = storage
            .update_item::<(), StorageError, _>("notes", |_| {
                Err(StorageError::InvalidKey("boom".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
        assert_eq!(storage.get_item("notes").unwrap().as_deref(), Some("before"));
    }

    #[test]
    fn validate_key_rejects_path_like_keys() {
        assert_eq!(validate_key("notes").unwrap(), "notes");
        for bad in ["", " notes", "../notes", "a/b", "a\\b", ".hidden", "c:d"] {
            assert!(validate_key(bad).is_err(), "key `{bad}` should be rejected");
        }
    }

    #[test]
    fn arc_wrapped_storage_shares_state() {
        let shared = std::sync::Arc::new(MemoryStorage::new());
        let other = std::sync::Arc::clone(&shared);
        shared.set_item("notes", "[]").unwrap();
        assert_eq!(other.get_item("notes").unwrap().as_deref(), Some("[]"));
    }
}
