//! In-process storage backend.
//!
//! # Invariants
//! - Clones share one underlying map.
//! - `update_item` holds the map lock for the whole read-modify-write.
//! - A write rejected by the quota leaves the previous value untouched.

use super::{KvStorage, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    items: HashMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryState {
    fn used_bytes(&self) -> usize {
        self.items
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .sum()
    }

    fn write(&mut self, key: &str, value: &str) -> StorageResult<()> {
        if let Some(quota) = self.quota_bytes {
            let replaced = self
                .items
                .get(key)
                .map_or(0, |previous| key.len() + previous.len());
            let required = self.used_bytes() - replaced + key.len() + value.len();
            if required > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    required,
                    quota,
                });
            }
        }

        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Shared in-memory key-value map with an optional byte quota.
///
/// The quota counts key and value bytes across all items, emulating the
/// fixed budget of browser-local storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty map that rejects writes growing past `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                items: HashMap::new(),
                quota_bytes: Some(quota_bytes),
            })),
        }
    }

    /// Total key and value bytes currently stored.
    pub fn used_bytes(&self) -> StorageResult<usize> {
        Ok(self.lock()?.used_bytes())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StorageError::Poisoned("memory storage"))
    }
}

impl KvStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.lock()?.items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.lock()?.write(key, value)
    }

    fn update_item<T, E, F>(&self, key: &str, apply: F) -> Result<T, E>
    where
        F: FnOnce(Option<String>) -> Result<(Option<String>, T), E>,
        E: From<StorageError>,
    {
        let mut state = self.lock()?;
        let current = state.items.get(key).cloned();
        let (next, output) = apply(current)?;
        if let Some(value) = next {
            state.write(key, &value)?;
        }
        Ok(output)
    }
}
