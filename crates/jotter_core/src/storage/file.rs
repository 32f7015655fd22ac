//! File-per-key storage backend.
//!
//! # Responsibility
//! - Map each key onto `<dir>/<key>.json`.
//! - Replace values atomically so a crash never leaves a torn file.
//!
//! # Invariants
//! - Writes go through a temp file in the same directory and a rename.
//! - `update_item` holds an exclusive advisory lock on `<dir>/<key>.lock`
//!   for the whole read-modify-write.

use super::{validate_key, KvStorage, StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Directory-backed key-value storage.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    lock_timeout: Duration,
}

impl FileStorage {
    /// Opens (and creates when missing) a storage directory.
    pub fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    /// Overrides how long `update_item` waits for a contended lock.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`.
    pub fn item_path(&self, key: &str) -> StorageResult<PathBuf> {
        let key = validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn lock_path(&self, key: &str) -> StorageResult<PathBuf> {
        let key = validate_key(key)?;
        Ok(self.dir.join(format!("{key}.lock")))
    }
}

impl KvStorage for FileStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.item_path(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.item_path(key)?;
        write_atomic(&self.dir, &path, value.as_bytes())
    }

    fn update_item<T, E, F>(&self, key: &str, apply: F) -> Result<T, E>
    where
        F: FnOnce(Option<String>) -> Result<(Option<String>, T), E>,
        E: From<StorageError>,
    {
        let _lock = ItemLock::acquire(&self.lock_path(key)?, self.lock_timeout)?;
        let current = self.get_item(key)?;
        let (next, output) = apply(current)?;
        if let Some(value) = next {
            self.set_item(key, &value)?;
        }
        Ok(output)
    }
}

/// Writes `data` to a temp file in `dir` and renames it over `path`.
fn write_atomic(dir: &Path, path: &Path, data: &[u8]) -> StorageResult<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| StorageError::Io(err.error))?;
    Ok(())
}

/// Exclusive advisory lock released on drop.
struct ItemLock {
    file: File,
}

impl ItemLock {
    fn acquire(path: &Path, timeout: Duration) -> StorageResult<Self> {
        let started_at = Instant::now();
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(path)?;

            if FileExt::try_lock_exclusive(&file).is_ok() {
                return Ok(Self { file });
            }

            if started_at.elapsed() >= timeout {
                return Err(StorageError::LockTimeout {
                    path: path.to_path_buf(),
                    waited: started_at.elapsed(),
                });
            }

            thread::sleep(LOCK_RETRY_INTERVAL);
        }
    }
}

impl Drop for ItemLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::{FileStorage, ItemLock};
    use crate::storage::{KvStorage, StorageError};
    use std::time::Duration;

    #[test]
    fn values_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        assert_eq!(storage.get_item("notes").unwrap(), None);
        storage.set_item("notes", "[]").unwrap();
        assert_eq!(storage.get_item("notes").unwrap().as_deref(), Some("[]"));
        assert!(dir.path().join("notes.json").is_file());
    }

    #[test]
    fn set_item_replaces_whole_value() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        storage.set_item("notes", "a much longer first value").unwrap();
        storage.set_item("notes", "short").unwrap();
        assert_eq!(storage.get_item("notes").unwrap().as_deref(), Some("short"));
    }

    #[test]
    fn invalid_keys_are_rejected_before_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        let err = storage.set_item("../escape", "x").unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[test]
    fn update_item_times_out_while_lock_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path())
            .unwrap()
            .with_lock_timeout(Duration::from_millis(50));
        let _held = ItemLock::acquire(&dir.path().join("notes.lock"), Duration::ZERO).unwrap();

        let err = storage
            .update_item::<(), StorageError, _>("notes", |_| Ok((Some("[]".to_string()), ())))
            .unwrap_err();
        assert!(matches!(err, StorageError::LockTimeout { .. }));
        assert_eq!(storage.get_item("notes").unwrap(), None);
    }
}
