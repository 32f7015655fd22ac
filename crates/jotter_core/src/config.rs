//! Declarative configuration for opening a note store.
//!
//! # Responsibility
//! - Describe backend selection, storage key, initial sort and logging.
//! - Validate configuration before anything touches disk.
//! - Open the configured backend, repository and store.
//!
//! # Invariants
//! - File and SQLite paths must be absolute.
//! - A configuration that passed `validate` only fails to open on I/O or
//!   database errors.

use crate::logging::{default_log_level, init_logging, normalize_level};
use crate::model::note::SortCriteria;
use crate::repo::note_repo::{BlobNoteRepository, RepoError, DEFAULT_STORAGE_KEY};
use crate::storage::{validate_key, FileStorage, MemoryStorage, SqliteStorage, StorageBackend};
use crate::store::notes_store::NotesStore;
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Configuration error for loading, validating or opening a store.
#[derive(Debug)]
pub enum ConfigError {
    Read(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
    Open(RepoError),
    Logging(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
            Self::Open(err) => write!(f, "failed to open storage: {err}"),
            Self::Logging(message) => write!(f, "failed to initialize logging: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Open(err) => Some(err),
            Self::Invalid(_) | Self::Logging(_) => None,
        }
    }
}

impl From<RepoError> for ConfigError {
    fn from(value: RepoError) -> Self {
        Self::Open(value)
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    Memory {
        #[serde(default)]
        quota_bytes: Option<usize>,
    },
    File {
        dir: PathBuf,
    },
    Sqlite {
        path: PathBuf,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Memory { quota_bytes: None }
    }
}

/// Rolling file log settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    pub dir: PathBuf,
}

/// Top-level store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    #[serde(default)]
    pub default_sort: SortCriteria,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            storage_key: default_storage_key(),
            default_sort: SortCriteria::default(),
            logging: None,
        }
    }
}

impl StoreConfig {
    /// Configuration for a SQLite database at `path`.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendConfig::Sqlite { path: path.into() },
            ..Self::default()
        }
    }

    /// Configuration for a file-per-key directory at `dir`.
    pub fn file(dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendConfig::File { dir: dir.into() },
            ..Self::default()
        }
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(source).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        Self::from_json_str(&source)
    }

    /// Checks every field without opening anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_key(&self.storage_key)
            .map_err(|_| ConfigError::Invalid(format!("storage_key `{}`", self.storage_key)))?;

        match &self.backend {
            BackendConfig::Memory { quota_bytes } => {
                if *quota_bytes == Some(0) {
                    return Err(ConfigError::Invalid(
                        "memory quota_bytes must be positive".to_string(),
                    ));
                }
            }
            BackendConfig::File { dir } => require_absolute("file dir", dir)?,
            BackendConfig::Sqlite { path } => require_absolute("sqlite path", path)?,
        }

        if let Some(logging) = &self.logging {
            normalize_level(&logging.level).map_err(ConfigError::Invalid)?;
            require_absolute("logging dir", &logging.dir)?;
        }

        Ok(())
    }

    /// Starts process logging when a `logging` section is present.
    pub fn init_logging(&self) -> Result<(), ConfigError> {
        let Some(logging) = &self.logging else {
            return Ok(());
        };
        let dir = logging.dir.to_str().ok_or_else(|| {
            ConfigError::Logging(format!("log dir `{}` is not UTF-8", logging.dir.display()))
        })?;
        init_logging(&logging.level, dir).map_err(ConfigError::Logging)
    }

    /// Opens the configured storage backend.
    pub fn open_backend(&self) -> Result<StorageBackend, ConfigError> {
        self.validate()?;
        let backend = match &self.backend {
            BackendConfig::Memory { quota_bytes } => StorageBackend::Memory(match quota_bytes {
                Some(quota) => MemoryStorage::with_quota(*quota),
                None => MemoryStorage::new(),
            }),
            BackendConfig::File { dir } => {
                StorageBackend::File(FileStorage::open(dir).map_err(RepoError::from)?)
            }
            BackendConfig::Sqlite { path } => {
                StorageBackend::Sqlite(SqliteStorage::open(path).map_err(RepoError::from)?)
            }
        };

        info!(
            "event=storage_open module=config status=ok backend={} key={}",
            backend.kind(),
            self.storage_key
        );
        Ok(backend)
    }

    /// Opens the configured backend wrapped in a note repository.
    pub fn open_repository(&self) -> Result<BlobNoteRepository<StorageBackend>, ConfigError> {
        let backend = self.open_backend()?;
        Ok(BlobNoteRepository::with_key(backend, self.storage_key.clone())?)
    }

    /// Opens a store over the configured repository, seeded with `default_sort`.
    pub fn open_store(&self) -> Result<NotesStore<BlobNoteRepository<StorageBackend>>, ConfigError> {
        let repo = self.open_repository()?;
        Ok(NotesStore::with_sort(repo, self.default_sort))
    }
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

fn default_level() -> String {
    default_log_level().to_string()
}

fn require_absolute(what: &str, path: &Path) -> Result<(), ConfigError> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{what} must be an absolute path, got `{}`",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::{BackendConfig, ConfigError, StoreConfig};
    use crate::model::note::{SortDirection, SortField};

    #[test]
    fn empty_document_uses_defaults() {
        let config = StoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.storage_key, "notes");
        assert_eq!(config.backend, BackendConfig::Memory { quota_bytes: None });
    }

    #[test]
    fn parses_backend_and_sort() {
        let config = StoreConfig::from_json_str(
            r#"{
                "backend": { "kind": "sqlite", "path": "/var/lib/jotter/notes.db" },
                "storage_key": "work-notes",
                "default_sort": { "field": "updatedAt", "direction": "desc" }
            }"#,
        )
        .unwrap();

        assert!(matches!(config.backend, BackendConfig::Sqlite { .. }));
        assert_eq!(config.storage_key, "work-notes");
        assert_eq!(config.default_sort.field, SortField::UpdatedAt);
        assert_eq!(config.default_sort.direction, SortDirection::Desc);
    }

    #[test]
    fn relative_paths_are_rejected() {
        let err = StoreConfig::from_json_str(r#"{ "backend": { "kind": "file", "dir": "notes" } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("absolute")));
    }

    #[test]
    fn bad_storage_key_and_level_are_rejected() {
        let err = StoreConfig::from_json_str(r#"{ "storage_key": "../x" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = StoreConfig::from_json_str(
            r#"{ "logging": { "level": "loud", "dir": "/tmp/jotter-logs" } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("unsupported")));
    }

    #[test]
    fn unknown_backend_kind_is_a_parse_error() {
        let err = StoreConfig::from_json_str(r#"{ "backend": { "kind": "redis" } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn opens_memory_store_with_default_sort() {
        let store = StoreConfig::default().open_store().unwrap();
        assert!(store.note_list().is_empty());
        assert_eq!(store.current_sort().field, SortField::Title);
    }
}
