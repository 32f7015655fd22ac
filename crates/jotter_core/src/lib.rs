//! Core note persistence and state synchronization for Jotter.
//! This crate is the single source of truth for note invariants.

pub mod config;
pub mod logging;
pub mod model;
pub mod repo;
pub mod storage;
pub mod store;

pub use config::{BackendConfig, ConfigError, LoggingConfig, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::note::{
    NewNote, Note, NoteField, NoteId, NoteListItem, NoteUpdate, PartialNote, SortCriteria,
    SortDirection, SortField,
};
pub use repo::note_repo::{
    BlobNoteRepository, NoteRepository, RepoError, RepoResult, DEFAULT_STORAGE_KEY,
};
pub use repo::query::{NoteQuery, QueryOptions, SortOrder};
pub use storage::{
    FileStorage, KvStorage, MemoryStorage, SqliteStorage, StorageBackend, StorageError,
    StorageResult,
};
pub use store::editor::{EditorSession, SaveOutcome, SwitchOutcome};
pub use store::notes_store::{NotesStore, StoreError, StoreEvent, StoreOperation, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
