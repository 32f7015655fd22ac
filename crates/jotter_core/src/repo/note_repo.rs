//! Note repository contract and full-blob implementation.
//!
//! # Responsibility
//! - Provide create/read/update/delete over the note collection.
//! - Own the encoding of the collection inside the key-value medium.
//!
//! # Invariants
//! - The whole collection lives under one key as one JSON array.
//! - Every write re-encodes and replaces the whole collection.
//! - Read paths reject invalid persisted state instead of masking it.
//! - `created_at <= updated_at` and ids are unique in every written blob.

use crate::model::note::{now_epoch_ms, NewNote, Note, NoteId, NoteUpdate, PartialNote};
use crate::repo::query::{execute, NoteQuery, QueryOptions};
use crate::storage::{validate_key, KvStorage, StorageError};
use log::debug;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Key the collection is stored under unless configured otherwise.
pub const DEFAULT_STORAGE_KEY: &str = "notes";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for note persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Storage(StorageError),
    /// The stored collection decoded but violates a record invariant.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<StorageError> for RepoError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Storage(StorageError::Serialization(value))
    }
}

/// Data-access contract for notes.
pub trait NoteRepository {
    /// Persists a new note and returns its generated id.
    fn create(&self, note: &NewNote) -> RepoResult<NoteId>;
    /// Returns notes matching `query`, shaped by `options`.
    fn read(&self, query: &NoteQuery, options: &QueryOptions) -> RepoResult<Vec<PartialNote>>;
    /// Replaces title and content of one note; returns rows updated (0 or 1).
    fn update(&self, update: &NoteUpdate) -> RepoResult<usize>;
    /// Removes every note whose id is listed; returns rows removed.
    fn delete(&self, ids: &[NoteId]) -> RepoResult<usize>;

    /// Loads one full note by id.
    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>> {
        let rows = self.read(&NoteQuery::by_id(id), &QueryOptions::default())?;
        Ok(rows.into_iter().next().and_then(PartialNote::into_note))
    }

    /// Removes a single note by id.
    fn delete_one(&self, id: NoteId) -> RepoResult<usize> {
        self.delete(std::slice::from_ref(&id))
    }
}

/// Repository storing the entire collection as one blob in a `KvStorage`.
///
/// Each operation is O(total notes). Whether concurrent writers can lose
/// each other's changes depends on the backend's `update_item`.
#[derive(Debug)]
pub struct BlobNoteRepository<S: KvStorage> {
    storage: S,
    key: String,
    clock: fn() -> i64,
}

impl<S: KvStorage> BlobNoteRepository<S> {
    /// Creates a repository over `storage` using `DEFAULT_STORAGE_KEY`.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            key: DEFAULT_STORAGE_KEY.to_string(),
            clock: now_epoch_ms,
        }
    }

    /// Creates a repository storing the collection under `key`.
    pub fn with_key(storage: S, key: impl Into<String>) -> RepoResult<Self> {
        let key = key.into();
        validate_key(&key)?;
        Ok(Self {
            storage,
            key,
            clock: now_epoch_ms,
        })
    }

    /// Replaces the timestamp source (epoch milliseconds).
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn load(&self) -> RepoResult<Vec<Note>> {
        let raw = self.storage.get_item(&self.key)?;
        decode_notes(raw.as_deref())
    }
}

impl<S: KvStorage> NoteRepository for BlobNoteRepository<S> {
    fn create(&self, note: &NewNote) -> RepoResult<NoteId> {
        let now = (self.clock)();
        let id = self.storage.update_item(&self.key, |raw| -> RepoResult<_> {
            let mut notes = decode_notes(raw.as_deref())?;
            let mut id = Uuid::new_v4();
            while notes.iter().any(|existing| existing.id == id) {
                id = Uuid::new_v4();
            }

            notes.push(Note {
                id,
                title: note.title.clone(),
                content: note.content.clone(),
                created_at: now,
                updated_at: now,
            });
            Ok((Some(encode_notes(&notes)?), id))
        })?;

        debug!("event=note_create module=repo status=ok key={}", self.key);
        Ok(id)
    }

    fn read(&self, query: &NoteQuery, options: &QueryOptions) -> RepoResult<Vec<PartialNote>> {
        let notes = self.load()?;
        if notes.is_empty() {
            return Ok(Vec::new());
        }

        let total = notes.len();
        let rows = execute(notes, query, options);
        debug!(
            "event=note_read module=repo status=ok key={} total={} returned={}",
            self.key,
            total,
            rows.len()
        );
        Ok(rows)
    }

    fn update(&self, update: &NoteUpdate) -> RepoResult<usize> {
        let now = (self.clock)();
        let changed = self.storage.update_item(&self.key, |raw| -> RepoResult<_> {
            let mut notes = decode_notes(raw.as_deref())?;
            let Some(existing) = notes.iter_mut().find(|note| note.id == update.id) else {
                return Ok((None, 0));
            };

            existing.title = update.title.clone();
            existing.content = update.content.clone();
            existing.updated_at = now.max(existing.created_at);
            Ok((Some(encode_notes(&notes)?), 1))
        })?;

        debug!(
            "event=note_update module=repo status=ok key={} changed={}",
            self.key, changed
        );
        Ok(changed)
    }

    fn delete(&self, ids: &[NoteId]) -> RepoResult<usize> {
        let targets: HashSet<NoteId> = ids.iter().copied().collect();
        let removed = self.storage.update_item(&self.key, |raw| -> RepoResult<_> {
            let mut notes = decode_notes(raw.as_deref())?;
            let before = notes.len();
            notes.retain(|note| !targets.contains(&note.id));
            let removed = before - notes.len();
            if removed == 0 {
                return Ok((None, 0));
            }
            Ok((Some(encode_notes(&notes)?), removed))
        })?;

        debug!(
            "event=note_delete module=repo status=ok key={} requested={} removed={}",
            self.key,
            targets.len(),
            removed
        );
        Ok(removed)
    }
}

/// Decodes the stored collection; an absent or blank value is empty.
fn decode_notes(raw: Option<&str>) -> RepoResult<Vec<Note>> {
    let raw = match raw {
        Some(value) if !value.trim().is_empty() => value,
        _ => return Ok(Vec::new()),
    };

    let notes: Vec<Note> = serde_json::from_str(raw)?;
    let mut seen = HashSet::with_capacity(notes.len());
    for note in &notes {
        if !seen.insert(note.id) {
            return Err(RepoError::InvalidData(format!("duplicate note id `{}`", note.id)));
        }
        if note.created_at > note.updated_at {
            return Err(RepoError::InvalidData(format!(
                "note `{}` has createdAt {} after updatedAt {}",
                note.id, note.created_at, note.updated_at
            )));
        }
    }
    Ok(notes)
}

fn encode_notes(notes: &[Note]) -> RepoResult<String> {
    Ok(serde_json::to_string(notes)?)
}
