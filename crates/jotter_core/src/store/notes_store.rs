//! Note state store.
//!
//! # Responsibility
//! - Orchestrate repository calls for the list/editor use-cases.
//! - Keep the cached list, the open note and the applied sort in memory.
//! - Publish a change event after every state transition.
//!
//! # Invariants
//! - Failures never mutate state; the last-known-good state is kept.
//! - Every failure is logged with its operation before it is returned.
//! - The cached list is not re-sorted after an in-place update.
//! - A successful delete always clears the open note.

use crate::model::note::{
    now_epoch_ms, NewNote, Note, NoteField, NoteId, NoteListItem, NoteUpdate, SortCriteria,
};
use crate::repo::note_repo::{NoteRepository, RepoError};
use crate::repo::query::{NoteQuery, QueryOptions};
use log::{debug, error, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::sync::broadcast;

/// Broadcast capacity for store events; lagging receivers skip old events.
const STORE_EVENT_CHANNEL_CAPACITY: usize = 64;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store operation names, used for log events and failure messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    LoadNotes,
    AddNote,
    RemoveNote,
    SelectNote,
    UpdateNote,
}

impl StoreOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoadNotes => "notes_load",
            Self::AddNote => "note_add",
            Self::RemoveNote => "note_remove",
            Self::SelectNote => "note_select",
            Self::UpdateNote => "note_update",
        }
    }
}

/// Failure result of a store operation.
#[derive(Debug)]
pub enum StoreError {
    /// The repository or its medium failed.
    Storage {
        operation: StoreOperation,
        source: RepoError,
    },
    /// No note exists with the requested id.
    NotFound(NoteId),
    /// A well-formed write matched no stored note (stale reference).
    ZeroRowsAffected {
        operation: StoreOperation,
        id: NoteId,
    },
}

impl StoreError {
    /// Text for the transient notification shown to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Storage { operation, .. } => match operation {
                StoreOperation::LoadNotes => "Failed to load notes. Please try again.",
                StoreOperation::AddNote => "Failed to create the note. Please try again.",
                StoreOperation::RemoveNote => "Failed to delete the note. Please try again.",
                StoreOperation::SelectNote => "Failed to open the note. Please try again.",
                StoreOperation::UpdateNote => "Failed to save the note. Please try again.",
            },
            Self::NotFound(_) => "Selected note was not found.",
            Self::ZeroRowsAffected { operation, .. } => match operation {
                StoreOperation::RemoveNote => "The note no longer exists.",
                _ => "Failed to save the note. Please try again.",
            },
        }
    }

    /// Operation that produced this failure, when it is tied to one.
    pub fn operation(&self) -> StoreOperation {
        match self {
            Self::Storage { operation, .. } | Self::ZeroRowsAffected { operation, .. } => {
                *operation
            }
            Self::NotFound(_) => StoreOperation::SelectNote,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage { operation, source } => {
                write!(f, "{} failed: {source}", operation.as_str())
            }
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::ZeroRowsAffected { operation, id } => {
                write!(f, "{} affected zero rows for note {id}", operation.as_str())
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// State change published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// `note_list` was replaced, patched or reordered.
    NoteListChanged,
    /// `current_note` changed; carries the newly open id.
    CurrentNoteChanged(Option<NoteId>),
    /// `current_sort` changed.
    SortChanged(SortCriteria),
}

/// Explicitly owned state container for the notes UI.
pub struct NotesStore<R: NoteRepository> {
    repo: R,
    note_list: Vec<NoteListItem>,
    current_note: Option<Note>,
    current_sort: SortCriteria,
    event_tx: broadcast::Sender<StoreEvent>,
}

impl<R: NoteRepository> NotesStore<R> {
    /// Creates an empty store over `repo` with the default sort.
    pub fn new(repo: R) -> Self {
        Self::with_sort(repo, SortCriteria::default())
    }

    /// Creates an empty store that reports `sort` as its current sort.
    ///
    /// The list is not ordered until the next `sort_notes` call.
    pub fn with_sort(repo: R, sort: SortCriteria) -> Self {
        let (event_tx, _) = broadcast::channel(STORE_EVENT_CHANNEL_CAPACITY);
        Self {
            repo,
            note_list: Vec::new(),
            current_note: None,
            current_sort: sort,
            event_tx,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn note_list(&self) -> &[NoteListItem] {
        &self.note_list
    }

    pub fn current_note(&self) -> Option<&Note> {
        self.current_note.as_ref()
    }

    pub fn current_sort(&self) -> SortCriteria {
        self.current_sort
    }

    /// Subscribes to state change events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    /// Replaces the cached list with every note, in storage order.
    pub fn load_notes_list(&mut self) -> StoreResult<()> {
        self.query_notes(&NoteQuery::all(), &QueryOptions::default())
    }

    /// Replaces the cached list with the result of an arbitrary read.
    ///
    /// Rows are always projected to the list-item fields, whatever
    /// `options.projection` says.
    pub fn query_notes(&mut self, query: &NoteQuery, options: &QueryOptions) -> StoreResult<()> {
        let options = QueryOptions {
            projection: NoteField::LIST_ITEM.to_vec(),
            ..options.clone()
        };
        let operation = StoreOperation::LoadNotes;

        let rows = self
            .repo
            .read(query, &options)
            .map_err(|err| storage_failure(operation, err))?;
        let items = rows
            .into_iter()
            .map(NoteListItem::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| storage_failure(operation, RepoError::InvalidData(err.to_string())))?;

        debug!(
            "event={} module=store status=ok count={}",
            operation.as_str(),
            items.len()
        );
        self.note_list = items;
        self.emit(StoreEvent::NoteListChanged);
        Ok(())
    }

    /// Persists a new note and returns its id.
    ///
    /// The cached list is left as is; callers reload or select the note.
    pub fn add_note(&self, note: &NewNote) -> StoreResult<NoteId> {
        let operation = StoreOperation::AddNote;
        let id = self
            .repo
            .create(note)
            .map_err(|err| storage_failure(operation, err))?;
        debug!(
            "event={} module=store status=ok note_id={}",
            operation.as_str(),
            id
        );
        Ok(id)
    }

    /// Deletes one note and clears the open note.
    ///
    /// The selection is cleared whether or not `id` was the open note.
    pub fn remove_note(&mut self, id: NoteId) -> StoreResult<usize> {
        let operation = StoreOperation::RemoveNote;
        let removed = self
            .repo
            .delete_one(id)
            .map_err(|err| storage_failure(operation, err))?;
        if removed == 0 {
            return Err(zero_rows(operation, id));
        }

        debug!(
            "event={} module=store status=ok note_id={} removed={}",
            operation.as_str(),
            id,
            removed
        );
        self.set_current(None);
        Ok(removed)
    }

    /// Opens the note with `id`, or closes the open note for `None`.
    pub fn set_selected_note(&mut self, id: Option<NoteId>) -> StoreResult<()> {
        let Some(id) = id else {
            self.set_current(None);
            return Ok(());
        };

        let operation = StoreOperation::SelectNote;
        let note = self
            .repo
            .get_note(id)
            .map_err(|err| storage_failure(operation, err))?;
        let Some(note) = note else {
            warn!(
                "event={} module=store status=error error_code=not_found note_id={}",
                operation.as_str(),
                id
            );
            return Err(StoreError::NotFound(id));
        };

        debug!(
            "event={} module=store status=ok note_id={}",
            operation.as_str(),
            id
        );
        self.set_current(Some(note));
        Ok(())
    }

    /// Saves title and content of one note and patches its list entry.
    ///
    /// The patched entry keeps its position and `created_at`; its
    /// `updated_at` is refreshed to the current time.
    pub fn update_note(&mut self, update: &NoteUpdate) -> StoreResult<usize> {
        let operation = StoreOperation::UpdateNote;
        let changed = self
            .repo
            .update(update)
            .map_err(|err| storage_failure(operation, err))?;
        if changed == 0 {
            return Err(zero_rows(operation, update.id));
        }

        debug!(
            "event={} module=store status=ok note_id={}",
            operation.as_str(),
            update.id
        );
        if self.patch_list_item(update) {
            self.emit(StoreEvent::NoteListChanged);
        }
        Ok(changed)
    }

    /// Re-sorts the cached list by one field.
    ///
    /// Returns `false` without touching anything when `criteria` is already
    /// applied. Entries equal on the field keep their relative order.
    pub fn sort_notes(&mut self, criteria: SortCriteria) -> bool {
        if criteria == self.current_sort {
            return false;
        }

        self.note_list.sort_by(|a, b| criteria.compare(a, b));
        self.current_sort = criteria;
        self.emit(StoreEvent::NoteListChanged);
        self.emit(StoreEvent::SortChanged(criteria));
        true
    }

    fn patch_list_item(&mut self, update: &NoteUpdate) -> bool {
        let Some(item) = self.note_list.iter_mut().find(|item| item.id == update.id) else {
            return false;
        };

        item.title = update.title.clone();
        item.updated_at = now_epoch_ms().max(item.created_at);
        true
    }

    fn set_current(&mut self, note: Option<Note>) {
        if self.current_note == note {
            return;
        }

        let id = note.as_ref().map(|note| note.id);
        self.current_note = note;
        self.emit(StoreEvent::CurrentNoteChanged(id));
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is a normal state.
        let _ = self.event_tx.send(event);
    }
}

fn storage_failure(operation: StoreOperation, source: RepoError) -> StoreError {
    error!(
        "event={} module=store status=error error_code=storage_failed error={}",
        operation.as_str(),
        source
    );
    StoreError::Storage { operation, source }
}

fn zero_rows(operation: StoreOperation, id: NoteId) -> StoreError {
    warn!(
        "event={} module=store status=error error_code=zero_rows_affected note_id={}",
        operation.as_str(),
        id
    );
    StoreError::ZeroRowsAffected { operation, id }
}

#[cfg(test)]
mod tests {
    use super::{StoreError, StoreOperation};
    use crate::repo::note_repo::RepoError;
    use uuid::Uuid;

    #[test]
    fn user_messages_follow_operation() {
        let save = StoreError::Storage {
            operation: StoreOperation::UpdateNote,
            source: RepoError::InvalidData("x".to_string()),
        };
        assert_eq!(save.user_message(), "Failed to save the note. Please try again.");

        let stale = StoreError::ZeroRowsAffected {
            operation: StoreOperation::UpdateNote,
            id: Uuid::new_v4(),
        };
        assert_eq!(stale.user_message(), save.user_message());

        let missing = StoreError::NotFound(Uuid::new_v4());
        assert_eq!(missing.user_message(), "Selected note was not found.");
        assert_eq!(missing.operation(), StoreOperation::SelectNote);
    }

    #[test]
    fn display_names_operation() {
        let err = StoreError::ZeroRowsAffected {
            operation: StoreOperation::RemoveNote,
            id: Uuid::nil(),
        };
        assert!(err.to_string().starts_with("note_remove affected zero rows"));
    }
}
