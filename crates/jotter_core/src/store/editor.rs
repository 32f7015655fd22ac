//! Editing-surface side of the autosave protocol.
//!
//! # Responsibility
//! - Track the snapshot of the open note and the user's unsaved draft.
//! - Decide when a draft must be written through `NotesStore::update_note`.
//!
//! # Invariants
//! - A title blur saves only when the draft title differs from the snapshot.
//! - Switching away or closing saves when title or content differs.
//! - A successful save advances the snapshot, so repeated flushes of the
//!   same draft never reach the repository.
//! - No timers; every save is triggered by an explicit call.

use crate::model::note::{Note, NoteId, NoteUpdate};
use crate::repo::note_repo::NoteRepository;
use crate::store::notes_store::{NotesStore, StoreResult};

/// Result of an autosave attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Unchanged,
    NothingOpen,
}

/// Outcome of moving the editor to another note.
///
/// Navigation goes ahead even when the save of the previous draft fails.
#[derive(Debug)]
pub struct SwitchOutcome {
    pub saved: StoreResult<SaveOutcome>,
    pub selected: StoreResult<()>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Snapshot {
    id: NoteId,
    title: String,
    content: String,
}

/// Draft state for the note open in the editor.
#[derive(Debug, Default)]
pub struct EditorSession {
    snapshot: Option<Snapshot>,
    title: String,
    content: String,
}

impl EditorSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `note` as the new snapshot and resets the draft to it.
    pub fn open(&mut self, note: Option<&Note>) {
        match note {
            Some(note) => {
                self.title = note.title.clone();
                self.content = note.content.clone();
                self.snapshot = Some(Snapshot {
                    id: note.id,
                    title: note.title.clone(),
                    content: note.content.clone(),
                });
            }
            None => {
                self.title.clear();
                self.content.clear();
                self.snapshot = None;
            }
        }
    }

    pub fn open_id(&self) -> Option<NoteId> {
        self.snapshot.as_ref().map(|snapshot| snapshot.id)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    /// Returns whether the draft differs from the snapshot.
    pub fn is_dirty(&self) -> bool {
        self.snapshot.as_ref().is_some_and(|snapshot| {
            snapshot.title != self.title || snapshot.content != self.content
        })
    }

    /// Saves when the title field loses focus with a changed title.
    pub fn on_title_blur<R: NoteRepository>(
        &mut self,
        store: &mut NotesStore<R>,
    ) -> StoreResult<SaveOutcome> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(SaveOutcome::NothingOpen);
        };
        if snapshot.title == self.title {
            return Ok(SaveOutcome::Unchanged);
        }
        self.save(store)
    }

    /// Saves any unsaved change to title or content.
    pub fn flush<R: NoteRepository>(
        &mut self,
        store: &mut NotesStore<R>,
    ) -> StoreResult<SaveOutcome> {
        if self.snapshot.is_none() {
            return Ok(SaveOutcome::NothingOpen);
        }
        if !self.is_dirty() {
            return Ok(SaveOutcome::Unchanged);
        }
        self.save(store)
    }

    /// Flushes the draft, then opens `id` (or nothing) through the store.
    ///
    /// When the selection fails the session stays on the previous note.
    pub fn switch_to<R: NoteRepository>(
        &mut self,
        store: &mut NotesStore<R>,
        id: Option<NoteId>,
    ) -> SwitchOutcome {
        let saved = self.flush(store);
        let selected = store.set_selected_note(id);
        if selected.is_ok() {
            self.open(store.current_note());
        }
        SwitchOutcome { saved, selected }
    }

    /// Flushes the draft and leaves the session with nothing open.
    pub fn close<R: NoteRepository>(
        &mut self,
        store: &mut NotesStore<R>,
    ) -> StoreResult<SaveOutcome> {
        let saved = self.flush(store);
        self.open(None);
        saved
    }

    fn save<R: NoteRepository>(&mut self, store: &mut NotesStore<R>) -> StoreResult<SaveOutcome> {
        let Some(snapshot) = self.snapshot.as_mut() else {
            return Ok(SaveOutcome::NothingOpen);
        };

        store.update_note(&NoteUpdate::new(
            snapshot.id,
            self.title.clone(),
            self.content.clone(),
        ))?;
        snapshot.title = self.title.clone();
        snapshot.content = self.content.clone();
        Ok(SaveOutcome::Saved)
    }
}
