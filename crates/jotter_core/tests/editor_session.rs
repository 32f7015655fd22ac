use jotter_core::{
    BlobNoteRepository, EditorSession, MemoryStorage, NewNote, NoteRepository, NotesStore,
    SaveOutcome, StoreError,
};
use uuid::Uuid;

type MemoryStore = NotesStore<BlobNoteRepository<MemoryStorage>>;

fn open_store() -> MemoryStore {
    NotesStore::new(BlobNoteRepository::new(MemoryStorage::new()))
}

fn stored_note(store: &MemoryStore, id: Uuid) -> jotter_core::Note {
    store.repository().get_note(id).unwrap().unwrap()
}

#[test]
fn nothing_open_never_saves() {
    let mut store = open_store();
    let mut session = EditorSession::new();
    session.set_title("draft");

    assert_eq!(
        session.on_title_blur(&mut store).unwrap(),
        SaveOutcome::NothingOpen
    );
    assert_eq!(session.flush(&mut store).unwrap(), SaveOutcome::NothingOpen);
    assert!(!session.is_dirty());
}

#[test]
fn title_blur_saves_only_changed_title() {
    let mut store = open_store();
    let id = store
        .add_note(&NewNote::new("Initial Title", "Initial Content"))
        .unwrap();
    let mut session = EditorSession::new();
    let outcome = session.switch_to(&mut store, Some(id));
    assert_eq!(outcome.saved.unwrap(), SaveOutcome::NothingOpen);
    outcome.selected.unwrap();

    session.set_content("typed but not blurred");
    assert_eq!(
        session.on_title_blur(&mut store).unwrap(),
        SaveOutcome::Unchanged
    );
    assert_eq!(stored_note(&store, id).content, "Initial Content");

    session.set_title("task 1");
    assert_eq!(session.on_title_blur(&mut store).unwrap(), SaveOutcome::Saved);
    let note = stored_note(&store, id);
    assert_eq!(note.title, "task 1");
    assert_eq!(note.content, "typed but not blurred");
    assert!(!session.is_dirty());
}

#[test]
fn repeated_flush_of_same_draft_writes_once() {
    fn fixed_clock() -> i64 {
        1_000
    }

    let repo = BlobNoteRepository::new(MemoryStorage::new()).with_clock(fixed_clock);
    let mut store = NotesStore::new(repo);
    let id = store.add_note(&NewNote::new("a", "")).unwrap();
    let mut session = EditorSession::new();
    session.switch_to(&mut store, Some(id)).selected.unwrap();

    session.set_content("task 1 content");
    assert!(session.is_dirty());
    assert_eq!(session.flush(&mut store).unwrap(), SaveOutcome::Saved);
    assert_eq!(session.flush(&mut store).unwrap(), SaveOutcome::Unchanged);
    assert_eq!(stored_note(&store, id).content, "task 1 content");
}

#[test]
fn switching_notes_saves_previous_draft() {
    let mut store = open_store();
    let first = store.add_note(&NewNote::new("first", "one")).unwrap();
    let second = store.add_note(&NewNote::new("second", "two")).unwrap();
    store.load_notes_list().unwrap();

    let mut session = EditorSession::new();
    session.switch_to(&mut store, Some(first)).selected.unwrap();
    session.set_content("one, edited");

    let outcome = session.switch_to(&mut store, Some(second));
    assert_eq!(outcome.saved.unwrap(), SaveOutcome::Saved);
    outcome.selected.unwrap();

    assert_eq!(session.open_id(), Some(second));
    assert_eq!(session.content(), "two");
    assert_eq!(stored_note(&store, first).content, "one, edited");
}

#[test]
fn failed_selection_keeps_session_on_previous_note() {
    let mut store = open_store();
    let id = store.add_note(&NewNote::new("kept", "body")).unwrap();
    let mut session = EditorSession::new();
    session.switch_to(&mut store, Some(id)).selected.unwrap();

    let outcome = session.switch_to(&mut store, Some(Uuid::new_v4()));
    assert!(matches!(outcome.selected, Err(StoreError::NotFound(_))));
    assert_eq!(session.open_id(), Some(id));
    assert_eq!(session.title(), "kept");
}

#[test]
fn save_against_deleted_note_fails_and_keeps_draft() {
    let mut store = open_store();
    let id = store.add_note(&NewNote::new("doomed", "")).unwrap();
    let mut session = EditorSession::new();
    session.switch_to(&mut store, Some(id)).selected.unwrap();

    store.repository().delete_one(id).unwrap();
    session.set_title("still typing");

    let err = session.on_title_blur(&mut store).unwrap_err();
    assert!(matches!(err, StoreError::ZeroRowsAffected { .. }));
    assert_eq!(
        err.user_message(),
        "Failed to save the note. Please try again."
    );
    assert!(session.is_dirty());
    assert_eq!(session.title(), "still typing");
}

#[test]
fn close_flushes_and_clears() {
    let mut store = open_store();
    let id = store.add_note(&NewNote::new("t", "c")).unwrap();
    let mut session = EditorSession::new();
    session.switch_to(&mut store, Some(id)).selected.unwrap();
    session.set_title("t2");

    assert_eq!(session.close(&mut store).unwrap(), SaveOutcome::Saved);
    assert_eq!(session.open_id(), None);
    assert_eq!(session.title(), "");
    assert_eq!(stored_note(&store, id).title, "t2");
}
