use jotter_core::{
    BlobNoteRepository, FileStorage, KvStorage, NewNote, NoteQuery, NoteRepository, NoteUpdate,
    QueryOptions, SqliteStorage, StorageBackend, StoreConfig,
};
use std::fs;
use std::sync::Arc;
use std::thread;

fn exercise_crud<S: KvStorage>(repo: &BlobNoteRepository<S>) {
    let id = repo
        .create(&NewNote::new("Initial Title", "Initial Content"))
        .unwrap();
    assert_eq!(
        repo.update(&NoteUpdate::new(id, "task 1", "task 1 content"))
            .unwrap(),
        1
    );
    let note = repo.get_note(id).unwrap().unwrap();
    assert_eq!(note.title, "task 1");
    assert_eq!(note.content, "task 1 content");
    assert_eq!(repo.delete_one(id).unwrap(), 1);
    assert!(repo
        .read(&NoteQuery::all(), &QueryOptions::default())
        .unwrap()
        .is_empty());
}

#[test]
fn file_backend_supports_full_crud() {
    let dir = tempfile::tempdir().unwrap();
    let repo = BlobNoteRepository::new(FileStorage::open(dir.path()).unwrap());
    exercise_crud(&repo);
}

#[test]
fn sqlite_backend_supports_full_crud() {
    let repo = BlobNoteRepository::new(SqliteStorage::open_in_memory().unwrap());
    exercise_crud(&repo);
}

#[test]
fn file_backend_persists_camel_case_json_array() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::open(dir.path()).unwrap();
    let repo = BlobNoteRepository::new(storage.clone());
    let id = repo.create(&NewNote::new("persisted", "body")).unwrap();

    let raw = fs::read_to_string(storage.item_path("notes").unwrap()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let entry = &value.as_array().unwrap()[0];
    assert_eq!(entry["id"], id.to_string());
    assert_eq!(entry["title"], "persisted");
    assert!(entry["createdAt"].is_i64());
    assert!(entry["updatedAt"].is_i64());

    let reopened = BlobNoteRepository::new(FileStorage::open(dir.path()).unwrap());
    assert_eq!(reopened.get_note(id).unwrap().unwrap().content, "body");
}

#[test]
fn sqlite_backend_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.db");

    let id = {
        let repo = BlobNoteRepository::new(SqliteStorage::open(&path).unwrap());
        repo.create(&NewNote::new("durable", "")).unwrap()
    };

    let repo = BlobNoteRepository::new(SqliteStorage::open(&path).unwrap());
    assert_eq!(repo.get_note(id).unwrap().unwrap().title, "durable");
}

#[test]
fn concurrent_creates_on_file_backend_lose_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(BlobNoteRepository::new(
        FileStorage::open(dir.path()).unwrap(),
    ));

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let repo = Arc::clone(&repo);
            thread::spawn(move || {
                for n in 0..5 {
                    repo.create(&NewNote::new(format!("w{worker}-{n}"), ""))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let rows = repo
        .read(&NoteQuery::all(), &QueryOptions::default())
        .unwrap();
    assert_eq!(rows.len(), 20);
}

#[test]
fn config_opens_sqlite_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::sqlite(dir.path().join("jotter.db"));

    let mut store = config.open_store().unwrap();
    assert!(matches!(store.repository().storage(), StorageBackend::Sqlite(_)));
    let id = store.add_note(&NewNote::new("from config", "")).unwrap();
    store.load_notes_list().unwrap();
    assert_eq!(store.note_list()[0].id, id);
}

#[test]
fn config_file_backend_uses_storage_key_as_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let source = format!(
        r#"{{ "backend": {{ "kind": "file", "dir": {} }}, "storage_key": "work" }}"#,
        serde_json::to_string(dir.path()).unwrap()
    );
    let config_path = dir.path().join("jotter.json");
    fs::write(&config_path, source).unwrap();

    let config = StoreConfig::load(&config_path).unwrap();
    let repo = config.open_repository().unwrap();
    repo.create(&NewNote::new("standup", "")).unwrap();

    assert_eq!(repo.key(), "work");
    assert!(dir.path().join("work.json").exists());
}
