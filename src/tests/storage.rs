use super::{JsonFileStore, MemoryStore, PersistenceStore};
use crate::error::Error;
use crate::model::Node;
use crate::persist::to_persisted;
use std::fs;

fn sample() -> crate::persist::PersistedNode {
    let mut root = Node::group("Bookmarks");
    root.push_child(Node::bookmark("main", "src/main.rs", 3)).unwrap();
    to_persisted(&root)
}

#[test]
fn test_json_file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("bookmarks.json");
    let mut store = JsonFileStore::new(&path);

    assert!(store.load().unwrap().is_none(), "nothing saved yet");

    let root = sample();
    store.save(&root).unwrap();

    assert!(path.exists());
    assert!(!path.with_extension("json.tmp").exists());
    assert_eq!(store.load().unwrap(), Some(root));
}

#[test]
fn test_json_file_store_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonFileStore::new(dir.path().join("bookmarks.json"));

    store.save(&sample()).unwrap();
    let empty = to_persisted(&Node::group("Bookmarks"));
    store.save(&empty).unwrap();

    assert_eq!(store.load().unwrap(), Some(empty));
}

#[test]
fn test_json_file_store_empty_file_is_nothing_saved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bookmarks.json");
    fs::write(&path, "  \n").unwrap();

    assert!(JsonFileStore::new(&path).load().unwrap().is_none());
}

#[test]
fn test_json_file_store_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bookmarks.json");
    fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
        JsonFileStore::new(&path).load(),
        Err(Error::Json(_))
    ));
}

#[test]
fn test_memory_store_shares_state_between_clones() {
    let observer = MemoryStore::new();
    let mut store = observer.clone();

    let root = sample();
    store.save(&root).unwrap();

    assert_eq!(observer.saves(), 1);
    assert_eq!(observer.last_saved(), Some(root));
}

#[test]
fn test_memory_store_failing_keeps_previous_save() {
    let root = sample();
    let mut store = MemoryStore::with_saved(root.clone());
    store.set_failing(true);

    let err = store.save(&to_persisted(&Node::group("other"))).unwrap_err();

    assert!(matches!(err, Error::Persistence { .. }));
    assert_eq!(store.saves(), 0);
    assert_eq!(store.load().unwrap(), Some(root));
}
