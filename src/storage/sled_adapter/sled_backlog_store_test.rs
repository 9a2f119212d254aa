use super::*;
use crate::test_utils::backlog_entry;
use crate::test_utils::candidate;
use crate::test_utils::day;
use crate::test_utils::temp_db;
use crate::BackLogStore;
use crate::FileKey;

#[test]
fn test_add_should_be_idempotent() {
    let (_dir, db) = temp_db();
    let store = SledBackLogStore::new(&db).unwrap();
    let entry = backlog_entry("s1", &candidate("F1", 1, day(1)));

    assert!(store.add(&entry).unwrap());
    assert!(!store.add(&entry).unwrap());

    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(store.list_ready("s1").unwrap(), vec![entry]);
}

#[test]
fn test_list_ready_should_only_return_one_subscriber_sorted_by_date() {
    let (_dir, db) = temp_db();
    let store = SledBackLogStore::new(&db).unwrap();
    store.add(&backlog_entry("s1", &candidate("F2", 1, day(2)))).unwrap();
    store.add(&backlog_entry("s1", &candidate("F1", 1, day(1)))).unwrap();
    store.add(&backlog_entry("s10", &candidate("F3", 1, day(3)))).unwrap();

    let ids: Vec<String> = store
        .list_ready("s1")
        .unwrap()
        .into_iter()
        .map(|e| e.file_id)
        .collect();
    assert_eq!(ids, vec!["F1", "F2"]);
    assert_eq!(store.list_ready("s10").unwrap().len(), 1);
    assert!(store.list_ready("missing").unwrap().is_empty());
}

#[test]
fn test_remove_should_delete_only_the_matching_version() {
    let (_dir, db) = temp_db();
    let store = SledBackLogStore::new(&db).unwrap();
    store.add(&backlog_entry("s1", &candidate("F1", 1, day(1)))).unwrap();
    store.add(&backlog_entry("s1", &candidate("F1", 2, day(1)))).unwrap();

    assert!(store.remove("s1", &FileKey::new("F1", 1)).unwrap());
    assert!(!store.remove("s1", &FileKey::new("F1", 1)).unwrap());

    let remaining = store.list_ready("s1").unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].version, 2);
}

#[test]
fn test_remove_subscriber_should_purge_its_entries() {
    let (_dir, db) = temp_db();
    let store = SledBackLogStore::new(&db).unwrap();
    store.add(&backlog_entry("s1", &candidate("F1", 1, day(1)))).unwrap();
    store.add(&backlog_entry("s1", &candidate("F2", 1, day(2)))).unwrap();
    store.add(&backlog_entry("s2", &candidate("F1", 1, day(1)))).unwrap();

    assert_eq!(store.remove_subscriber("s1").unwrap(), 2);
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn test_entries_should_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let entry = backlog_entry("s1", &candidate("F1", 1, day(1)));
    {
        let db = crate::init_sled_subscription_db(dir.path()).unwrap();
        let store = SledBackLogStore::new(&db).unwrap();
        store.add(&entry).unwrap();
    }
    let db = crate::init_sled_subscription_db(dir.path()).unwrap();
    let store = SledBackLogStore::new(&db).unwrap();
    assert_eq!(store.list_ready("s1").unwrap(), vec![entry]);
}
