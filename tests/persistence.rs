//! Persistence Tests
//!
//! These tests drive `Database` over the on-disk store and check what a
//! fresh process sees after a flush.

use ctree_db::{Database, Error, Hash, MemoryStore, StorageKey, TreeConfig};
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_flush_and_reopen_scenario() {
    let dir = tempdir().unwrap();

    let c1 = {
        let db = Database::open_dir(dir.path()).unwrap();
        db.insert(b"a", b"1").unwrap();
        db.insert(b"b", b"2").unwrap();
        let c1 = db.commit().unwrap();
        db.flush().unwrap();
        c1
    };

    let db = Database::open_dir(dir.path()).unwrap();
    assert_eq!(db.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.commit().unwrap(), c1);
}

#[test]
fn test_round_trip_many_keys() {
    let dir = tempdir().unwrap();
    let entries: Vec<(Vec<u8>, Vec<u8>)> = (0..200u32)
        .map(|i| {
            (
                format!("account/{:04}", i * 7919 % 1000).into_bytes(),
                i.to_le_bytes().to_vec(),
            )
        })
        .collect();

    {
        let db = Database::open_dir(dir.path()).unwrap();
        for (key, value) in &entries {
            db.insert(key, value).unwrap();
        }
        db.close().unwrap();
    }

    let db = Database::open_dir(dir.path()).unwrap();
    for (key, value) in &entries {
        assert_eq!(db.get(key).unwrap().as_ref(), Some(value));
    }
}

#[test]
fn test_commitment_does_not_depend_on_residency() {
    let dir = tempdir().unwrap();
    let keys: [&[u8]; 6] = [b"apple", b"apricot", b"banana", b"band", b"b", b"cherry"];

    let expected = {
        let db = Database::open_dir(dir.path()).unwrap();
        for key in keys {
            db.insert(key, key).unwrap();
        }
        let expected = db.commit().unwrap();
        db.close().unwrap();
        expected
    };

    // Nothing resident.
    let cold = Database::open_dir(dir.path()).unwrap();
    assert_eq!(cold.stats().resident, 0);
    assert_eq!(cold.commit().unwrap(), expected);
    drop(cold);

    // Part of the tree resident.
    let warm = Database::open_dir(dir.path()).unwrap();
    warm.get(b"band").unwrap();
    assert!(warm.stats().hollow > 0);
    assert_eq!(warm.commit().unwrap(), expected);
    drop(warm);

    // Everything resident.
    let hot = Database::open_dir(dir.path()).unwrap();
    for key in keys {
        hot.get(key).unwrap();
    }
    assert_eq!(hot.stats().hollow, 0);
    assert_eq!(hot.commit().unwrap(), expected);
}

#[test]
fn test_updates_after_reopen_extend_stored_tree() {
    let dir = tempdir().unwrap();

    {
        let db = Database::open_dir(dir.path()).unwrap();
        db.insert(b"shared/one", b"1").unwrap();
        db.insert(b"shared/two", b"2").unwrap();
        db.close().unwrap();
    }

    let expected = {
        let db = Database::open_dir(dir.path()).unwrap();
        db.insert(b"shared", b"0").unwrap();
        db.insert(b"shared/two", b"22").unwrap();
        db.insert(b"other", b"3").unwrap();
        let expected = db.commit().unwrap();
        db.close().unwrap();
        expected
    };

    let db = Database::open_dir(dir.path()).unwrap();
    assert_eq!(db.get(b"shared").unwrap(), Some(b"0".to_vec()));
    assert_eq!(db.get(b"shared/one").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get(b"shared/two").unwrap(), Some(b"22".to_vec()));
    assert_eq!(db.get(b"other").unwrap(), Some(b"3".to_vec()));
    assert_eq!(db.commit().unwrap(), expected);
}

#[test]
fn test_unflushed_changes_are_not_visible_after_reopen() {
    let dir = tempdir().unwrap();

    let flushed = {
        let db = Database::open_dir(dir.path()).unwrap();
        db.insert(b"kept", b"1").unwrap();
        db.flush().unwrap();
        let flushed = db.commit().unwrap();
        db.insert(b"dropped", b"2").unwrap();
        flushed
    };

    let db = Database::open_dir(dir.path()).unwrap();
    assert_eq!(db.get(b"kept").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get(b"dropped").unwrap(), None);
    assert_eq!(db.commit().unwrap(), flushed);
}

#[test]
fn test_absence_is_not_an_error_but_missing_nodes_are() {
    let dir = tempdir().unwrap();
    let db = Database::open_dir(dir.path()).unwrap();

    assert_eq!(db.get(b"never-inserted").unwrap(), None);
    assert!(matches!(
        db.resolve_node(&StorageKey::root()),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_empty_store_opens_empty_tree() {
    let dir = tempdir().unwrap();
    let db = Database::open_dir(dir.path()).unwrap();
    assert_eq!(db.commit().unwrap(), Hash::ZERO);
    assert_eq!(db.get_unresolved(b"x").unwrap(), None);
    db.close().unwrap();

    let db = Database::open_dir(dir.path()).unwrap();
    assert_eq!(db.commit().unwrap(), Hash::ZERO);
}

#[test]
fn test_unresolved_read_does_not_corrupt_tree() {
    let dir = tempdir().unwrap();

    {
        let db = Database::open_dir(dir.path()).unwrap();
        db.insert(b"x", b"1").unwrap();
        db.insert(b"y", b"2").unwrap();
        db.close().unwrap();
    }

    let db = Database::open_dir(dir.path()).unwrap();
    let err = db.get_unresolved(b"x").unwrap_err();
    assert!(matches!(err, Error::UnresolvedNode(_)));
    assert!(!err.is_retryable());

    db.insert(b"z", b"3").unwrap();
    assert_eq!(db.get(b"x").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get_unresolved(b"z").unwrap(), Some(b"3".to_vec()));
}

#[test]
fn test_independent_resolution_is_equivalent() {
    let store = Arc::new(MemoryStore::new());

    {
        let db = Database::with_store(Arc::clone(&store), TreeConfig::default()).unwrap();
        for i in 0..50u8 {
            db.insert(&[b'k', i % 5, i], &[i]).unwrap();
        }
        db.flush().unwrap();
    }

    // Two trees resolve the same stored nodes through different paths.
    let first = Database::with_store(Arc::clone(&store), TreeConfig::default()).unwrap();
    let second = Database::with_store(Arc::clone(&store), TreeConfig::default()).unwrap();
    first.get(&[b'k', 0, 0]).unwrap();
    second.get(&[b'k', 4, 49]).unwrap();
    second.get(&[b'k', 0, 0]).unwrap();

    for tree in [&first, &second] {
        tree.insert(&[b'k', 2, 200], b"new").unwrap();
        tree.insert(&[b'k', 3, 3], b"changed").unwrap();
    }

    assert_eq!(first.commit().unwrap(), second.commit().unwrap());
    for i in 0..50u8 {
        let key = [b'k', i % 5, i];
        assert_eq!(first.get(&key).unwrap(), second.get(&key).unwrap());
    }
}

#[test]
fn test_sync_writes_config() {
    let dir = tempdir().unwrap();
    let config = TreeConfig::new(dir.path()).with_sync_writes(true);

    {
        let db = Database::open(&config).unwrap();
        db.insert(b"durable", b"yes").unwrap();
        assert_eq!(db.flush().unwrap().nodes, 1);
    }

    let db = Database::open(&config).unwrap();
    assert_eq!(db.get(b"durable").unwrap(), Some(b"yes".to_vec()));
}
