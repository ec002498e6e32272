use sector_reindex::error::StorageError;
use sector_reindex::store::bundle::{export_version, import_bundle};
use sector_reindex::store::{HashRecord, HashStore, SledHashStore};
use std::sync::Arc;
use tempfile::TempDir;

fn snapshot(seed: u64) -> Vec<HashRecord> {
    vec![
        HashRecord::new(seed),
        HashRecord::instanced(seed + 1, vec![seed * 10, seed * 10 + 1]),
    ]
}

#[test]
fn versions_and_snapshots_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store");
    {
        let store = SledHashStore::open(&path).unwrap();
        store.ensure_version("2.1").unwrap();
        store.ensure_version("2.2").unwrap();
        store.put("2.1", "a\\area_0_0_0_1", &snapshot(1)).unwrap();
        store.put("2.2", "a\\area_0_0_0_1", &snapshot(2)).unwrap();
        store.flush().unwrap();
    }

    let store = SledHashStore::open(&path).unwrap();
    assert_eq!(store.versions().unwrap(), vec!["2.1".to_string(), "2.2".to_string()]);
    assert_eq!(store.get("2.1", "a\\area_0_0_0_1").unwrap(), Some(snapshot(1)));
    assert_eq!(store.get("2.2", "a\\area_0_0_0_1").unwrap(), Some(snapshot(2)));
    assert_eq!(store.stats("2.1").unwrap().entries, 1);
}

#[test]
fn unknown_version_is_an_error_not_an_empty_result() {
    let store = SledHashStore::temporary().unwrap();
    assert!(matches!(
        store.get("9.9", "k"),
        Err(StorageError::UnknownVersion(v)) if v == "9.9"
    ));
    assert!(matches!(
        store.list_all("9.9"),
        Err(StorageError::UnknownVersion(_))
    ));
}

#[test]
fn bundle_moves_a_version_between_stores() {
    let dir = TempDir::new().unwrap();
    let source = SledHashStore::open(&dir.path().join("source")).unwrap();
    source.ensure_version("2.1").unwrap();
    for i in 0..25u64 {
        source
            .put("2.1", &format!("a\\area_{}_0_0_1", i), &snapshot(i))
            .unwrap();
    }
    let bundle = dir.path().join("bundles").join("2.1.bundle");
    assert_eq!(export_version(&source, "2.1", &bundle).unwrap(), 25);

    let target = SledHashStore::open(&dir.path().join("target")).unwrap();
    let (version, count) = import_bundle(&target, &bundle).unwrap();
    assert_eq!((version.as_str(), count), ("2.1", 25));
    assert_eq!(target.list_all("2.1").unwrap(), source.list_all("2.1").unwrap());
}

#[test]
fn readers_see_whole_snapshots_while_writers_commit() {
    let store = Arc::new(SledHashStore::temporary().unwrap());
    store.ensure_version("2.2").unwrap();
    let long = |seed: u64| -> Vec<HashRecord> { (0..200).map(|i| HashRecord::new(seed + i)).collect() };
    store.put("2.2", "hot", &long(0)).unwrap();

    let writer = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || {
            for round in 1..50u64 {
                store.put("2.2", "hot", &long(round * 1000)).unwrap();
            }
        })
    };
    for _ in 0..200 {
        let records = store.get("2.2", "hot").unwrap().unwrap();
        assert_eq!(records.len(), 200);
        let base = records[0].structural_hash;
        assert!(records
            .iter()
            .enumerate()
            .all(|(i, r)| r.structural_hash == base + i as u64));
    }
    writer.join().unwrap();
}
