use sector_reindex::document::{EditEntry, EditKind, Sector};
use sector_reindex::resolve::{
    Diagnostic, ResolutionEngine, ResolveOptions, UnresolvedReason,
};
use sector_reindex::store::{HashRecord, HashStore, SledHashStore};
use tempfile::TempDir;

const SOURCE: &str = "base\\worlds\\03_night_city\\_compiled\\default\\area_10_5_0_1.streamingsector";
const NEIGHBOR: &str = "base\\worlds\\03_night_city\\_compiled\\default\\area_11_5_0_1.streamingsector";
const SOURCE_KEY: &str = "03_night_city\\_compiled\\default\\area_10_5_0_1";
const NEIGHBOR_KEY: &str = "03_night_city\\_compiled\\default\\area_11_5_0_1";
const FAR_KEY: &str = "03_night_city\\_compiled\\default\\area_13_5_0_1";

const H1: u64 = 0x1111_0000_0000_0001;

fn plain(hashes: &[u64]) -> Vec<HashRecord> {
    hashes.iter().map(|h| HashRecord::new(*h)).collect()
}

fn open_store(dir: &TempDir) -> SledHashStore {
    let store = SledHashStore::open(&dir.path().join("store")).unwrap();
    store.ensure_version("2.1").unwrap();
    store.ensure_version("2.2").unwrap();
    store
}

#[test]
fn identical_snapshots_keep_every_index() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let snapshot = vec![
        HashRecord::new(1),
        HashRecord::instanced(2, vec![20, 21, 22]),
        HashRecord::new(3),
        HashRecord::new(1),
    ];
    store.put("2.1", SOURCE_KEY, &snapshot).unwrap();
    store.put("2.2", SOURCE_KEY, &snapshot).unwrap();

    let mut sector = Sector::new(SOURCE, 4);
    sector.push(EditEntry::removal(3));
    sector.push(EditEntry::instanced_removal(1, 3, vec![0, 2]));
    sector.push(EditEntry::mutation(2));

    let engine = ResolutionEngine::new(&store, "2.1", "2.2", ResolveOptions::default()).unwrap();
    let resolution = engine.resolve(&[sector.clone()]).unwrap();

    assert_eq!(resolution.sectors, vec![sector]);
    assert_eq!(resolution.report.stats.direct, 3);
    assert!(resolution.report.is_clean());
}

#[test]
fn entry_moves_to_neighbor_partition() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.put("2.1", SOURCE_KEY, &plain(&[10, 11, 12, H1, 14])).unwrap();
    store.put("2.2", SOURCE_KEY, &plain(&[10, 11, 12, 99, 14])).unwrap();
    store
        .put("2.2", NEIGHBOR_KEY, &plain(&[30, 31, 32, 33, 34, 35, 36, H1]))
        .unwrap();

    let mut sector = Sector::new(SOURCE, 5);
    sector.push(EditEntry::removal(3));
    sector.push(EditEntry::removal(0));

    let options = ResolveOptions {
        max_sector_depth: 1,
        ..Default::default()
    };
    let engine = ResolutionEngine::new(&store, "2.1", "2.2", options).unwrap();
    let resolution = engine.resolve(&[sector]).unwrap();

    let source = resolution.sector(SOURCE).unwrap();
    assert_eq!(source.node_deletions.len(), 1);
    assert_eq!(source.node_deletions[0].index, 0);

    let neighbor = resolution.sector(NEIGHBOR).unwrap();
    assert_eq!(neighbor.expected_nodes, 8);
    assert_eq!(neighbor.node_deletions.len(), 1);
    assert_eq!(neighbor.node_deletions[0].index, 7);

    assert_eq!(resolution.report.stats.relocated, 1);
    assert_eq!(resolution.report.relocations[0].to_partition, NEIGHBOR);
    assert!(resolution.report.unresolved.is_empty());
}

#[test]
fn nearest_neighbor_wins_when_several_hold_the_record() {
    const WEST: &str = "base\\worlds\\03_night_city\\_compiled\\default\\area_9_5_0_1.streamingsector";
    const WEST_KEY: &str = "03_night_city\\_compiled\\default\\area_9_5_0_1";

    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.put("2.1", SOURCE_KEY, &plain(&[H1])).unwrap();
    store.put("2.2", SOURCE_KEY, &plain(&[5])).unwrap();
    store.put("2.2", WEST_KEY, &plain(&[H1])).unwrap();
    store.put("2.2", NEIGHBOR_KEY, &plain(&[6, H1])).unwrap();

    let mut sector = Sector::new(SOURCE, 1);
    sector.push(EditEntry::removal(0));

    let options = ResolveOptions {
        max_sector_depth: 1,
        ..Default::default()
    };
    let engine = ResolutionEngine::new(&store, "2.1", "2.2", options).unwrap();
    let resolution = engine.resolve(&[sector]).unwrap();

    let east = resolution.sector(NEIGHBOR).unwrap();
    assert_eq!(east.node_deletions.len(), 1);
    assert_eq!(east.node_deletions[0].index, 1);
    assert!(resolution.sector(WEST).is_none());
    assert_eq!(resolution.report.stats.relocated, 1);
    assert_eq!(resolution.report.relocations[0].to_partition, NEIGHBOR);
}

#[test]
fn neighbor_beyond_depth_is_not_searched() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.put("2.1", SOURCE_KEY, &plain(&[H1])).unwrap();
    store.put("2.2", SOURCE_KEY, &plain(&[5])).unwrap();
    store.put("2.2", FAR_KEY, &plain(&[H1])).unwrap();

    let mut sector = Sector::new(SOURCE, 1);
    sector.push(EditEntry::removal(0));

    let shallow = ResolveOptions {
        max_sector_depth: 2,
        ..Default::default()
    };
    let engine = ResolutionEngine::new(&store, "2.1", "2.2", shallow).unwrap();
    let resolution = engine.resolve(&[sector.clone()]).unwrap();
    assert_eq!(resolution.report.unresolved.len(), 1);
    assert_eq!(resolution.report.unresolved[0].reason, UnresolvedReason::NoMatch);
    assert_eq!(resolution.report.unresolved[0].index, 0);
    for out in &resolution.sectors {
        assert_eq!(out.entry_count(), 0, "unresolved entry leaked into {}", out.path);
    }

    let deep = ResolveOptions {
        max_sector_depth: 3,
        ..Default::default()
    };
    let engine = ResolutionEngine::new(&store, "2.1", "2.2", deep).unwrap();
    let resolution = engine.resolve(&[sector]).unwrap();
    assert!(resolution.report.unresolved.is_empty());
    assert_eq!(resolution.report.stats.relocated, 1);
}

#[test]
fn reordered_actors_are_remapped() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let (a0, a1, a2) = (100, 101, 102);
    store
        .put(
            "2.1",
            SOURCE_KEY,
            &[HashRecord::new(1), HashRecord::instanced(7, vec![a0, a1, a2])],
        )
        .unwrap();
    store
        .put(
            "2.2",
            SOURCE_KEY,
            &[
                HashRecord::new(3),
                HashRecord::new(1),
                HashRecord::instanced(7, vec![a0, a2, a1]),
            ],
        )
        .unwrap();

    let mut sector = Sector::new(SOURCE, 2);
    sector.push(EditEntry::instanced_removal(1, 3, vec![1]));

    let engine = ResolutionEngine::new(&store, "2.1", "2.2", ResolveOptions::default()).unwrap();
    let resolution = engine.resolve(&[sector]).unwrap();

    let out = resolution.sector(SOURCE).unwrap();
    assert_eq!(out.expected_nodes, 3);
    let entry = &out.node_deletions[0];
    assert_eq!(entry.index, 2);
    match &entry.kind {
        EditKind::InstancedRemoval {
            expected_actors,
            actor_deletions,
            ..
        } => {
            assert_eq!(*expected_actors, 3);
            assert_eq!(actor_deletions, &vec![2]);
        }
        other => panic!("unexpected kind {:?}", other),
    }
    assert_eq!(resolution.report.stats.rescanned, 1);
}

#[test]
fn actor_indices_follow_reordered_actors_and_skip_out_of_range() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store
        .put("2.1", SOURCE_KEY, &[HashRecord::instanced(7, vec![1, 2, 3])])
        .unwrap();
    store
        .put("2.2", SOURCE_KEY, &[HashRecord::instanced(7, vec![3, 2, 1])])
        .unwrap();

    let mut sector = Sector::new(SOURCE, 1);
    sector.push(EditEntry::instanced_removal(0, 3, vec![0, 5]));

    let engine = ResolutionEngine::new(&store, "2.1", "2.2", ResolveOptions::default()).unwrap();
    let resolution = engine.resolve(&[sector]).unwrap();

    let entry = &resolution.sector(SOURCE).unwrap().node_deletions[0];
    match &entry.kind {
        EditKind::InstancedRemoval { actor_deletions, .. } => {
            assert_eq!(actor_deletions, &vec![2]);
        }
        other => panic!("unexpected kind {:?}", other),
    }
    assert!(resolution.report.is_clean());
}

#[test]
fn missing_target_snapshot_skips_only_that_partition() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.put("2.1", SOURCE_KEY, &plain(&[1])).unwrap();
    store.put("2.1", NEIGHBOR_KEY, &plain(&[2])).unwrap();
    store.put("2.2", NEIGHBOR_KEY, &plain(&[2])).unwrap();

    let mut missing = Sector::new(SOURCE, 1);
    missing.push(EditEntry::removal(0));
    let mut present = Sector::new(NEIGHBOR, 1);
    present.push(EditEntry::removal(0));

    let engine = ResolutionEngine::new(&store, "2.1", "2.2", ResolveOptions::default()).unwrap();
    let resolution = engine.resolve(&[missing, present]).unwrap();

    assert!(resolution.sector(SOURCE).is_none());
    assert_eq!(resolution.sector(NEIGHBOR).unwrap().node_deletions.len(), 1);
    assert_eq!(resolution.report.stats.skipped_partitions, 1);
    assert!(matches!(
        &resolution.report.diagnostics[0],
        Diagnostic::SnapshotNotFound { partition, version } if partition == SOURCE && version == "2.2"
    ));
}
