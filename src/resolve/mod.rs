//! Resolution Engine
//!
//! Rewrites the node indices of an edit list from a source dataset version to a target
//! version. Every entry goes through up to three phases:
//!
//! 1. **Direct**: the target snapshot holds an equal record at the same index.
//! 2. **Rescan**: the first equal record anywhere in the target snapshot of the same
//!    partition.
//! 3. **Spatial**: entries still unplaced after a partition's first two phases are
//!    searched for in neighboring partitions, nearest first. A match moves the entry
//!    into the neighbor's output sector.
//!
//! Entries that survive all three phases are reported, never silently dropped.
//! Resolution is single-threaded and deterministic for a given store and input.

pub mod report;

use crate::document::{EditEntry, EditKind, Sector};
use crate::error::{ApiError, StorageError};
use crate::matcher::{match_actors, records_equal, requested_actor_hashes, ActorContext};
use crate::spatial::{self, KeyScheme};
use crate::store::{HashRecord, HashStore};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub use report::{
    Diagnostic, Relocation, ResolutionReport, ResolutionStats, UnresolvedEntry, UnresolvedReason,
};

/// Default neighbor search depth on each axis
pub const DEFAULT_MAX_SECTOR_DEPTH: u32 = 10;

/// Resolver tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Neighbor rings searched on each axis during the spatial phase
    pub max_sector_depth: u32,
    /// Maps partition paths to store keys
    pub key_scheme: KeyScheme,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            max_sector_depth: DEFAULT_MAX_SECTOR_DEPTH,
            key_scheme: KeyScheme::default(),
        }
    }
}

/// Rewritten sectors plus the report of the run
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Output sectors in first-use order
    pub sectors: Vec<Sector>,
    pub report: ResolutionReport,
}

impl Resolution {
    pub fn sector(&self, path: &str) -> Option<&Sector> {
        self.sectors.iter().find(|s| s.path == path)
    }
}

/// Output sectors keyed by path, kept in first-use order
#[derive(Default)]
struct OutputSectors {
    sectors: Vec<Sector>,
    by_path: HashMap<String, usize>,
}

impl OutputSectors {
    fn ensure(&mut self, path: &str, expected_nodes: usize) -> &mut Sector {
        let slot = match self.by_path.get(path) {
            Some(&slot) => slot,
            None => {
                self.sectors.push(Sector::new(path, expected_nodes));
                self.by_path.insert(path.to_string(), self.sectors.len() - 1);
                self.sectors.len() - 1
            }
        };
        &mut self.sectors[slot]
    }
}

/// An entry waiting for the spatial phase
struct PendingEntry {
    entry: EditEntry,
    old_record: HashRecord,
}

/// Pending entries addressed by a stable slot id; resolved slots are emptied
struct PendingArena {
    slots: Vec<Option<PendingEntry>>,
    remaining: usize,
}

impl PendingArena {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            remaining: 0,
        }
    }

    fn insert(&mut self, pending: PendingEntry) {
        self.slots.push(Some(pending));
        self.remaining += 1;
    }

    fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    /// Take every pending entry whose old record equals `record`, in slot order.
    fn take_matching(&mut self, record: &HashRecord) -> Vec<PendingEntry> {
        let mut taken = Vec::new();
        for slot in self.slots.iter_mut() {
            let matches = slot
                .as_ref()
                .map_or(false, |p| records_equal(&p.old_record, record));
            if matches {
                if let Some(pending) = slot.take() {
                    taken.push(pending);
                }
            }
        }
        self.remaining -= taken.len();
        taken
    }

    fn drain(self) -> impl Iterator<Item = PendingEntry> {
        self.slots.into_iter().flatten()
    }
}

/// Rewrites edit lists between two versions held in a hash store
pub struct ResolutionEngine<'a> {
    store: &'a dyn HashStore,
    from_version: String,
    to_version: String,
    options: ResolveOptions,
}

impl<'a> ResolutionEngine<'a> {
    /// Create an engine over two registered versions.
    ///
    /// Fails with `UnknownVersion` when either version is missing from the store.
    pub fn new(
        store: &'a dyn HashStore,
        from_version: &str,
        to_version: &str,
        options: ResolveOptions,
    ) -> Result<Self, ApiError> {
        for version in [from_version, to_version] {
            if !store.has_version(version)? {
                return Err(StorageError::UnknownVersion(version.to_string()).into());
            }
        }
        Ok(Self {
            store,
            from_version: from_version.to_string(),
            to_version: to_version.to_string(),
            options,
        })
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Resolve every sector of an edit list.
    pub fn resolve(&self, sectors: &[Sector]) -> Result<Resolution, ApiError> {
        let mut output = OutputSectors::default();
        let mut report = ResolutionReport::new(&self.from_version, &self.to_version);

        for sector in sectors {
            self.resolve_sector(sector, &mut output, &mut report)?;
        }

        info!(
            from = %self.from_version,
            to = %self.to_version,
            partitions = report.stats.partitions,
            entries = report.stats.entries,
            direct = report.stats.direct,
            rescanned = report.stats.rescanned,
            relocated = report.stats.relocated,
            unresolved = report.stats.unresolved,
            "Resolution finished"
        );

        Ok(Resolution {
            sectors: output.sectors,
            report,
        })
    }

    fn fetch(&self, version: &str, path: &str) -> Result<Option<Vec<HashRecord>>, ApiError> {
        let key = self.options.key_scheme.key_for(path);
        Ok(self.store.get(version, &key)?)
    }

    fn resolve_sector(
        &self,
        sector: &Sector,
        output: &mut OutputSectors,
        report: &mut ResolutionReport,
    ) -> Result<(), ApiError> {
        report.stats.partitions += 1;
        report.stats.entries += sector.entry_count();

        let old_snapshot = self.fetch(&self.from_version, &sector.path)?;
        let new_snapshot = self.fetch(&self.to_version, &sector.path)?;
        let (old_snapshot, new_snapshot) = match (old_snapshot, new_snapshot) {
            (Some(old), Some(new)) => (old, new),
            (old, _) => {
                let version = if old.is_none() {
                    &self.from_version
                } else {
                    &self.to_version
                };
                warn!(
                    partition = %sector.path,
                    version = %version,
                    entries = sector.entry_count(),
                    "Snapshot not found, skipping partition"
                );
                report.diagnostic(Diagnostic::SnapshotNotFound {
                    partition: sector.path.clone(),
                    version: version.clone(),
                });
                return Ok(());
            }
        };

        let source_out = output.ensure(&sector.path, new_snapshot.len());
        source_out.expected_nodes = new_snapshot.len();
        for (key, value) in &sector.fields {
            source_out
                .fields
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        let mut pending = PendingArena::new();
        for entry in sector.entries() {
            let old_record = match old_snapshot.get(entry.index) {
                Some(record) => record,
                None => {
                    warn!(
                        partition = %sector.path,
                        index = entry.index,
                        snapshot_len = old_snapshot.len(),
                        "Entry index outside source snapshot"
                    );
                    report.unresolved(unresolved(
                        &sector.path,
                        entry,
                        UnresolvedReason::SourceIndexOutOfRange,
                    ));
                    continue;
                }
            };

            // A shrunken target snapshot simply has no direct candidate.
            let direct = new_snapshot
                .get(entry.index)
                .filter(|candidate| records_equal(old_record, candidate));
            if let Some(new_record) = direct {
                let rebased =
                    rebase_entry(entry, old_record, new_record, entry.index, &sector.path, report);
                output.ensure(&sector.path, new_snapshot.len()).push(rebased);
                report.stats.direct += 1;
                continue;
            }

            if let Some(position) = new_snapshot
                .iter()
                .position(|candidate| records_equal(old_record, candidate))
            {
                debug!(
                    partition = %sector.path,
                    from = entry.index,
                    to = position,
                    "Entry found by rescan"
                );
                let rebased = rebase_entry(
                    entry,
                    old_record,
                    &new_snapshot[position],
                    position,
                    &sector.path,
                    report,
                );
                output.ensure(&sector.path, new_snapshot.len()).push(rebased);
                report.stats.rescanned += 1;
                continue;
            }

            pending.insert(PendingEntry {
                entry: entry.clone(),
                old_record: old_record.clone(),
            });
        }

        if !pending.is_empty() {
            self.spatial_search(sector, pending, output, report)?;
        }
        Ok(())
    }

    fn spatial_search(
        &self,
        sector: &Sector,
        mut pending: PendingArena,
        output: &mut OutputSectors,
        report: &mut ResolutionReport,
    ) -> Result<(), ApiError> {
        let center = match spatial::decode(&sector.path) {
            Ok(center) => center,
            Err(err) => {
                warn!(partition = %sector.path, error = %err, "Cannot search neighbors");
                report.diagnostic(Diagnostic::MalformedIdentifier {
                    partition: sector.path.clone(),
                    reason: err.to_string(),
                });
                for left in pending.drain() {
                    report.unresolved(unresolved(
                        &sector.path,
                        &left.entry,
                        UnresolvedReason::MalformedIdentifier,
                    ));
                }
                return Ok(());
            }
        };

        debug!(
            partition = %sector.path,
            pending = pending.remaining,
            depth = self.options.max_sector_depth,
            "Starting spatial search"
        );

        'neighbors: for coordinate in spatial::neighborhood(center, self.options.max_sector_depth) {
            // The source partition was already scanned in full.
            if coordinate == center {
                continue;
            }
            let neighbor_path = spatial::encode(&sector.path, coordinate)?;
            let snapshot = match self.fetch(&self.to_version, &neighbor_path)? {
                Some(snapshot) => snapshot,
                None => continue,
            };
            report.stats.neighbors_searched += 1;

            for (position, record) in snapshot.iter().enumerate() {
                for found in pending.take_matching(record) {
                    let rebased = rebase_entry(
                        &found.entry,
                        &found.old_record,
                        record,
                        position,
                        &neighbor_path,
                        report,
                    );
                    info!(
                        from = %sector.path,
                        from_index = found.entry.index,
                        to = %neighbor_path,
                        to_index = position,
                        "Entry relocated to neighboring partition"
                    );
                    report.relocations.push(Relocation {
                        from_partition: sector.path.clone(),
                        from_index: found.entry.index,
                        to_partition: neighbor_path.clone(),
                        to_index: position,
                    });
                    report.stats.relocated += 1;
                    output.ensure(&neighbor_path, snapshot.len()).push(rebased);
                }
                if pending.is_empty() {
                    break 'neighbors;
                }
            }
        }

        if !pending.is_empty() {
            let indices: Vec<usize> = pending
                .slots
                .iter()
                .flatten()
                .map(|p| p.entry.index)
                .collect();
            warn!(
                partition = %sector.path,
                count = indices.len(),
                indices = ?indices,
                "Could not resolve entries in partition or neighbors"
            );
        }
        for left in pending.drain() {
            report.unresolved(unresolved(&sector.path, &left.entry, UnresolvedReason::NoMatch));
        }
        Ok(())
    }
}

fn unresolved(partition: &str, entry: &EditEntry, reason: UnresolvedReason) -> UnresolvedEntry {
    UnresolvedEntry {
        partition: partition.to_string(),
        index: entry.index,
        kind: entry.kind_name(),
        node_type: entry.node_type().map(str::to_string),
        reason,
    }
}

/// Copy of `entry` pointing at `new_index`, with actor deletions mapped onto
/// `new_record` for instanced removals.
fn rebase_entry(
    entry: &EditEntry,
    old_record: &HashRecord,
    new_record: &HashRecord,
    new_index: usize,
    partition: &str,
    report: &mut ResolutionReport,
) -> EditEntry {
    let mut rebased = entry.clone();
    rebased.index = new_index;

    if let EditKind::InstancedRemoval {
        expected_actors,
        actor_deletions,
        ..
    } = &mut rebased.kind
    {
        if let (Some(old_actors), Some(new_actors)) =
            (&old_record.actor_hashes, &new_record.actor_hashes)
        {
            *expected_actors = new_actors.len() as i64;
            let requested = requested_actor_hashes(old_actors, actor_deletions);
            let context = ActorContext {
                partition,
                index: entry.index,
            };
            let matched = match_actors(&requested, new_actors, context);
            for missing in matched.missing {
                report.diagnostic(Diagnostic::ActorNotFound {
                    partition: partition.to_string(),
                    index: entry.index,
                    actor_index: missing.actor_index,
                });
            }
            *actor_deletions = matched.indices;
        }
    }
    rebased
}
