//! Resolution report
//!
//! Everything the resolver skipped, dropped or could not place, each attributed to a
//! partition and an index, plus per-phase counters.

use serde::Serialize;

/// Why an entry could not be placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// No equal record in the partition or any neighbor within the search depth
    NoMatch,
    /// The entry's index is past the end of the source snapshot
    SourceIndexOutOfRange,
    /// The partition path has no coordinates, so no neighbors could be searched
    MalformedIdentifier,
}

/// An entry left out of every output partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedEntry {
    pub partition: String,
    /// Index in the source version
    pub index: usize,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    pub reason: UnresolvedReason,
}

/// An entry moved to a neighboring partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relocation {
    pub from_partition: String,
    pub from_index: usize,
    pub to_partition: String,
    pub to_index: usize,
}

/// Non-fatal events during resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A snapshot was missing; the partition's edits were skipped
    SnapshotNotFound { partition: String, version: String },
    /// An actor requested for deletion no longer exists; it was dropped from the entry
    ActorNotFound {
        partition: String,
        index: usize,
        actor_index: usize,
    },
    /// The spatial phase of a partition could not run
    MalformedIdentifier { partition: String, reason: String },
}

/// Per-phase counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionStats {
    pub partitions: usize,
    pub skipped_partitions: usize,
    pub entries: usize,
    /// Matched at the same index
    pub direct: usize,
    /// Matched elsewhere in the same partition
    pub rescanned: usize,
    /// Matched in a neighboring partition
    pub relocated: usize,
    pub unresolved: usize,
    pub dropped_actors: usize,
    pub neighbors_searched: usize,
}

/// Outcome of one resolution run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionReport {
    pub from_version: String,
    pub to_version: String,
    pub stats: ResolutionStats,
    pub unresolved: Vec<UnresolvedEntry>,
    pub relocations: Vec<Relocation>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolutionReport {
    pub fn new(from_version: &str, to_version: &str) -> Self {
        Self {
            from_version: from_version.to_string(),
            to_version: to_version.to_string(),
            ..Default::default()
        }
    }

    /// True when every entry was placed and nothing was skipped or dropped
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty() && self.diagnostics.is_empty()
    }

    pub(crate) fn unresolved(&mut self, entry: UnresolvedEntry) {
        self.stats.unresolved += 1;
        self.unresolved.push(entry);
    }

    pub(crate) fn diagnostic(&mut self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::ActorNotFound { .. } => self.stats.dropped_actors += 1,
            Diagnostic::SnapshotNotFound { .. } => self.stats.skipped_partitions += 1,
            Diagnostic::MalformedIdentifier { .. } => {}
        }
        self.diagnostics.push(diagnostic);
    }
}
