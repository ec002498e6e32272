//! Record matching
//!
//! Decides whether two hash records describe the same object across versions and maps
//! actor indices of instanced objects from the old actor array to the new one.

use crate::store::HashRecord;
use crate::types::ActorHash;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Equality of two hash records across versions.
///
/// Missing actor lists count as empty. Records are equal when the actor counts agree,
/// the structural hashes agree, and every actor hash of `a` occurs somewhere in `b`.
///
/// Actor membership is not a multiset comparison: two instanced objects with the same
/// structural hash and actor count can compare equal while holding different actors
/// when duplicates are involved. This is an accepted accuracy bound.
pub fn records_equal(a: &HashRecord, b: &HashRecord) -> bool {
    let old_actors = a.actors();
    let new_actors = b.actors();
    if old_actors.len() != new_actors.len() {
        return false;
    }
    a.structural_hash == b.structural_hash
        && old_actors.iter().all(|actor| new_actors.contains(actor))
}

/// Where an actor lookup happens, for diagnostics
#[derive(Debug, Clone, Copy)]
pub struct ActorContext<'a> {
    /// Partition the entry is being resolved into
    pub partition: &'a str,
    /// Source index of the entry
    pub index: usize,
}

/// An actor requested for deletion that no longer exists in the new record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingActor {
    /// Actor index in the old record
    pub actor_index: usize,
    pub actor_hash: ActorHash,
}

/// Outcome of mapping actor indices to a new record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorMatch {
    /// Positions in the new actor array, in request order
    pub indices: Vec<usize>,
    /// Requested actors not present in the new actor array
    pub missing: Vec<MissingActor>,
}

/// Map `(old actor index, hash)` pairs onto positions in `new_actor_hashes`.
///
/// Actors that cannot be found are logged with `context` and left out of the result.
pub fn match_actors(
    old_subset: &[(usize, ActorHash)],
    new_actor_hashes: &[ActorHash],
    context: ActorContext<'_>,
) -> ActorMatch {
    let mut result = ActorMatch::default();
    for &(actor_index, actor_hash) in old_subset {
        match new_actor_hashes.iter().position(|h| *h == actor_hash) {
            Some(position) => result.indices.push(position),
            None => {
                warn!(
                    partition = context.partition,
                    index = context.index,
                    actor_index,
                    "No matching actor found"
                );
                result.missing.push(MissingActor {
                    actor_index,
                    actor_hash,
                });
            }
        }
    }
    result
}

/// Pair each requested actor index with its hash in the old record.
///
/// Preserves the order of `old_actor_hashes`; requested indices outside the old actor
/// array have nothing to carry over and are skipped.
pub fn requested_actor_hashes(
    old_actor_hashes: &[ActorHash],
    requested: &[usize],
) -> Vec<(usize, ActorHash)> {
    old_actor_hashes
        .iter()
        .enumerate()
        .filter(|(i, _)| requested.contains(i))
        .map(|(i, h)| (i, *h))
        .collect()
}
