//! Hash Store
//!
//! Versioned persistence of partition snapshots. Each dataset version owns a named
//! sub-space mapping an abbreviated partition key to the ordered array of hash records
//! of that partition. Snapshots are written once by a hash producer and read many times
//! by the resolver.

pub mod bundle;
pub mod persistence;

use crate::error::StorageError;
use crate::types::{ActorHash, PartitionKey, StructuralHash};
use serde::{Deserialize, Serialize};

pub use persistence::SledHashStore;

/// HashRecord: identity of one object in a partition snapshot
///
/// Array position inside a snapshot is the version-local index and carries no meaning
/// across versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashRecord {
    /// Content hash of the object's structural fields
    pub structural_hash: StructuralHash,
    /// One hash per sub-instance, only present for instanced objects
    pub actor_hashes: Option<Vec<ActorHash>>,
}

impl HashRecord {
    pub fn new(structural_hash: StructuralHash) -> Self {
        Self {
            structural_hash,
            actor_hashes: None,
        }
    }

    pub fn instanced(structural_hash: StructuralHash, actor_hashes: Vec<ActorHash>) -> Self {
        Self {
            structural_hash,
            actor_hashes: Some(actor_hashes),
        }
    }

    /// Actor hashes, with a missing list read as empty
    pub fn actors(&self) -> &[ActorHash] {
        self.actor_hashes.as_deref().unwrap_or(&[])
    }
}

/// Size and entry count of one version sub-space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of partition snapshots stored for the version
    pub entries: u64,
    /// Total encoded size of those snapshots in bytes
    pub payload_bytes: u64,
    /// Size of the whole store on disk
    pub size_on_disk: u64,
}

/// Hash store interface
///
/// Implementations must tolerate concurrent `put` calls from several producer tasks and
/// must never expose a partially written snapshot to readers.
pub trait HashStore: Send + Sync {
    /// Register a version sub-space. No-op when it already exists.
    fn ensure_version(&self, version: &str) -> Result<(), StorageError>;

    /// Registered version names in key order
    fn versions(&self) -> Result<Vec<String>, StorageError>;

    fn has_version(&self, version: &str) -> Result<bool, StorageError> {
        Ok(self.versions()?.iter().any(|v| v == version))
    }

    /// Insert or overwrite one partition snapshot.
    fn put(
        &self,
        version: &str,
        key: &str,
        records: &[HashRecord],
    ) -> Result<(), StorageError>;

    /// Write many snapshots in one atomic batch.
    fn put_many(
        &self,
        version: &str,
        entries: &[(PartitionKey, Vec<HashRecord>)],
    ) -> Result<(), StorageError>;

    fn get(&self, version: &str, key: &str) -> Result<Option<Vec<HashRecord>>, StorageError>;

    fn contains(&self, version: &str, key: &str) -> Result<bool, StorageError>;

    /// Full ordered scan of a version sub-space.
    fn list_all(&self, version: &str) -> Result<Vec<(PartitionKey, Vec<HashRecord>)>, StorageError>;

    fn stats(&self, version: &str) -> Result<StoreStats, StorageError>;

    /// Block until all committed writes are durable.
    fn flush(&self) -> Result<(), StorageError>;
}

/// Encode a snapshot the way it is persisted
pub fn encode_snapshot(records: &[HashRecord]) -> Result<Vec<u8>, StorageError> {
    Ok(bincode::serialize(records)?)
}

/// Decode a persisted snapshot
pub fn decode_snapshot(bytes: &[u8]) -> Result<Vec<HashRecord>, StorageError> {
    Ok(bincode::deserialize(bytes)?)
}
