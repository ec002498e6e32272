//! Core types shared across the store, matcher and resolver.

/// StructuralHash: 64-bit content hash of an object's index-invariant fields
pub type StructuralHash = u64;

/// ActorHash: 64-bit content hash of one sub-instance of an instanced object
pub type ActorHash = u64;

/// PartitionKey: abbreviated partition path used as the store key
pub type PartitionKey = String;
