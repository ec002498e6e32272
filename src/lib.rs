//! sector-reindex: Identity Resolution for World Sector Edits
//!
//! Edit lists address nodes of a streamed world partition by their position in the
//! partition. Dataset updates reorder, insert and move nodes, so those positions go
//! stale. This crate keeps per-version structural hashes of every partition and uses
//! them to rebase edit lists from one dataset version onto another: same index first,
//! then anywhere in the same partition, then in nearby partitions.

pub mod config;
pub mod document;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod matcher;
pub mod resolve;
pub mod spatial;
pub mod store;
pub mod tooling;
pub mod types;

pub use document::{EditDocument, EditEntry, EditKind, Sector};
pub use error::{ApiError, StorageError};
pub use resolve::{Resolution, ResolutionEngine, ResolutionReport, ResolveOptions};
pub use store::{HashRecord, HashStore, SledHashStore};
