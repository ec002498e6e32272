//! Error types
//!
//! Two layers: `StorageError` for the hash store and `ApiError` for everything a command
//! can fail with. Local, recoverable conditions (missing snapshots, missing actors,
//! unresolved entries) are not errors; they are reported as diagnostics by the resolver.

use std::path::PathBuf;
use thiserror::Error;

/// Hash store errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store could not be created or is held by another process.
    #[error("Hash store unavailable at {path:?}: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    /// A version sub-space was used before it was registered.
    #[error("Unknown version: {0}")]
    UnknownVersion(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Application-level errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    /// A partition identifier does not end in `_<X>_<Y>_<Z>_<LOD>`.
    #[error("Malformed partition identifier {identifier:?}: {reason}")]
    MalformedIdentifier { identifier: String, reason: String },

    #[error("Document error: {0}")]
    DocumentError(String),

    #[error("Hash producer error: {0}")]
    ProducerError(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::ProducerError(format!("{:#}", err))
    }
}
