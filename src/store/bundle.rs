//! Version bundles
//!
//! A bundle packages one version's complete key → snapshot mapping together with the
//! version string so a hash database can be moved between installations without
//! re-running the hash producer.

use super::{HashRecord, HashStore};
use crate::error::StorageError;
use crate::types::PartitionKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Current bundle layout revision
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// One exported version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionBundle {
    pub format_version: u32,
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub partitions: BTreeMap<PartitionKey, Vec<HashRecord>>,
}

impl VersionBundle {
    /// Collect a version from the store.
    pub fn collect(store: &dyn HashStore, version: &str) -> Result<Self, StorageError> {
        let partitions = store.list_all(version)?.into_iter().collect();
        Ok(Self {
            format_version: BUNDLE_FORMAT_VERSION,
            version: version.to_string(),
            exported_at: Utc::now(),
            partitions,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, StorageError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let bundle: VersionBundle = bincode::deserialize(bytes)?;
        if bundle.format_version != BUNDLE_FORMAT_VERSION {
            return Err(StorageError::Serialization(format!(
                "unsupported bundle format {} (expected {})",
                bundle.format_version, BUNDLE_FORMAT_VERSION
            )));
        }
        Ok(bundle)
    }

    /// Register the bundle's version and write all partitions in one batch.
    pub fn install(self, store: &dyn HashStore) -> Result<usize, StorageError> {
        store.ensure_version(&self.version)?;
        let entries: Vec<(PartitionKey, Vec<HashRecord>)> = self.partitions.into_iter().collect();
        store.put_many(&self.version, &entries)?;
        store.flush()?;
        Ok(entries.len())
    }
}

/// Write a version of the store to a bundle file.
pub fn export_version(
    store: &dyn HashStore,
    version: &str,
    path: &Path,
) -> Result<usize, StorageError> {
    let bundle = VersionBundle::collect(store, version)?;
    let count = bundle.partitions.len();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, bundle.to_bytes()?)?;
    info!(version, partitions = count, path = %path.display(), "Exported version bundle");
    Ok(count)
}

/// Load a bundle file into the store, returning the imported version and partition count.
pub fn import_bundle(store: &dyn HashStore, path: &Path) -> Result<(String, usize), StorageError> {
    if !path.exists() {
        return Err(StorageError::InvalidPath(format!(
            "bundle file not found: {}",
            path.display()
        )));
    }
    let bundle = VersionBundle::from_bytes(&std::fs::read(path)?)?;
    let version = bundle.version.clone();
    let count = bundle.install(store)?;
    info!(version = %version, partitions = count, path = %path.display(), "Imported version bundle");
    Ok((version, count))
}
