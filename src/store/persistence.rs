//! Sled-backed hash store.
//!
//! One sled tree per dataset version plus an index tree listing the registered version
//! names. Sled writes are atomic per key and per batch, readers never wait on writers,
//! and a crash can only lose writes that were not yet flushed.

use super::{decode_snapshot, encode_snapshot, HashRecord, HashStore, StoreStats};
use crate::error::StorageError;
use crate::types::PartitionKey;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const VERSION_INDEX_TREE: &str = "__version_index";
const VERSION_TREE_PREFIX: &str = "version/";

fn version_tree_name(version: &str) -> String {
    format!("{}{}", VERSION_TREE_PREFIX, version)
}

/// Hash store persisted in a sled database
pub struct SledHashStore {
    db: sled::Db,
    path: Option<PathBuf>,
    index: sled::Tree,
    /// Open trees of registered versions
    versions: RwLock<HashMap<String, sled::Tree>>,
}

impl SledHashStore {
    /// Open or create the store at `path`.
    ///
    /// Fails fast with `StoreUnavailable` when the directory cannot be created or the
    /// database is locked by another process.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(path).map_err(|e| StorageError::StoreUnavailable {
            path: path.to_path_buf(),
            reason: format!("cannot create store directory: {}", e),
        })?;
        let db = sled::Config::new()
            .path(path)
            .open()
            .map_err(|e| StorageError::StoreUnavailable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let mut store = Self::from_db(db)?;
        store.path = Some(path.to_path_buf());
        Ok(store)
    }

    /// Store that lives only as long as the handle.
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    /// Attach to an already open sled database, loading the version index.
    pub fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let index = db.open_tree(VERSION_INDEX_TREE)?;
        let mut versions = HashMap::new();
        for item in index.iter() {
            let (key, _) = item?;
            let name = String::from_utf8(key.to_vec()).map_err(|e| {
                StorageError::Serialization(format!("non UTF-8 version name in index: {}", e))
            })?;
            let tree = db.open_tree(version_tree_name(&name))?;
            versions.insert(name, tree);
        }
        debug!(versions = versions.len(), "Loaded version index");
        Ok(Self {
            db,
            path: None,
            index,
            versions: RwLock::new(versions),
        })
    }

    /// Directory of the store, `None` for temporary stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn tree(&self, version: &str) -> Result<sled::Tree, StorageError> {
        self.versions
            .read()
            .get(version)
            .cloned()
            .ok_or_else(|| StorageError::UnknownVersion(version.to_string()))
    }
}

impl HashStore for SledHashStore {
    fn ensure_version(&self, version: &str) -> Result<(), StorageError> {
        if version.trim().is_empty() {
            return Err(StorageError::InvalidPath(
                "version name cannot be empty".to_string(),
            ));
        }
        if self.versions.read().contains_key(version) {
            return Ok(());
        }

        let mut versions = self.versions.write();
        // Another producer may have registered it between the two locks.
        if versions.contains_key(version) {
            return Ok(());
        }
        let tree = self.db.open_tree(version_tree_name(version))?;
        self.index.insert(version.as_bytes(), &[] as &[u8])?;
        versions.insert(version.to_string(), tree);
        debug!(version, "Registered version");
        Ok(())
    }

    fn versions(&self) -> Result<Vec<String>, StorageError> {
        let mut names: Vec<String> = self.versions.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn has_version(&self, version: &str) -> Result<bool, StorageError> {
        Ok(self.versions.read().contains_key(version))
    }

    fn put(
        &self,
        version: &str,
        key: &str,
        records: &[HashRecord],
    ) -> Result<(), StorageError> {
        let tree = self.tree(version)?;
        let bytes = encode_snapshot(records)?;
        tree.insert(key.as_bytes(), bytes)?;
        Ok(())
    }

    fn put_many(
        &self,
        version: &str,
        entries: &[(PartitionKey, Vec<HashRecord>)],
    ) -> Result<(), StorageError> {
        let tree = self.tree(version)?;
        let mut batch = sled::Batch::default();
        for (key, records) in entries {
            batch.insert(key.as_bytes(), encode_snapshot(records)?);
        }
        tree.apply_batch(batch)?;
        Ok(())
    }

    fn get(&self, version: &str, key: &str) -> Result<Option<Vec<HashRecord>>, StorageError> {
        let tree = self.tree(version)?;
        match tree.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(decode_snapshot(&bytes)?)),
            None => Ok(None),
        }
    }

    fn contains(&self, version: &str, key: &str) -> Result<bool, StorageError> {
        Ok(self.tree(version)?.contains_key(key.as_bytes())?)
    }

    fn list_all(
        &self,
        version: &str,
    ) -> Result<Vec<(PartitionKey, Vec<HashRecord>)>, StorageError> {
        let tree = self.tree(version)?;
        let mut out = Vec::with_capacity(tree.len());
        for item in tree.iter() {
            let (key, value) = item?;
            let key = String::from_utf8(key.to_vec()).map_err(|e| {
                StorageError::Serialization(format!("non UTF-8 partition key: {}", e))
            })?;
            out.push((key, decode_snapshot(&value)?));
        }
        Ok(out)
    }

    fn stats(&self, version: &str) -> Result<StoreStats, StorageError> {
        let tree = self.tree(version)?;
        let mut payload_bytes = 0u64;
        for value in tree.iter().values() {
            payload_bytes += value?.len() as u64;
        }
        Ok(StoreStats {
            entries: tree.len() as u64,
            payload_bytes,
            size_on_disk: self.db.size_on_disk()?,
        })
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}
