//! Ingest
//!
//! Fills a version of the hash store from a hash producer. The producer is the seam to
//! whatever reads the game data; this crate ships `JsonObjectProducer`, which hashes
//! per-partition JSON exports.
//!
//! Partitions are produced with bounded parallelism. A failing partition is logged and
//! counted and never aborts the run.

use crate::error::ApiError;
use crate::spatial::KeyScheme;
use crate::store::{HashRecord, HashStore};
use crate::types::StructuralHash;
use anyhow::{bail, Context};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Source of per-partition hash snapshots for one dataset version
pub trait HashProducer: Send + Sync {
    /// Partition paths this producer can hash.
    fn partitions(&self) -> anyhow::Result<Vec<String>>;

    /// Records of one partition, in node order.
    fn produce(&self, partition: &str) -> anyhow::Result<Vec<HashRecord>>;
}

const EXPORT_EXTENSION: &str = "json";

/// One node of a partition export
#[derive(Debug, Deserialize)]
struct ExportedNode {
    structural: Value,
    #[serde(default)]
    actors: Option<Vec<Value>>,
}

/// Hashes a directory tree of partition exports
///
/// A partition `base\worlds\a\area_0_0_0_1.streamingsector` is read from
/// `<root>/base/worlds/a/area_0_0_0_1.streamingsector.json`: a JSON array with one
/// `{ "structural": ..., "actors": [...] }` object per node. `actors` is omitted or null
/// for nodes that are not instanced.
#[derive(Debug, Clone)]
pub struct JsonObjectProducer {
    root: PathBuf,
}

impl JsonObjectProducer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file_for(&self, partition: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in partition.split(['\\', '/']).filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path.set_file_name(format!(
            "{}.{}",
            path.file_name().and_then(|n| n.to_str()).unwrap_or_default(),
            EXPORT_EXTENSION
        ));
        path
    }

    fn partition_for(&self, file: &Path) -> Option<String> {
        let relative = file.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        let joined = parts.join("\\");
        joined
            .strip_suffix(&format!(".{}", EXPORT_EXTENSION))
            .map(str::to_string)
    }
}

impl HashProducer for JsonObjectProducer {
    fn partitions(&self) -> anyhow::Result<Vec<String>> {
        if !self.root.is_dir() {
            bail!("export directory {} does not exist", self.root.display());
        }
        let mut partitions = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.with_context(|| format!("walking {}", self.root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let is_export = entry
                .path()
                .extension()
                .map_or(false, |ext| ext == EXPORT_EXTENSION);
            if !is_export {
                continue;
            }
            if let Some(partition) = self.partition_for(entry.path()) {
                partitions.push(partition);
            }
        }
        Ok(partitions)
    }

    fn produce(&self, partition: &str) -> anyhow::Result<Vec<HashRecord>> {
        let file = self.file_for(partition);
        let content = std::fs::read_to_string(&file)
            .with_context(|| format!("reading {}", file.display()))?;
        let nodes: Vec<ExportedNode> = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", file.display()))?;
        nodes
            .iter()
            .map(|node| {
                let structural = hash_value(&node.structural)?;
                Ok(match &node.actors {
                    Some(actors) => HashRecord::instanced(
                        structural,
                        actors.iter().map(hash_value).collect::<anyhow::Result<_>>()?,
                    ),
                    None => HashRecord::new(structural),
                })
            })
            .collect()
    }
}

/// 64-bit hash of a JSON value: the first eight bytes, little endian, of the BLAKE3
/// digest of its canonical (key-sorted, compact) encoding.
pub fn hash_value(value: &Value) -> anyhow::Result<StructuralHash> {
    let bytes = serde_json::to_vec(&canonicalize(value)).context("encoding canonical JSON")?;
    let digest = blake3::hash(&bytes);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    Ok(StructuralHash::from_le_bytes(prefix))
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Ingest tuning
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub parallelism: usize,
    pub skip_existing: bool,
    pub key_scheme: KeyScheme,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            parallelism: 4,
            skip_existing: true,
            key_scheme: KeyScheme::default(),
        }
    }
}

/// A partition that could not be produced or stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestFailure {
    pub partition: String,
    pub error: String,
}

/// Outcome of an ingest run
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub version: String,
    /// Partitions written
    pub stored: usize,
    /// Partitions left alone because the version already had them
    pub skipped: usize,
    /// Records written across all partitions
    pub records: usize,
    pub failures: Vec<IngestFailure>,
}

enum PartitionOutcome {
    Stored(usize),
    Skipped,
}

/// Drives a producer into one version of the store
pub struct IngestPipeline {
    store: Arc<dyn HashStore>,
    producer: Arc<dyn HashProducer>,
    options: IngestOptions,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn HashStore>,
        producer: Arc<dyn HashProducer>,
        options: IngestOptions,
    ) -> Self {
        Self {
            store,
            producer,
            options,
        }
    }

    /// Run to completion on a dedicated runtime.
    pub fn run(&self, version: &str) -> Result<IngestReport, ApiError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(ApiError::ProducerError(
                "Cannot block on ingest from within an async runtime; use run_async".to_string(),
            ));
        }
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| ApiError::ProducerError(format!("Failed to create runtime: {}", e)))?;
        rt.block_on(self.run_async(version))
    }

    /// Produce and store every partition the producer lists.
    pub async fn run_async(&self, version: &str) -> Result<IngestReport, ApiError> {
        self.store.ensure_version(version)?;
        let partitions = self.producer.partitions()?;
        info!(
            version = version,
            partitions = partitions.len(),
            parallelism = self.options.parallelism,
            "Starting ingest"
        );

        let outcomes: Vec<(String, anyhow::Result<PartitionOutcome>)> =
            stream::iter(partitions.into_iter().map(|partition| {
                let store = Arc::clone(&self.store);
                let producer = Arc::clone(&self.producer);
                let key = self.options.key_scheme.key_for(&partition);
                let skip_existing = self.options.skip_existing;
                let version = version.to_string();
                async move {
                    let name = partition.clone();
                    let outcome = tokio::task::spawn_blocking(move || {
                        ingest_partition(
                            store.as_ref(),
                            producer.as_ref(),
                            &version,
                            &partition,
                            &key,
                            skip_existing,
                        )
                    })
                    .await
                    .unwrap_or_else(|e| Err(anyhow::anyhow!("producer task panicked: {}", e)));
                    (name, outcome)
                }
            }))
            .buffer_unordered(self.options.parallelism.max(1))
            .collect()
            .await;

        let mut report = IngestReport {
            version: version.to_string(),
            ..Default::default()
        };
        for (partition, outcome) in outcomes {
            match outcome {
                Ok(PartitionOutcome::Stored(records)) => {
                    report.stored += 1;
                    report.records += records;
                }
                Ok(PartitionOutcome::Skipped) => report.skipped += 1,
                Err(err) => {
                    let error = format!("{:#}", err);
                    warn!(partition = %partition, error = %error, "Partition failed");
                    report.failures.push(IngestFailure { partition, error });
                }
            }
        }
        report.failures.sort_by(|a, b| a.partition.cmp(&b.partition));
        self.store.flush()?;

        info!(
            version = version,
            stored = report.stored,
            skipped = report.skipped,
            failed = report.failures.len(),
            records = report.records,
            "Ingest finished"
        );
        Ok(report)
    }
}

fn ingest_partition(
    store: &dyn HashStore,
    producer: &dyn HashProducer,
    version: &str,
    partition: &str,
    key: &str,
    skip_existing: bool,
) -> anyhow::Result<PartitionOutcome> {
    if skip_existing && store.contains(version, key)? {
        debug!(partition = partition, "Already present, skipping");
        return Ok(PartitionOutcome::Skipped);
    }
    let records = producer.produce(partition)?;
    store.put(version, key, &records)?;
    debug!(partition = partition, records = records.len(), "Stored partition");
    Ok(PartitionOutcome::Stored(records.len()))
}
