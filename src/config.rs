//! Configuration
//!
//! Layered with the `config` crate. Precedence, lowest to highest: built-in defaults,
//! the global file `$XDG_CONFIG_HOME/sector-reindex/config.toml`, an explicit file given
//! on the command line, then `SECTOR_REINDEX__*` environment variables (`__` separates
//! nested keys, e.g. `SECTOR_REINDEX__RESOLUTION__MAX_SECTOR_DEPTH=4`).

pub mod facade;
pub mod merge {
    pub mod policy;
    pub mod service;
}
pub mod paths {
    pub mod xdg_root;
}
pub mod settings;
pub mod sources {
    pub mod environment;
    pub mod global_file;
}

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::resolve::{ResolveOptions, DEFAULT_MAX_SECTOR_DEPTH};
use crate::spatial::KeyScheme;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application name used for XDG directories
pub const APP_NAME: &str = "sector-reindex";

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "SECTOR_REINDEX";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReindexConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub resolution: ResolutionConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ReindexConfig {
    /// Resolver options derived from the store and resolution sections.
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            max_sector_depth: self.resolution.max_sector_depth,
            key_scheme: self.store.key_scheme(),
        }
    }
}

fn default_key_prefix() -> String {
    KeyScheme::default().prefix
}

fn default_key_suffix() -> String {
    KeyScheme::default().suffix
}

/// Hash store location and key scheme
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store directory; None means `$XDG_DATA_HOME/sector-reindex/store`
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Prefix stripped from partition paths to form store keys
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Suffix stripped from partition paths to form store keys
    #[serde(default = "default_key_suffix")]
    pub key_suffix: String,
}

impl StoreConfig {
    /// Resolve the store directory to an actual filesystem location.
    pub fn resolve_path(&self) -> Result<PathBuf, ApiError> {
        match &self.path {
            Some(path) if !path.as_os_str().is_empty() => Ok(path.clone()),
            _ => Ok(xdg::data_dir()?.join("store")),
        }
    }

    pub fn key_scheme(&self) -> KeyScheme {
        KeyScheme {
            prefix: self.key_prefix.clone(),
            suffix: self.key_suffix.clone(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            key_prefix: default_key_prefix(),
            key_suffix: default_key_suffix(),
        }
    }
}

fn default_max_sector_depth() -> u32 {
    DEFAULT_MAX_SECTOR_DEPTH
}

/// Resolver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Neighbor rings searched on each axis
    #[serde(default = "default_max_sector_depth")]
    pub max_sector_depth: u32,

    /// Version edit lists are written against when `--from` is not given
    #[serde(default)]
    pub from_version: Option<String>,

    /// Version to rebase onto when `--to` is not given
    #[serde(default)]
    pub to_version: Option<String>,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            max_sector_depth: default_max_sector_depth(),
            from_version: None,
            to_version: None,
        }
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_true() -> bool {
    true
}

/// Ingest pass settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Partitions produced concurrently
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Leave partitions already present in the version untouched
    #[serde(default = "default_true")]
    pub skip_existing: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            skip_existing: default_true(),
        }
    }
}
