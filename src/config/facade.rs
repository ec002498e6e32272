//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::ReindexConfig;
use config::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the global file and environment.
    pub fn load() -> Result<ReindexConfig, ConfigError> {
        MergeService::load(None)
    }

    /// Load configuration with an explicit file layered over the global file.
    pub fn load_with(explicit: Option<&Path>) -> Result<ReindexConfig, ConfigError> {
        MergeService::load(explicit)
    }

    /// Load configuration from a specific file only, with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<ReindexConfig, ConfigError> {
        MergeService::load_from_file(path)
    }
}
