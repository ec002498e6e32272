//! Merge policy: the defaults layer every source is merged onto.

use crate::config::ReindexConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder seeded with the built-in defaults.
///
/// Only scalar settings are seeded; optional paths and module filters stay unset so
/// the serde defaults apply to them.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = ReindexConfig::default();
    Config::builder()
        .set_default("store.key_prefix", defaults.store.key_prefix)?
        .set_default("store.key_suffix", defaults.store.key_suffix)?
        .set_default(
            "resolution.max_sector_depth",
            u64::from(defaults.resolution.max_sector_depth),
        )?
        .set_default("ingest.parallelism", defaults.ingest.parallelism as u64)?
        .set_default("ingest.skip_existing", defaults.ingest.skip_existing)?
        .set_default("logging.level", defaults.logging.level)?
        .set_default("logging.format", defaults.logging.format)?
        .set_default("logging.output", defaults.logging.output)
}
