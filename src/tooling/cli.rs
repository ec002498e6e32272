//! CLI Tooling
//!
//! Command-line interface for all sector-reindex operations: rebasing edit lists,
//! filling and inspecting the hash store, and managing settings.

use crate::config::{settings, xdg, ConfigLoader, ReindexConfig};
use crate::document::EditDocument;
use crate::error::ApiError;
use crate::ingest::{IngestOptions, IngestPipeline, JsonObjectProducer};
use crate::logging::LoggingConfig;
use crate::resolve::ResolutionEngine;
use crate::store::bundle::{export_version, import_bundle};
use crate::store::{HashStore, SledHashStore};
use crate::tooling::format;
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// sector-reindex - rebase world sector edits onto a new dataset version
#[derive(Parser)]
#[command(name = "sector-reindex")]
#[command(about = "Rebase sector removal and mutation lists across world dataset versions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config file)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Hash store directory (overrides store.path)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Fold the logging flags over the configured logging section.
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut config = base.clone();
        if self.verbose {
            config.level = "debug".to_string();
        }
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
        config
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rebase an edit-list document from one version onto another
    Update {
        /// Edit-list document (JSON or YAML)
        input: PathBuf,
        /// Where to write the rebased document (same format as the input)
        #[arg(short, long)]
        output: PathBuf,
        /// Version the document was written against (defaults to resolution.from_version)
        #[arg(long)]
        from: Option<String>,
        /// Version to rebase onto (defaults to resolution.to_version)
        #[arg(long)]
        to: Option<String>,
        /// Neighbor search depth (defaults to resolution.max_sector_depth)
        #[arg(long)]
        max_depth: Option<u32>,
        /// Report format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List registered versions
    Versions,
    /// Show entry count and size of a version
    Stats {
        version: String,
    },
    /// List partitions of a version, or the hashes of one partition
    Partitions {
        version: String,
        /// Show full hashes of this partition key
        #[arg(long)]
        hashes: Option<String>,
    },
    /// Write one version to a bundle file
    Export {
        version: String,
        file: PathBuf,
    },
    /// Load a bundle file into the store
    Import {
        file: PathBuf,
    },
    /// Hash a directory of partition exports into a version
    Ingest {
        /// Directory of `<partition path>.json` exports
        dir: PathBuf,
        version: String,
        /// Partitions produced concurrently (defaults to ingest.parallelism)
        #[arg(long)]
        parallelism: Option<usize>,
        /// Re-hash partitions the version already has
        #[arg(long)]
        force: bool,
    },
    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print effective settings, or one dotted key
    Get {
        key: Option<String>,
    },
    /// Persist one dotted key to the global config file
    Set {
        key: String,
        value: String,
    },
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Update { .. } => "update",
        Commands::Versions => "versions",
        Commands::Stats { .. } => "stats",
        Commands::Partitions { .. } => "partitions",
        Commands::Export { .. } => "export",
        Commands::Import { .. } => "import",
        Commands::Ingest { .. } => "ingest",
        Commands::Config { .. } => "config",
    }
}

/// CLI context holding configuration and the lazily opened store
pub struct CliContext {
    config: ReindexConfig,
    store_path: PathBuf,
    /// Global settings file written by `config set`
    settings_path: PathBuf,
    store: Mutex<Option<Arc<SledHashStore>>>,
}

impl CliContext {
    /// Create a new CLI context
    pub fn new(config_path: Option<PathBuf>, store_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = ConfigLoader::load_with(config_path.as_deref())?;
        let settings_path = xdg::global_config_path()?;
        Self::with_config(config, store_path, settings_path)
    }

    /// Create a context from an already loaded configuration.
    pub fn with_config(
        config: ReindexConfig,
        store_path: Option<PathBuf>,
        settings_path: PathBuf,
    ) -> Result<Self, ApiError> {
        let store_path = match store_path {
            Some(path) => path,
            None => config.store.resolve_path()?,
        };
        Ok(Self {
            config,
            store_path,
            settings_path,
            store: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ReindexConfig {
        &self.config
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// The hash store, opened on first use.
    pub fn store(&self) -> Result<Arc<SledHashStore>, ApiError> {
        let mut slot = self.store.lock();
        if let Some(store) = slot.as_ref() {
            return Ok(Arc::clone(store));
        }
        let store = Arc::new(SledHashStore::open(&self.store_path)?);
        *slot = Some(Arc::clone(&store));
        Ok(store)
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let started = Instant::now();
        let result = self.execute_inner(command);
        info!(
            command = command_name(command),
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Update {
                input,
                output,
                from,
                to,
                max_depth,
                format,
            } => self.update(input, output, from.as_deref(), to.as_deref(), *max_depth, format),
            Commands::Versions => {
                let versions = self.store()?.versions()?;
                Ok(format::format_versions(&versions))
            }
            Commands::Stats { version } => {
                let stats = self.store()?.stats(version)?;
                Ok(format::format_stats(version, &stats))
            }
            Commands::Partitions { version, hashes } => {
                let store = self.store()?;
                match hashes {
                    Some(key) => {
                        let key = self.config.store.key_scheme().key_for(key);
                        match store.get(version, &key)? {
                            Some(records) => Ok(format::format_records(&key, &records)),
                            None => Ok(format!("No partition {} in version {}.", key, version)),
                        }
                    }
                    None => {
                        let partitions = store.list_all(version)?;
                        Ok(format::format_partitions(version, &partitions))
                    }
                }
            }
            Commands::Export { version, file } => {
                let count = export_version(self.store()?.as_ref(), version, file)?;
                Ok(format!(
                    "Exported {} partitions of version {} to {}",
                    count,
                    version,
                    file.display()
                ))
            }
            Commands::Import { file } => {
                let (version, count) = import_bundle(self.store()?.as_ref(), file)?;
                Ok(format!(
                    "Imported {} partitions into version {}",
                    count, version
                ))
            }
            Commands::Ingest {
                dir,
                version,
                parallelism,
                force,
            } => {
                let store: Arc<dyn HashStore> = self.store()?;
                let options = IngestOptions {
                    parallelism: parallelism.unwrap_or(self.config.ingest.parallelism),
                    skip_existing: self.config.ingest.skip_existing && !force,
                    key_scheme: self.config.store.key_scheme(),
                };
                let pipeline =
                    IngestPipeline::new(store, Arc::new(JsonObjectProducer::new(dir)), options);
                let report = pipeline.run(version)?;
                Ok(format::format_ingest_report(&report))
            }
            Commands::Config { command } => match command {
                ConfigCommands::Get { key } => settings::get(&self.config, key.as_deref()),
                ConfigCommands::Set { key, value } => {
                    settings::set(&self.settings_path, key, value)?;
                    Ok(format!(
                        "Set {} = {} in {}",
                        key,
                        value,
                        self.settings_path.display()
                    ))
                }
            },
        }
    }

    fn update(
        &self,
        input: &Path,
        output: &Path,
        from: Option<&str>,
        to: Option<&str>,
        max_depth: Option<u32>,
        report_format: &str,
    ) -> Result<String, ApiError> {
        if report_format != "text" && report_format != "json" {
            return Err(ApiError::ConfigError(format!(
                "Invalid report format: {} (must be 'text' or 'json')",
                report_format
            )));
        }
        let from = from
            .map(str::to_string)
            .or_else(|| self.config.resolution.from_version.clone())
            .ok_or_else(|| {
                ApiError::ConfigError(
                    "No source version: pass --from or set resolution.from_version".to_string(),
                )
            })?;
        let to = to
            .map(str::to_string)
            .or_else(|| self.config.resolution.to_version.clone())
            .ok_or_else(|| {
                ApiError::ConfigError(
                    "No target version: pass --to or set resolution.to_version".to_string(),
                )
            })?;

        let mut document = EditDocument::load(input)?;
        let mut options = self.config.resolve_options();
        if let Some(depth) = max_depth {
            options.max_sector_depth = depth;
        }

        let store = self.store()?;
        let engine = ResolutionEngine::new(store.as_ref(), &from, &to, options)?;
        let resolution = engine.resolve(document.sectors())?;
        document.set_sectors(resolution.sectors);
        document.save(output)?;

        if report_format == "json" {
            serde_json::to_string_pretty(&resolution.report)
                .map_err(|e| ApiError::DocumentError(format!("Failed to render report: {}", e)))
        } else {
            Ok(format::format_resolution_summary(&resolution.report, output))
        }
    }
}
