//! Reading and persisting individual settings.
//!
//! `set` edits the global TOML file in place: the value is parsed as a TOML literal when
//! possible (numbers, booleans) and kept as a string otherwise, and the edited file must
//! still deserialize into a valid configuration before it is written.

use super::ReindexConfig;
use crate::error::ApiError;
use std::path::Path;
use toml::value::{Table, Value};
use tracing::info;

/// Dotted keys accepted by `set`
pub const SETTABLE_KEYS: &[&str] = &[
    "store.path",
    "store.key_prefix",
    "store.key_suffix",
    "resolution.max_sector_depth",
    "resolution.from_version",
    "resolution.to_version",
    "ingest.parallelism",
    "ingest.skip_existing",
    "logging.enabled",
    "logging.level",
    "logging.format",
    "logging.output",
    "logging.file",
    "logging.color",
];

/// Effective configuration rendered as TOML, or a single dotted key of it.
pub fn get(config: &ReindexConfig, key: Option<&str>) -> Result<String, ApiError> {
    let value = Value::try_from(config)
        .map_err(|e| ApiError::ConfigError(format!("Failed to render configuration: {}", e)))?;
    let key = match key {
        Some(key) => key,
        None => {
            return toml::to_string_pretty(&value).map_err(|e| {
                ApiError::ConfigError(format!("Failed to render configuration: {}", e))
            })
        }
    };

    let mut current = &value;
    for part in key.split('.') {
        current = current
            .get(part)
            .ok_or_else(|| ApiError::ConfigError(format!("Setting not set or unknown: {}", key)))?;
    }
    Ok(match current {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Set one dotted key in the TOML file at `path`, creating the file if needed.
pub fn set(path: &Path, key: &str, raw_value: &str) -> Result<(), ApiError> {
    if !SETTABLE_KEYS.contains(&key) {
        return Err(ApiError::ConfigError(format!(
            "Unknown setting: {} (expected one of: {})",
            key,
            SETTABLE_KEYS.join(", ")
        )));
    }

    let table = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ApiError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str::<Table>(&content).map_err(|e| {
            ApiError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })?
    } else {
        Table::new()
    };

    let (section, field) = key
        .split_once('.')
        .ok_or_else(|| ApiError::ConfigError(format!("Setting key must be dotted: {}", key)))?;
    if !matches!(table.get(section), None | Some(Value::Table(_))) {
        return Err(ApiError::ConfigError(format!(
            "{} in {} is not a table",
            section,
            path.display()
        )));
    }

    // A literal that does not fit the setting's type (`2.1` for a version name) is
    // retried as a plain string.
    let mut candidates = vec![parse_value(raw_value)];
    if !matches!(candidates[0], Value::String(_)) {
        candidates.push(Value::String(raw_value.to_string()));
    }
    let mut last_error = None;
    let mut accepted = None;
    for candidate in candidates {
        let mut edited = table.clone();
        if let Some(t) = edited
            .entry(section.to_string())
            .or_insert_with(|| Value::Table(Table::new()))
            .as_table_mut()
        {
            t.insert(field.to_string(), candidate);
        }
        match Value::Table(edited.clone()).try_into::<ReindexConfig>() {
            Ok(_) => {
                accepted = Some(edited);
                break;
            }
            Err(e) => last_error = Some(e.to_string()),
        }
    }
    let table = accepted.ok_or_else(|| {
        ApiError::ConfigError(format!(
            "Invalid value for {}: {}",
            key,
            last_error.unwrap_or_default()
        ))
    })?;

    let rendered = toml::to_string_pretty(&table)
        .map_err(|e| ApiError::ConfigError(format!("Failed to render configuration: {}", e)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ApiError::ConfigError(format!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }
    std::fs::write(path, rendered)
        .map_err(|e| ApiError::ConfigError(format!("Failed to write {}: {}", path.display(), e)))?;

    info!(key = key, path = %path.display(), "Setting saved");
    Ok(())
}

fn parse_value(raw: &str) -> Value {
    toml::from_str::<Table>(&format!("v = {}", raw))
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| Value::String(raw.to_string()))
}
