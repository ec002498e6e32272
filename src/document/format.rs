//! Reading and writing edit-list documents as JSON or YAML.

use super::Sector;
use crate::error::ApiError;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Serialization the document was read from and is written back in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

/// A parsed edit-list document
///
/// The whole document tree is retained so that only `streaming.sectors` changes when
/// the document is written back.
#[derive(Debug, Clone)]
pub struct EditDocument {
    root: Value,
    format: DocumentFormat,
    sectors: Vec<Sector>,
}

impl EditDocument {
    /// Parse document text, trying JSON first and YAML second.
    pub fn parse(content: &str) -> Result<Self, ApiError> {
        let (root, format) = match serde_json::from_str::<Value>(content) {
            Ok(root) => (root, DocumentFormat::Json),
            Err(json_err) => {
                debug!("Not a JSON document ({}), trying YAML", json_err);
                let root = serde_yaml::from_str::<Value>(content).map_err(|yaml_err| {
                    ApiError::DocumentError(format!(
                        "Failed to parse document as JSON ({}) or YAML ({})",
                        json_err, yaml_err
                    ))
                })?;
                (root, DocumentFormat::Yaml)
            }
        };
        Self::from_root(root, format)
    }

    fn from_root(root: Value, format: DocumentFormat) -> Result<Self, ApiError> {
        let sectors = match root.pointer("/streaming/sectors") {
            Some(Value::Array(items)) => items
                .iter()
                .cloned()
                .map(Sector::from_value)
                .collect::<Result<Vec<_>, _>>()?,
            Some(Value::Null) | None => {
                return Err(ApiError::DocumentError(
                    "document has no streaming.sectors list".to_string(),
                ))
            }
            Some(other) => {
                return Err(ApiError::DocumentError(format!(
                    "streaming.sectors is not a list: {}",
                    other
                )))
            }
        };
        Ok(Self {
            root,
            format,
            sectors,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ApiError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ApiError::DocumentError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    /// Replace the sector list.
    pub fn set_sectors(&mut self, sectors: Vec<Sector>) {
        self.sectors = sectors;
    }

    /// Document text in the original format with the current sectors.
    pub fn render(&self) -> Result<String, ApiError> {
        let mut root = self.root.clone();
        let sectors = Value::Array(self.sectors.iter().map(Sector::to_value).collect());
        match root.pointer_mut("/streaming/sectors") {
            Some(slot) => *slot = sectors,
            None => {
                return Err(ApiError::DocumentError(
                    "document lost its streaming.sectors list".to_string(),
                ))
            }
        }
        match self.format {
            DocumentFormat::Json => serde_json::to_string_pretty(&root)
                .map_err(|e| ApiError::DocumentError(format!("Failed to write JSON: {}", e))),
            DocumentFormat::Yaml => serde_yaml::to_string(&root)
                .map_err(|e| ApiError::DocumentError(format!("Failed to write YAML: {}", e))),
        }
    }

    /// Write the document, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ApiError> {
        let text = self.render()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ApiError::DocumentError(format!(
                        "Failed to create output directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        std::fs::write(path, text).map_err(|e| {
            ApiError::DocumentError(format!("Failed to write {}: {}", path.display(), e))
        })
    }
}
