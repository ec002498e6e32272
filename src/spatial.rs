//! Spatial addressing
//!
//! Partition identifiers are file paths whose stem ends in `_<X>_<Y>_<Z>_<LOD>`, e.g.
//! `base\worlds\03_night_city\_compiled\default\exterior_-6_4_0_1.streamingsector`.
//! This module converts between identifiers and grid coordinates, derives store keys,
//! and enumerates neighboring grid cells nearest-first.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Grid cell of a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionCoordinate {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub lod: i32,
}

impl PartitionCoordinate {
    pub fn new(x: i32, y: i32, z: i32, lod: i32) -> Self {
        Self { x, y, z, lod }
    }
}

impl fmt::Display for PartitionCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, lod {})", self.x, self.y, self.z, self.lod)
    }
}

/// An identifier split into the pieces `encode` reassembles
struct IdentifierParts<'a> {
    /// Directory part including the trailing separator
    directory: &'a str,
    /// Stem segments before the coordinates, e.g. `exterior`
    stem_prefix: String,
    extension: Option<&'a str>,
    coordinate: PartitionCoordinate,
}

fn malformed(identifier: &str, reason: impl Into<String>) -> ApiError {
    ApiError::MalformedIdentifier {
        identifier: identifier.to_string(),
        reason: reason.into(),
    }
}

fn split_identifier(identifier: &str) -> Result<IdentifierParts<'_>, ApiError> {
    let file_start = identifier
        .rfind(|c| c == '\\' || c == '/')
        .map(|i| i + 1)
        .unwrap_or(0);
    let (directory, file_name) = identifier.split_at(file_start);
    let (stem, extension) = match file_name.find('.') {
        Some(dot) => (&file_name[..dot], Some(&file_name[dot + 1..])),
        None => (file_name, None),
    };

    let segments: Vec<&str> = stem.split('_').collect();
    if segments.len() < 4 {
        return Err(malformed(
            identifier,
            format!("expected 4 coordinate segments, found {}", segments.len()),
        ));
    }
    let split_at = segments.len() - 4;
    let mut values = [0i32; 4];
    for (slot, segment) in values.iter_mut().zip(&segments[split_at..]) {
        *slot = segment
            .parse()
            .map_err(|_| malformed(identifier, format!("non-numeric segment {:?}", segment)))?;
    }

    Ok(IdentifierParts {
        directory,
        stem_prefix: segments[..split_at].join("_"),
        extension,
        coordinate: PartitionCoordinate::new(values[0], values[1], values[2], values[3]),
    })
}

/// Parse the grid coordinate out of a partition identifier.
pub fn decode(identifier: &str) -> Result<PartitionCoordinate, ApiError> {
    Ok(split_identifier(identifier)?.coordinate)
}

/// Build the identifier of `coordinate` in the same directory, stem prefix and
/// extension as `template`.
pub fn encode(template: &str, coordinate: PartitionCoordinate) -> Result<String, ApiError> {
    let parts = split_identifier(template)?;
    let mut out = String::with_capacity(template.len() + 8);
    out.push_str(parts.directory);
    if !parts.stem_prefix.is_empty() {
        out.push_str(&parts.stem_prefix);
        out.push('_');
    }
    out.push_str(&format!(
        "{}_{}_{}_{}",
        coordinate.x, coordinate.y, coordinate.z, coordinate.lod
    ));
    if let Some(ext) = parts.extension {
        out.push('.');
        out.push_str(ext);
    }
    Ok(out)
}

/// Nearest-first walk around a center value: `center, center+1, center-1, ...`
///
/// Yields `2 * radius + 1` distinct values.
pub struct NeighborRing {
    center: i32,
    radius: i32,
    step: i32,
    upward: bool,
    started: bool,
    seen: HashSet<i32>,
}

impl Iterator for NeighborRing {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        if !self.started {
            self.started = true;
            self.seen.insert(self.center);
            return Some(self.center);
        }
        loop {
            if self.upward {
                if self.step >= self.radius {
                    return None;
                }
                self.step += 1;
            }
            let candidate = if self.upward {
                self.center.saturating_add(self.step)
            } else {
                self.center.saturating_sub(self.step)
            };
            self.upward = !self.upward;
            if self.seen.insert(candidate) {
                return Some(candidate);
            }
        }
    }
}

/// Enumerate `center` and its neighbors out to `radius`, nearest first.
pub fn neighbor_ring(center: i32, radius: u32) -> NeighborRing {
    NeighborRing {
        center,
        radius: i32::try_from(radius).unwrap_or(i32::MAX),
        step: 0,
        upward: true,
        started: false,
        seen: HashSet::new(),
    }
}

/// Every coordinate within `radius` of `center` on X, Y and Z, in nested ring order
/// with X outermost. LOD stays fixed.
pub fn neighborhood(center: PartitionCoordinate, radius: u32) -> Vec<PartitionCoordinate> {
    let mut out = Vec::new();
    for x in neighbor_ring(center.x, radius) {
        for y in neighbor_ring(center.y, radius) {
            for z in neighbor_ring(center.z, radius) {
                out.push(PartitionCoordinate::new(x, y, z, center.lod));
            }
        }
    }
    out
}

/// Derives store keys from full partition paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyScheme {
    /// Leading path stripped from identifiers, with `\` separators
    pub prefix: String,
    /// Trailing extension stripped from identifiers
    pub suffix: String,
}

impl Default for KeyScheme {
    fn default() -> Self {
        Self {
            prefix: "base\\worlds\\".to_string(),
            suffix: ".streamingsector".to_string(),
        }
    }
}

impl KeyScheme {
    /// Abbreviated store key for a partition path.
    ///
    /// Separators are normalized to `\`, then the configured prefix and suffix are
    /// removed when present.
    pub fn key_for(&self, identifier: &str) -> String {
        let normalized = identifier.replace('/', "\\");
        let prefix = self.prefix.replace('/', "\\");
        let mut key = normalized.as_str();
        if !prefix.is_empty() {
            key = key.strip_prefix(prefix.as_str()).unwrap_or(key);
        }
        if !self.suffix.is_empty() {
            key = key.strip_suffix(self.suffix.as_str()).unwrap_or(key);
        }
        key.to_string()
    }
}
