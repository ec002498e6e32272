//! Edit-list documents
//!
//! An edit-list document holds a `streaming.sectors` list. Each sector names a partition
//! path, the node count it expects, and two lists of edits addressed by node index:
//! `nodeDeletions` and `nodeMutations`. Edit kinds are told apart by which list they
//! are in and, for instanced removals, by the presence of the actor fields.
//!
//! Fields the resolver does not touch are carried through unchanged.

pub mod format;

use crate::error::ApiError;
use serde_json::{Map, Value};

pub use format::{DocumentFormat, EditDocument};

const KEY_PATH: &str = "path";
const KEY_EXPECTED_NODES: &str = "expectedNodes";
const KEY_NODE_DELETIONS: &str = "nodeDeletions";
const KEY_NODE_MUTATIONS: &str = "nodeMutations";
const KEY_INDEX: &str = "index";
const KEY_TYPE: &str = "type";

/// Which pair of keys an instanced removal used in the source document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorFieldNaming {
    /// `expectedActors` / `actorDeletions`
    Actors,
    /// `expectedInstances` / `instanceDeletions`
    Instances,
}

impl ActorFieldNaming {
    fn keys(self) -> (&'static str, &'static str) {
        match self {
            ActorFieldNaming::Actors => ("expectedActors", "actorDeletions"),
            ActorFieldNaming::Instances => ("expectedInstances", "instanceDeletions"),
        }
    }
}

/// Edit kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditKind {
    Removal,
    InstancedRemoval {
        expected_actors: i64,
        /// Actor indices to remove, version-local like the entry index
        actor_deletions: Vec<usize>,
        naming: ActorFieldNaming,
    },
    Mutation,
}

/// One edit addressed to a node of a partition
#[derive(Debug, Clone, PartialEq)]
pub struct EditEntry {
    /// Node index; rewritten to the target version by the resolver
    pub index: usize,
    pub kind: EditKind,
    /// Every other field of the entry (`type`, mutation transforms, ...)
    pub fields: Map<String, Value>,
}

impl EditEntry {
    pub fn removal(index: usize) -> Self {
        Self {
            index,
            kind: EditKind::Removal,
            fields: Map::new(),
        }
    }

    pub fn instanced_removal(index: usize, expected_actors: i64, actor_deletions: Vec<usize>) -> Self {
        Self {
            index,
            kind: EditKind::InstancedRemoval {
                expected_actors,
                actor_deletions,
                naming: ActorFieldNaming::Actors,
            },
            fields: Map::new(),
        }
    }

    pub fn mutation(index: usize) -> Self {
        Self {
            index,
            kind: EditKind::Mutation,
            fields: Map::new(),
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self.kind, EditKind::Mutation)
    }

    /// Short kind label used in reports
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            EditKind::Removal => "removal",
            EditKind::InstancedRemoval { .. } => "instanced_removal",
            EditKind::Mutation => "mutation",
        }
    }

    /// Node type recorded in the document, if any
    pub fn node_type(&self) -> Option<&str> {
        self.fields.get(KEY_TYPE).and_then(Value::as_str)
    }

    fn from_value(value: Value, mutation: bool, sector: &str) -> Result<Self, ApiError> {
        let mut fields = match value {
            Value::Object(map) => map,
            other => {
                return Err(ApiError::DocumentError(format!(
                    "entry in {} is not a mapping: {}",
                    sector, other
                )))
            }
        };

        let index = fields
            .shift_remove(KEY_INDEX)
            .as_ref()
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                ApiError::DocumentError(format!(
                    "entry in {} has no non-negative integer index",
                    sector
                ))
            })? as usize;

        if mutation {
            return Ok(Self {
                index,
                kind: EditKind::Mutation,
                fields,
            });
        }

        let naming = [ActorFieldNaming::Actors, ActorFieldNaming::Instances]
            .into_iter()
            .find(|naming| {
                let (expected, deletions) = naming.keys();
                fields.contains_key(expected) && fields.contains_key(deletions)
            });

        let kind = match naming {
            Some(naming) => {
                let (expected_key, deletions_key) = naming.keys();
                let expected_actors = fields
                    .shift_remove(expected_key)
                    .as_ref()
                    .and_then(Value::as_i64)
                    .ok_or_else(|| {
                        ApiError::DocumentError(format!(
                            "entry {} in {} has a non-integer {}",
                            index, sector, expected_key
                        ))
                    })?;
                let actor_deletions = match fields.shift_remove(deletions_key) {
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(|v| {
                            v.as_u64().map(|i| i as usize).ok_or_else(|| {
                                ApiError::DocumentError(format!(
                                    "entry {} in {} has a non-integer {}",
                                    index, sector, deletions_key
                                ))
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                    _ => Vec::new(),
                };
                EditKind::InstancedRemoval {
                    expected_actors,
                    actor_deletions,
                    naming,
                }
            }
            None => EditKind::Removal,
        };

        Ok(Self {
            index,
            kind,
            fields,
        })
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(node_type) = self.fields.get(KEY_TYPE) {
            map.insert(KEY_TYPE.to_string(), node_type.clone());
        }
        map.insert(KEY_INDEX.to_string(), Value::from(self.index));
        for (key, value) in &self.fields {
            if key != KEY_TYPE {
                map.insert(key.clone(), value.clone());
            }
        }
        if let EditKind::InstancedRemoval {
            expected_actors,
            actor_deletions,
            naming,
        } = &self.kind
        {
            let (expected_key, deletions_key) = naming.keys();
            map.insert(
                deletions_key.to_string(),
                Value::from(actor_deletions.clone()),
            );
            map.insert(expected_key.to_string(), Value::from(*expected_actors));
        }
        Value::Object(map)
    }
}

/// Edits for one partition
#[derive(Debug, Clone, PartialEq)]
pub struct Sector {
    /// Full partition path
    pub path: String,
    /// Node count of the partition the edits were written against
    pub expected_nodes: usize,
    pub node_deletions: Vec<EditEntry>,
    pub node_mutations: Vec<EditEntry>,
    /// Other sector-level fields
    pub fields: Map<String, Value>,
}

impl Sector {
    pub fn new(path: impl Into<String>, expected_nodes: usize) -> Self {
        Self {
            path: path.into(),
            expected_nodes,
            node_deletions: Vec::new(),
            node_mutations: Vec::new(),
            fields: Map::new(),
        }
    }

    /// Append an entry to the list matching its kind.
    pub fn push(&mut self, entry: EditEntry) {
        if entry.is_mutation() {
            self.node_mutations.push(entry);
        } else {
            self.node_deletions.push(entry);
        }
    }

    /// All entries, deletions first
    pub fn entries(&self) -> impl Iterator<Item = &EditEntry> {
        self.node_deletions.iter().chain(self.node_mutations.iter())
    }

    pub fn entry_count(&self) -> usize {
        self.node_deletions.len() + self.node_mutations.len()
    }

    /// Parse a sector from its document representation.
    pub fn from_value(value: Value) -> Result<Self, ApiError> {
        let mut fields = match value {
            Value::Object(map) => map,
            other => {
                return Err(ApiError::DocumentError(format!(
                    "sector is not a mapping: {}",
                    other
                )))
            }
        };
        let path = match fields.shift_remove(KEY_PATH) {
            Some(Value::String(path)) => path,
            _ => {
                return Err(ApiError::DocumentError(
                    "sector without a string path".to_string(),
                ))
            }
        };
        let expected_nodes = fields
            .shift_remove(KEY_EXPECTED_NODES)
            .as_ref()
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;

        let mut sector = Sector::new(path, expected_nodes);
        for (key, mutation) in [(KEY_NODE_DELETIONS, false), (KEY_NODE_MUTATIONS, true)] {
            match fields.shift_remove(key) {
                Some(Value::Array(items)) => {
                    for item in items {
                        sector.push(EditEntry::from_value(item, mutation, &sector.path)?);
                    }
                }
                Some(Value::Null) | None => {}
                Some(other) => {
                    return Err(ApiError::DocumentError(format!(
                        "{} of {} is not a list: {}",
                        key, sector.path, other
                    )))
                }
            }
        }
        sector.fields = fields;
        Ok(sector)
    }

    /// Document representation of the sector.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(KEY_PATH.to_string(), Value::from(self.path.clone()));
        map.insert(KEY_EXPECTED_NODES.to_string(), Value::from(self.expected_nodes));
        map.insert(
            KEY_NODE_DELETIONS.to_string(),
            Value::Array(self.node_deletions.iter().map(EditEntry::to_value).collect()),
        );
        map.insert(
            KEY_NODE_MUTATIONS.to_string(),
            Value::Array(self.node_mutations.iter().map(EditEntry::to_value).collect()),
        );
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}
