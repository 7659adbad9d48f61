//! Graph Schema
//!
//! The registry of node/edge type names and per-feature slot assignment,
//! plus its binary (de)serialization (`euler.meta`).
//!
//! Slots are assigned once, in first-seen order, separately per
//! (entity class x feature kind). A feature's slot index is the position it
//! occupies inside its kind's flattened block when a record is encoded, so it
//! never changes after assignment.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::codec::{ByteReader, Decode, Encode};
use crate::error::{Error, Result};

/// Default schema name written by the schema builder.
pub const DEFAULT_SCHEMA_NAME: &str = "graph";

/// Default schema version written by the schema builder.
pub const DEFAULT_SCHEMA_VERSION: &str = "2.0";

/// Default file name of the serialized schema inside an output directory.
pub const SCHEMA_FILE_NAME: &str = "euler.meta";

/// Wire tag of a feature kind the reader does not recognise.
pub const FEATURE_KIND_UNKNOWN_TAG: i32 = 3;

// ============================================================================
// Feature Kinds
// ============================================================================

/// Kind of a feature value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    /// List of `u64` indices
    Sparse,
    /// Fixed-length `f32` vector
    Dense,
    /// Opaque byte string
    Binary,
}

impl FeatureKind {
    /// All kinds in wire-tag order.
    pub const ALL: [FeatureKind; 3] = [FeatureKind::Sparse, FeatureKind::Dense, FeatureKind::Binary];

    /// Get the string representation used in JSON and feature keys
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Sparse => "sparse",
            FeatureKind::Dense => "dense",
            FeatureKind::Binary => "binary",
        }
    }

    /// Wire tag (`sparse=0, dense=1, binary=2`).
    pub fn tag(self) -> i32 {
        match self {
            FeatureKind::Sparse => 0,
            FeatureKind::Dense => 1,
            FeatureKind::Binary => 2,
        }
    }

    /// Inverse of [`FeatureKind::tag`]; `None` for `unknown` and anything else.
    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(FeatureKind::Sparse),
            1 => Some(FeatureKind::Dense),
            2 => Some(FeatureKind::Binary),
            _ => None,
        }
    }

    /// Schema key of a feature of this kind: `"<kind>_<name>"`.
    pub fn key(self, name: &str) -> String {
        format!("{}_{}", self.as_str(), name)
    }
}

impl FromStr for FeatureKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sparse" => Ok(FeatureKind::Sparse),
            "dense" => Ok(FeatureKind::Dense),
            "binary" => Ok(FeatureKind::Binary),
            other => Err(Error::UnsupportedFeatureKind(other.to_string())),
        }
    }
}

impl Encode for FeatureKind {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.tag().encode(buf);
    }
}

impl Decode for FeatureKind {
    fn decode(input: &[u8]) -> Result<(Self, &[u8])> {
        let (tag, rest) = i32::decode(input)?;
        match FeatureKind::from_tag(tag) {
            Some(kind) => Ok((kind, rest)),
            None if tag == FEATURE_KIND_UNKNOWN_TAG => {
                Err(Error::UnsupportedFeatureKind("unknown".to_string()))
            }
            None => Err(Error::UnsupportedFeatureKind(format!("tag {tag}"))),
        }
    }
}

/// Which side of the graph a registry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityClass {
    Node,
    Edge,
}

impl EntityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityClass::Node => "node",
            EntityClass::Edge => "edge",
        }
    }
}

// ============================================================================
// Feature Registry
// ============================================================================

/// Number of slots per feature kind; used to pre-size record feature arrays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SlotCounts {
    pub sparse: usize,
    pub dense: usize,
    pub binary: usize,
}

impl SlotCounts {
    pub fn get(&self, kind: FeatureKind) -> usize {
        match kind {
            FeatureKind::Sparse => self.sparse,
            FeatureKind::Dense => self.dense,
            FeatureKind::Binary => self.binary,
        }
    }

    fn bump(&mut self, kind: FeatureKind) {
        match kind {
            FeatureKind::Sparse => self.sparse += 1,
            FeatureKind::Dense => self.dense += 1,
            FeatureKind::Binary => self.binary += 1,
        }
    }
}

/// One registered feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSlot {
    /// Feature key, `"<kind>_<name>"`
    pub key: String,
    /// Feature kind
    pub kind: FeatureKind,
    /// Position inside the kind's flattened block
    pub slot: i32,
    /// Dense: vector length. Sparse: largest index seen. Binary: 0.
    /// 0 until first observed.
    dim: i64,
}

impl FeatureSlot {
    pub fn dim(&self) -> i64 {
        self.dim
    }
}

/// Append-once feature registry for one entity class.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureRegistry {
    slots: Vec<FeatureSlot>,
    #[serde(skip)]
    by_key: HashMap<String, usize>,
    counts: SlotCounts,
}

impl FeatureRegistry {
    /// Register `name` of `kind`, returning its slot (existing or new).
    pub fn register(&mut self, name: &str, kind: FeatureKind) -> i32 {
        let key = kind.key(name);
        if let Some(&pos) = self.by_key.get(&key) {
            return self.slots[pos].slot;
        }
        let slot = self.counts.get(kind) as i32;
        self.insert(FeatureSlot {
            key,
            kind,
            slot,
            dim: 0,
        });
        slot
    }

    fn insert(&mut self, feature: FeatureSlot) {
        self.counts.bump(feature.kind);
        self.by_key.insert(feature.key.clone(), self.slots.len());
        self.slots.push(feature);
    }

    /// Fold an observation into a feature's dimension.
    ///
    /// Dense: the first non-zero observation wins. Sparse: running maximum.
    /// Binary: ignored.
    pub fn update_dim(&mut self, key: &str, observed: i64) -> Result<()> {
        let pos = *self
            .by_key
            .get(key)
            .ok_or_else(|| Error::unknown_type("feature", key))?;
        let feature = &mut self.slots[pos];
        match feature.kind {
            FeatureKind::Dense => {
                if feature.dim == 0 {
                    feature.dim = observed;
                }
            }
            FeatureKind::Sparse => {
                feature.dim = feature.dim.max(observed);
            }
            FeatureKind::Binary => {}
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&FeatureSlot> {
        self.by_key.get(key).map(|&pos| &self.slots[pos])
    }

    /// Registered features in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &FeatureSlot> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn counts(&self) -> SlotCounts {
        self.counts
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        (self.slots.len() as u32).encode(buf);
        for feature in &self.slots {
            feature.key.encode(buf);
            feature.kind.encode(buf);
            feature.slot.encode(buf);
            feature.dim.encode(buf);
        }
    }

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self> {
        let count: u32 = reader.read()?;
        let mut registry = FeatureRegistry::default();
        for _ in 0..count {
            let key: String = reader.read()?;
            let kind: FeatureKind = reader.read()?;
            let slot: i32 = reader.read()?;
            let dim: i64 = reader.read()?;
            if registry.by_key.contains_key(&key) {
                return Err(Error::malformed(format!("duplicate feature key '{key}'")));
            }
            registry.insert(FeatureSlot {
                key,
                kind,
                slot,
                dim,
            });
        }
        registry.check_slots()?;
        Ok(registry)
    }

    /// Every kind's slots must be exactly `0..count`.
    fn check_slots(&self) -> Result<()> {
        for kind in FeatureKind::ALL {
            let mut seen = vec![false; self.counts.get(kind)];
            for feature in self.slots.iter().filter(|f| f.kind == kind) {
                let idx = usize::try_from(feature.slot).ok().filter(|&i| i < seen.len());
                match idx {
                    Some(i) if !seen[i] => seen[i] = true,
                    _ => {
                        return Err(Error::malformed(format!(
                            "feature '{}' has invalid {} slot {}",
                            feature.key,
                            kind.as_str(),
                            feature.slot
                        )))
                    }
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Type Registry
// ============================================================================

/// Type name -> type index, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeRegistry {
    entries: Vec<(String, u32)>,
    #[serde(skip)]
    by_name: HashMap<String, u32>,
}

impl TypeRegistry {
    /// Register a type name, returning its index (existing or new).
    pub fn register(&mut self, name: &str) -> u32 {
        if let Some(&index) = self.by_name.get(name) {
            return index;
        }
        let index = self.entries.len() as u32;
        self.entries.push((name.to_string(), index));
        self.by_name.insert(name.to_string(), index);
        index
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(name, index)| (name.as_str(), *index))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        (self.entries.len() as u32).encode(buf);
        for (name, index) in &self.entries {
            name.encode(buf);
            index.encode(buf);
        }
    }

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self> {
        let count: u32 = reader.read()?;
        let mut registry = TypeRegistry::default();
        for _ in 0..count {
            let name: String = reader.read()?;
            let index: u32 = reader.read()?;
            if registry.by_name.insert(name.clone(), index).is_some() {
                return Err(Error::malformed(format!("duplicate type name '{name}'")));
            }
            registry.entries.push((name, index));
        }
        Ok(registry)
    }
}

// ============================================================================
// Graph Schema
// ============================================================================

/// Process-scoped schema: built once per run, then shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSchema {
    name: String,
    version: String,
    node_count: u64,
    edge_count: u64,
    partition_num: u32,
    node_features: FeatureRegistry,
    edge_features: FeatureRegistry,
    node_types: TypeRegistry,
    edge_types: TypeRegistry,
}

impl GraphSchema {
    /// Create an empty schema.
    pub fn new(name: impl Into<String>, version: impl Into<String>, partition_num: u32) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            node_count: 0,
            edge_count: 0,
            partition_num,
            node_features: FeatureRegistry::default(),
            edge_features: FeatureRegistry::default(),
            node_types: TypeRegistry::default(),
            edge_types: TypeRegistry::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn node_count(&self) -> u64 {
        self.node_count
    }

    pub fn edge_count(&self) -> u64 {
        self.edge_count
    }

    pub fn partition_num(&self) -> u32 {
        self.partition_num
    }

    /// Add to the informational node/edge counts.
    pub fn add_counts(&mut self, nodes: u64, edges: u64) {
        self.node_count += nodes;
        self.edge_count += edges;
    }

    /// Register a node type name, returning its index.
    pub fn register_node_type(&mut self, name: &str) -> u32 {
        self.node_types.register(name)
    }

    /// Register an edge type name, returning its index.
    pub fn register_edge_type(&mut self, name: &str) -> u32 {
        self.edge_types.register(name)
    }

    /// Register a feature, returning its slot index.
    pub fn register_feature(&mut self, entity: EntityClass, name: &str, kind: FeatureKind) -> i32 {
        self.features_mut(entity).register(name, kind)
    }

    /// Fold an observed dimension (dense length / sparse max index) into a feature.
    pub fn update_feature_dim(&mut self, entity: EntityClass, key: &str, observed: i64) -> Result<()> {
        self.features_mut(entity).update_dim(key, observed)
    }

    pub fn features(&self, entity: EntityClass) -> &FeatureRegistry {
        match entity {
            EntityClass::Node => &self.node_features,
            EntityClass::Edge => &self.edge_features,
        }
    }

    fn features_mut(&mut self, entity: EntityClass) -> &mut FeatureRegistry {
        match entity {
            EntityClass::Node => &mut self.node_features,
            EntityClass::Edge => &mut self.edge_features,
        }
    }

    /// Look up a feature by key (`"<kind>_<name>"`).
    pub fn feature(&self, entity: EntityClass, key: &str) -> Option<&FeatureSlot> {
        self.features(entity).get(key)
    }

    /// Per-kind slot counts for an entity class.
    pub fn slot_counts(&self, entity: EntityClass) -> SlotCounts {
        self.features(entity).counts()
    }

    pub fn node_types(&self) -> &TypeRegistry {
        &self.node_types
    }

    pub fn edge_types(&self) -> &TypeRegistry {
        &self.edge_types
    }

    /// Resolve a node type name to its index.
    pub fn node_type_index(&self, name: &str) -> Result<i32> {
        self.node_types
            .get(name)
            .map(|i| i as i32)
            .ok_or_else(|| Error::unknown_type("node type", name))
    }

    /// Resolve an edge type name to its index.
    pub fn edge_type_index(&self, name: &str) -> Result<i32> {
        self.edge_types
            .get(name)
            .map(|i| i as i32)
            .ok_or_else(|| Error::unknown_type("edge type", name))
    }

    /// Number of registered edge types (adjacency group count).
    pub fn edge_type_count(&self) -> usize {
        self.edge_types.len()
    }

    /// Encode the schema.
    ///
    /// Layout: name, version, node_count, edge_count, partition_num, node
    /// features `(key, kind, slot, dim)*`, edge features, node types
    /// `(name, index)*`, edge types.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }

    /// Decode a schema, returning it with the unconsumed bytes.
    pub fn deserialize(bytes: &[u8]) -> Result<(Self, &[u8])> {
        Self::decode(bytes)
    }

    /// Read a schema file.
    pub fn read_from(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        let (schema, rest) = Self::deserialize(&bytes)?;
        if !rest.is_empty() {
            warn!(
                "Ignoring {} trailing bytes after schema in {:?}",
                rest.len(),
                path
            );
        }
        debug!("Loaded schema from {:?}:\n{}", path, schema);
        Ok(schema)
    }

    /// Write the schema file, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        std::fs::write(path, self.serialize()).map_err(|e| Error::io(path, e))
    }
}

impl Encode for GraphSchema {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.name.encode(buf);
        self.version.encode(buf);
        self.node_count.encode(buf);
        self.edge_count.encode(buf);
        self.partition_num.encode(buf);
        self.node_features.encode(buf);
        self.edge_features.encode(buf);
        self.node_types.encode(buf);
        self.edge_types.encode(buf);
    }
}

impl Decode for GraphSchema {
    fn decode(input: &[u8]) -> Result<(Self, &[u8])> {
        let mut reader = ByteReader::new(input);
        let schema = GraphSchema {
            name: reader.read()?,
            version: reader.read()?,
            node_count: reader.read()?,
            edge_count: reader.read()?,
            partition_num: reader.read()?,
            node_features: FeatureRegistry::decode(&mut reader)?,
            edge_features: FeatureRegistry::decode(&mut reader)?,
            node_types: TypeRegistry::decode(&mut reader)?,
            edge_types: TypeRegistry::decode(&mut reader)?,
        };
        Ok((schema, reader.remaining()))
    }
}

impl fmt::Display for GraphSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "name: {}", self.name)?;
        writeln!(f, "version: {}", self.version)?;
        writeln!(f, "node_count: {}", self.node_count)?;
        writeln!(f, "edge_count: {}", self.edge_count)?;
        writeln!(f, "partition_num: {}", self.partition_num)?;
        for (label, registry) in [("node", &self.node_features), ("edge", &self.edge_features)] {
            let counts = registry.counts();
            writeln!(
                f,
                "{label}_features: sparse={} dense={} binary={}",
                counts.sparse, counts.dense, counts.binary
            )?;
            for feature in registry.iter() {
                writeln!(
                    f,
                    "  {} ({}, slot {}, dim {})",
                    feature.key,
                    feature.kind.as_str(),
                    feature.slot,
                    feature.dim()
                )?;
            }
        }
        for (label, registry) in [("node", &self.node_types), ("edge", &self.edge_types)] {
            writeln!(f, "{label}_types: {}", registry.len())?;
            for (name, index) in registry.iter() {
                writeln!(f, "  {name} = {index}")?;
            }
        }
        Ok(())
    }
}
