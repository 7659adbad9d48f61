//! Record Model
//!
//! In-memory [`Node`] and [`Edge`] records and their partition-file encoding.
//!
//! # Node layout
//!
//! ```text
//! u64 id, i32 type, f32 weight
//! outgoing: [i32] group type ids, [f32] group weights, [i32] group end offsets,
//!           [u64] neighbor ids, [f32] cumulative weights
//! incoming: same five lists
//! sparse:   [i32] slot end offsets, [u64] values
//! dense:    [i32] slot end offsets, [f32] values
//! binary:   [i32] slot end byte offsets, bytes (one length-prefixed string)
//! ```
//!
//! `[T]` is a `u32`-count-prefixed list. An edge is `u64 src, u64 dst, i32 type,
//! f32 weight` followed by the same three feature blocks.

use serde::Serialize;

use crate::codec::{encode_bytes, encode_list, ByteReader, Decode, Encode};
use crate::error::{Error, Result};
use crate::input::{EdgeJson, FeatureJson, NodeJson};
use crate::schema::{EntityClass, FeatureKind, GraphSchema, SlotCounts};

// ============================================================================
// Features
// ============================================================================

/// A single parsed feature value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum FeatureValue {
    Sparse(Vec<u64>),
    Dense(Vec<f32>),
    Binary(Vec<u8>),
}

impl FeatureValue {
    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureValue::Sparse(_) => FeatureKind::Sparse,
            FeatureValue::Dense(_) => FeatureKind::Dense,
            FeatureValue::Binary(_) => FeatureKind::Binary,
        }
    }

    /// Parse a JSON feature entry according to its declared kind.
    pub fn from_json(feature: &FeatureJson) -> Result<Self> {
        Ok(match feature.kind()? {
            FeatureKind::Sparse => FeatureValue::Sparse(feature.sparse_values()?),
            FeatureKind::Dense => FeatureValue::Dense(feature.dense_values()?),
            FeatureKind::Binary => FeatureValue::Binary(feature.binary_value()?),
        })
    }
}

/// Per-kind feature arrays, pre-sized to the schema's slot counts.
///
/// Unset slots stay empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureSlots {
    pub sparse: Vec<Vec<u64>>,
    pub dense: Vec<Vec<f32>>,
    pub binary: Vec<Vec<u8>>,
}

impl FeatureSlots {
    pub fn with_counts(counts: SlotCounts) -> Self {
        Self {
            sparse: vec![Vec::new(); counts.sparse],
            dense: vec![Vec::new(); counts.dense],
            binary: vec![Vec::new(); counts.binary],
        }
    }

    /// Store `value` at `slot` of its kind's array.
    pub fn set(&mut self, slot: i32, value: FeatureValue) -> Result<()> {
        let kind = value.kind();
        let len = match kind {
            FeatureKind::Sparse => self.sparse.len(),
            FeatureKind::Dense => self.dense.len(),
            FeatureKind::Binary => self.binary.len(),
        };
        let idx = usize::try_from(slot)
            .ok()
            .filter(|&i| i < len)
            .ok_or_else(|| {
                Error::malformed(format!(
                    "{} slot {slot} out of range (have {len})",
                    kind.as_str()
                ))
            })?;
        match value {
            FeatureValue::Sparse(v) => self.sparse[idx] = v,
            FeatureValue::Dense(v) => self.dense[idx] = v,
            FeatureValue::Binary(v) => self.binary[idx] = v,
        }
        Ok(())
    }

    /// Resolve every feature's slot through the schema and store its value.
    pub fn from_json(
        entity: EntityClass,
        features: &[FeatureJson],
        schema: &GraphSchema,
    ) -> Result<Self> {
        let mut slots = Self::with_counts(schema.slot_counts(entity));
        for feature in features {
            let value = FeatureValue::from_json(feature)?;
            let key = value.kind().key(&feature.name);
            let slot = schema
                .feature(entity, &key)
                .ok_or_else(|| Error::unknown_type("feature", key.clone()))?
                .slot;
            slots.set(slot, value)?;
        }
        Ok(slots)
    }

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self> {
        let offsets = reader.read_list::<i32>()?;
        let sparse = split_at_offsets(&offsets, &reader.read_list::<u64>()?, "sparse")?;
        let offsets = reader.read_list::<i32>()?;
        let dense = split_at_offsets(&offsets, &reader.read_list::<f32>()?, "dense")?;
        let offsets = reader.read_list::<i32>()?;
        let binary = split_at_offsets(&offsets, reader.read_bytes()?, "binary")?;
        Ok(Self {
            sparse,
            dense,
            binary,
        })
    }
}

impl Encode for FeatureSlots {
    fn encode(&self, buf: &mut Vec<u8>) {
        encode_list(&end_offsets(&self.sparse), buf);
        encode_list(&self.sparse.concat(), buf);
        encode_list(&end_offsets(&self.dense), buf);
        encode_list(&self.dense.concat(), buf);
        encode_list(&end_offsets(&self.binary), buf);
        encode_bytes(&self.binary.concat(), buf);
    }
}

/// Cumulative end offset of each slot in the flattened values.
#[allow(clippy::cast_possible_truncation)]
fn end_offsets<T>(slots: &[Vec<T>]) -> Vec<i32> {
    slots
        .iter()
        .scan(0usize, |end, slot| {
            *end += slot.len();
            Some(*end as i32)
        })
        .collect()
}

/// Inverse of [`end_offsets`]: cut `values` at each end offset.
fn split_at_offsets<T: Clone>(offsets: &[i32], values: &[T], what: &str) -> Result<Vec<Vec<T>>> {
    let mut out = Vec::with_capacity(offsets.len());
    let mut start = 0usize;
    for &end in offsets {
        let end = usize::try_from(end)
            .ok()
            .filter(|&e| e >= start && e <= values.len())
            .ok_or_else(|| {
                Error::malformed(format!(
                    "{what} offset {end} out of order or past {} values",
                    values.len()
                ))
            })?;
        out.push(values[start..end].to_vec());
        start = end;
    }
    if start != values.len() {
        return Err(Error::malformed(format!(
            "{what} offsets cover {start} of {} values",
            values.len()
        )));
    }
    Ok(out)
}

// ============================================================================
// Adjacency
// ============================================================================

/// One weighted neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub id: u64,
    pub weight: f32,
}

/// Neighbors in one direction, grouped by edge type index.
///
/// Only running weight sums reach the disk, so a decoded adjacency keeps the
/// sums it was read from and re-encodes them verbatim. Its per-neighbor
/// weights are differences of those sums. Equality compares the encoded form:
/// groups, ids and the written sums.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Adjacency {
    groups: Vec<Vec<Neighbor>>,
    #[serde(skip)]
    stored: Option<StoredSums>,
}

/// Weight sums exactly as read from a partition file.
#[derive(Debug, Clone)]
struct StoredSums {
    type_weights: Vec<f32>,
    cumulative: Vec<f32>,
}

impl Adjacency {
    /// Empty adjacency with one group per edge type.
    pub fn new(edge_type_count: usize) -> Self {
        Self {
            groups: vec![Vec::new(); edge_type_count],
            stored: None,
        }
    }

    /// Append a neighbor to its edge type's group.
    pub fn push(&mut self, edge_type: i32, id: u64, weight: f32) -> Result<()> {
        let group = usize::try_from(edge_type)
            .ok()
            .and_then(|t| self.groups.get_mut(t))
            .ok_or_else(|| {
                Error::malformed(format!("edge type index {edge_type} out of range"))
            })?;
        group.push(Neighbor { id, weight });
        self.stored = None;
        Ok(())
    }

    /// Neighbor groups, indexed by edge type.
    pub fn groups(&self) -> &[Vec<Neighbor>] {
        &self.groups
    }

    /// Neighbors of one edge type.
    pub fn group(&self, edge_type: usize) -> &[Neighbor] {
        self.groups.get(edge_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total neighbor count over all types.
    pub fn len(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(Vec::is_empty)
    }

    /// Summed neighbor weight per edge type.
    pub fn type_weights(&self) -> Vec<f32> {
        if let Some(stored) = &self.stored {
            return stored.type_weights.clone();
        }
        self.groups
            .iter()
            .map(|g| g.iter().map(|n| f64::from(n.weight)).sum::<f64>() as f32)
            .collect()
    }

    /// Running weight sum over all neighbors in group order.
    pub fn cumulative_weights(&self) -> Vec<f32> {
        if let Some(stored) = &self.stored {
            return stored.cumulative.clone();
        }
        let mut total = 0f64;
        self.groups
            .iter()
            .flatten()
            .map(|n| {
                total += f64::from(n.weight);
                total as f32
            })
            .collect()
    }

    /// Decode one direction block. A block with no neighbors decodes to zero
    /// groups.
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self> {
        let type_ids = reader.read_list::<i32>()?;
        let type_weights = reader.read_list::<f32>()?;
        let offsets = reader.read_list::<i32>()?;
        let ids = reader.read_list::<u64>()?;
        let cumulative = reader.read_list::<f32>()?;

        if type_ids.len() != offsets.len()
            || type_ids.len() != type_weights.len()
            || ids.len() != cumulative.len()
        {
            return Err(Error::malformed(format!(
                "adjacency lists disagree: {} groups / {} offsets / {} group weights, {} ids / {} weights",
                type_ids.len(),
                offsets.len(),
                type_weights.len(),
                ids.len(),
                cumulative.len()
            )));
        }

        let mut previous = 0f32;
        let neighbors: Vec<Neighbor> = ids
            .iter()
            .zip(&cumulative)
            .map(|(&id, &cum)| {
                let weight = cum - previous;
                previous = cum;
                Neighbor { id, weight }
            })
            .collect();
        let groups = split_at_offsets(&offsets, &neighbors, "adjacency")?;
        let stored = (!ids.is_empty()).then_some(StoredSums {
            type_weights,
            cumulative,
        });
        Ok(Self { groups, stored })
    }
}

impl PartialEq for Adjacency {
    fn eq(&self, other: &Self) -> bool {
        if self.is_empty() || other.is_empty() {
            return self.is_empty() && other.is_empty();
        }
        let same_ids = self.groups.len() == other.groups.len()
            && self.groups.iter().zip(&other.groups).all(|(a, b)| {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.id == y.id)
            });
        same_ids
            && self.type_weights() == other.type_weights()
            && self.cumulative_weights() == other.cumulative_weights()
    }
}

impl Encode for Adjacency {
    #[allow(clippy::cast_possible_truncation)]
    fn encode(&self, buf: &mut Vec<u8>) {
        if self.is_empty() {
            for _ in 0..5 {
                0u32.encode(buf);
            }
            return;
        }
        let type_ids: Vec<i32> = (0..self.groups.len() as i32).collect();
        let ids: Vec<u64> = self.groups.iter().flatten().map(|n| n.id).collect();
        encode_list(&type_ids, buf);
        encode_list(&self.type_weights(), buf);
        encode_list(&end_offsets(&self.groups), buf);
        encode_list(&ids, buf);
        encode_list(&self.cumulative_weights(), buf);
    }
}

// ============================================================================
// Node
// ============================================================================

/// One graph node with its features and adjacency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: u64,
    #[serde(rename = "type")]
    pub type_index: i32,
    pub weight: f32,
    pub outgoing: Adjacency,
    pub incoming: Adjacency,
    pub features: FeatureSlots,
}

impl Node {
    /// Build a node from its JSON form; adjacency starts empty.
    pub fn from_json(json: &NodeJson, schema: &GraphSchema) -> Result<Self> {
        let edge_types = schema.edge_type_count();
        Ok(Self {
            id: json.id,
            type_index: schema.node_type_index(&json.type_name.key())?,
            weight: json.weight,
            outgoing: Adjacency::new(edge_types),
            incoming: Adjacency::new(edge_types),
            features: FeatureSlots::from_json(EntityClass::Node, &json.features, schema)?,
        })
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }
}

impl Encode for Node {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.id.encode(buf);
        self.type_index.encode(buf);
        self.weight.encode(buf);
        self.outgoing.encode(buf);
        self.incoming.encode(buf);
        self.features.encode(buf);
    }
}

impl Decode for Node {
    fn decode(input: &[u8]) -> Result<(Self, &[u8])> {
        let mut reader = ByteReader::new(input);
        let node = Node {
            id: reader.read()?,
            type_index: reader.read()?,
            weight: reader.read()?,
            outgoing: Adjacency::decode(&mut reader)?,
            incoming: Adjacency::decode(&mut reader)?,
            features: FeatureSlots::decode(&mut reader)?,
        };
        Ok((node, reader.remaining()))
    }
}

// ============================================================================
// Edge
// ============================================================================

/// One directed edge with its features.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub src: u64,
    pub dst: u64,
    #[serde(rename = "type")]
    pub type_index: i32,
    pub weight: f32,
    pub features: FeatureSlots,
}

impl Edge {
    pub fn from_json(json: &EdgeJson, schema: &GraphSchema) -> Result<Self> {
        Ok(Self {
            src: json.src,
            dst: json.dst,
            type_index: schema.edge_type_index(&json.type_name.key())?,
            weight: json.weight,
            features: FeatureSlots::from_json(EntityClass::Edge, &json.features, schema)?,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }
}

impl Encode for Edge {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.src.encode(buf);
        self.dst.encode(buf);
        self.type_index.encode(buf);
        self.weight.encode(buf);
        self.features.encode(buf);
    }
}

impl Decode for Edge {
    fn decode(input: &[u8]) -> Result<(Self, &[u8])> {
        let mut reader = ByteReader::new(input);
        let edge = Edge {
            src: reader.read()?,
            dst: reader.read()?,
            type_index: reader.read()?,
            weight: reader.read()?,
            features: FeatureSlots::decode(&mut reader)?,
        };
        Ok((edge, reader.remaining()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::GraphDocument;
    use crate::schema_builder::SchemaBuilder;
    use pretty_assertions::assert_eq;

    const DOC: &str = r#"{
        "nodes": [
            {"id": 7, "type": "user", "weight": 2.0, "features": [
                {"name": "emb", "type": "dense", "value": [0.5, 1.5]},
                {"name": "tags", "type": "sparse", "value": [3, 4, 8]},
                {"name": "raw", "type": "binary", "value": "ab"},
                {"name": "age", "type": "dense", "value": [30]}
            ]},
            {"id": 8, "type": "item", "weight": 1.0, "features": [
                {"name": "age", "type": "dense", "value": [1]}
            ]}
        ],
        "edges": [
            {"src": 7, "dst": 8, "type": "buy", "weight": 0.5,
             "features": [{"name": "price", "type": "dense", "value": [9.5]}]},
            {"src": 7, "dst": 8, "type": "click", "weight": 1.0}
        ]
    }"#;

    fn fixture() -> (GraphDocument, GraphSchema) {
        let doc = GraphDocument::from_json_str(DOC).unwrap();
        let mut builder = SchemaBuilder::new("graph", "2.0", 2);
        builder.add_document(&doc).unwrap();
        (doc, builder.finish())
    }

    #[test]
    fn test_node_features_land_in_slots() {
        let (doc, schema) = fixture();
        let node = Node::from_json(&doc.nodes[0], &schema).unwrap();
        assert_eq!(node.features.dense, vec![vec![0.5, 1.5], vec![30.0]]);
        assert_eq!(node.features.sparse, vec![vec![3, 4, 8]]);
        assert_eq!(node.features.binary, vec![b"ab".to_vec()]);

        // Unset slots stay empty but are still present
        let other = Node::from_json(&doc.nodes[1], &schema).unwrap();
        assert_eq!(other.features.dense, vec![vec![], vec![1.0]]);
        assert_eq!(other.features.sparse, vec![Vec::<u64>::new()]);
        assert_eq!(other.type_index, 1);
    }

    #[test]
    fn test_feature_block_layout() {
        let slots = FeatureSlots {
            sparse: vec![vec![1, 2], vec![], vec![3]],
            dense: vec![],
            binary: vec![b"xy".to_vec(), b"z".to_vec()],
        };
        let mut buf = Vec::new();
        slots.encode(&mut buf);

        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_list::<i32>().unwrap(), vec![2, 2, 3]);
        assert_eq!(reader.read_list::<u64>().unwrap(), vec![1, 2, 3]);
        assert!(reader.read_list::<i32>().unwrap().is_empty());
        assert!(reader.read_list::<f32>().unwrap().is_empty());
        assert_eq!(reader.read_list::<i32>().unwrap(), vec![2, 3]);
        assert_eq!(reader.read_bytes().unwrap(), b"xyz");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_adjacency_layout() {
        let mut adj = Adjacency::new(3);
        adj.push(0, 10, 1.0).unwrap();
        adj.push(2, 11, 2.0).unwrap();
        adj.push(2, 12, 0.5).unwrap();
        let mut buf = Vec::new();
        adj.encode(&mut buf);

        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_list::<i32>().unwrap(), vec![0, 1, 2]);
        assert_eq!(reader.read_list::<f32>().unwrap(), vec![1.0, 0.0, 2.5]);
        assert_eq!(reader.read_list::<i32>().unwrap(), vec![1, 1, 3]);
        assert_eq!(reader.read_list::<u64>().unwrap(), vec![10, 11, 12]);
        assert_eq!(reader.read_list::<f32>().unwrap(), vec![1.0, 3.0, 3.5]);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_empty_adjacency_writes_empty_lists() {
        let mut buf = Vec::new();
        Adjacency::new(4).encode(&mut buf);
        assert_eq!(buf, vec![0u8; 20]);
    }

    #[test]
    fn test_adjacency_rejects_unknown_type() {
        let mut adj = Adjacency::new(1);
        assert!(adj.push(1, 5, 1.0).is_err());
        assert!(adj.push(-1, 5, 1.0).is_err());
    }

    #[test]
    fn test_node_roundtrip() {
        let (doc, schema) = fixture();
        let mut node = Node::from_json(&doc.nodes[0], &schema).unwrap();
        for edge in &doc.edges {
            let t = schema.edge_type_index(&edge.type_name.key()).unwrap();
            node.outgoing.push(t, edge.dst, edge.weight).unwrap();
            node.incoming.push(t, edge.dst, edge.weight).unwrap();
        }

        let bytes = node.to_bytes();
        let (decoded, rest) = Node::decode(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_node_roundtrip_inexact_weights() {
        let (doc, schema) = fixture();
        let mut node = Node::from_json(&doc.nodes[0], &schema).unwrap();
        for (id, weight) in [(20, 0.1), (21, 0.2), (22, 0.3), (23, 0.7)] {
            node.outgoing.push(0, id, weight).unwrap();
        }

        let bytes = node.to_bytes();
        let (decoded, rest) = Node::decode(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded, node);
        assert_eq!(decoded.to_bytes(), bytes);

        let ids: Vec<u64> = decoded.outgoing.group(0).iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![20, 21, 22, 23]);
        assert_eq!(decoded.outgoing.cumulative_weights(), node.outgoing.cumulative_weights());
    }

    #[test]
    fn test_push_after_decode_recomputes_sums() {
        let mut adj = Adjacency::new(1);
        adj.push(0, 1, 0.25).unwrap();
        let mut buf = Vec::new();
        adj.encode(&mut buf);
        let mut decoded = Adjacency::decode(&mut ByteReader::new(&buf)).unwrap();

        decoded.push(0, 2, 0.5).unwrap();
        assert_eq!(decoded.cumulative_weights(), vec![0.25, 0.75]);
        assert_eq!(decoded.type_weights(), vec![0.75]);
    }

    #[test]
    fn test_node_without_neighbors_decodes_to_no_groups() {
        let (doc, schema) = fixture();
        let node = Node::from_json(&doc.nodes[1], &schema).unwrap();
        let (decoded, _) = Node::decode(&node.to_bytes()).unwrap();
        assert!(decoded.outgoing.groups().is_empty());
        assert_eq!(decoded.features, node.features);
    }

    #[test]
    fn test_edge_roundtrip() {
        let (doc, schema) = fixture();
        let edge = Edge::from_json(&doc.edges[0], &schema).unwrap();
        assert_eq!(edge.features.dense, vec![vec![9.5]]);

        let bytes = edge.to_bytes();
        assert_eq!(&bytes[..8], &7u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &8u64.to_le_bytes());
        let (decoded, rest) = Edge::decode(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded, edge);
    }

    #[test]
    fn test_truncated_record_is_malformed() {
        let (doc, schema) = fixture();
        let bytes = Edge::from_json(&doc.edges[0], &schema).unwrap().to_bytes();
        assert!(matches!(
            Edge::decode(&bytes[..bytes.len() - 2]),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn test_unknown_type_and_feature() {
        let (_, schema) = fixture();
        let doc = GraphDocument::from_json_str(
            r#"{"nodes": [
                {"id": 1, "type": "ghost", "weight": 1.0},
                {"id": 2, "type": "user", "weight": 1.0,
                 "features": [{"name": "nope", "type": "dense", "value": [1]}]}
            ]}"#,
        )
        .unwrap();
        assert!(matches!(
            Node::from_json(&doc.nodes[0], &schema),
            Err(Error::UnknownType { what: "node type", .. })
        ));
        assert!(matches!(
            Node::from_json(&doc.nodes[1], &schema),
            Err(Error::UnknownType { what: "feature", .. })
        ));
    }
}
