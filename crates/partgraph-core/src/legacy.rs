//! Legacy single-file block converter.
//!
//! Converts JSON-lines "blocks" (one node with its out-edges per line) into a
//! single flat binary file, without schema or partitioning. Slot counts come
//! from a small meta document:
//!
//! ```json
//! {"edge_type_num": 2,
//!  "node_uint64_feature_num": 1, "node_float_feature_num": 1, "node_binary_feature_num": 0,
//!  "edge_uint64_feature_num": 0, "edge_float_feature_num": 1, "edge_binary_feature_num": 0}
//! ```
//!
//! Block layout (little-endian, no list length prefixes):
//!
//! ```text
//! i32 block_bytes, i32 node_info_bytes,
//! u64 id, i32 type, f32 weight, i32 edge_type_num,
//! i32 group_sizes[edge_type_num], f32 group_weights[edge_type_num],
//! u64 neighbor_ids[], f32 neighbor_weights[],
//! uint64 / float / binary features: i32 slot_num, i32 sizes[slot_num], values,
//! i32 edge_num, i32 edge_bytes[edge_num],
//! edges: u64 src, u64 dst, i32 type, f32 weight, the same three feature blocks
//! ```
//!
//! `node_info_bytes` spans `id` through the node's binary values;
//! `block_bytes` spans everything after itself.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::info;

use crate::codec::Encode;
use crate::error::{Error, Result};

/// Per-kind slot counts of one entity class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacySlots {
    pub uint64: usize,
    pub float: usize,
    pub binary: usize,
}

/// The converter's meta document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegacyMeta {
    #[serde(deserialize_with = "count")]
    pub edge_type_num: usize,
    #[serde(deserialize_with = "count")]
    pub node_uint64_feature_num: usize,
    #[serde(deserialize_with = "count")]
    pub node_float_feature_num: usize,
    #[serde(deserialize_with = "count")]
    pub node_binary_feature_num: usize,
    #[serde(deserialize_with = "count")]
    pub edge_uint64_feature_num: usize,
    #[serde(deserialize_with = "count")]
    pub edge_float_feature_num: usize,
    #[serde(deserialize_with = "count")]
    pub edge_binary_feature_num: usize,
}

/// Counts may be written as numbers or numeric strings.
fn count<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<usize, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(usize),
        Text(String),
    }
    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl LegacyMeta {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| Error::json(path, e))
    }

    pub fn node_slots(&self) -> LegacySlots {
        LegacySlots {
            uint64: self.node_uint64_feature_num,
            float: self.node_float_feature_num,
            binary: self.node_binary_feature_num,
        }
    }

    pub fn edge_slots(&self) -> LegacySlots {
        LegacySlots {
            uint64: self.edge_uint64_feature_num,
            float: self.edge_float_feature_num,
            binary: self.edge_binary_feature_num,
        }
    }
}

/// Features keyed by slot number (as a string).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyFeatures {
    #[serde(default)]
    pub uint64_feature: HashMap<String, Vec<u64>>,
    #[serde(default)]
    pub float_feature: HashMap<String, Vec<f32>>,
    #[serde(default)]
    pub binary_feature: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyEdge {
    pub src_id: u64,
    pub dst_id: u64,
    pub edge_type: i32,
    pub weight: f32,
    #[serde(flatten)]
    pub features: LegacyFeatures,
}

/// One input line.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyBlock {
    pub node_id: u64,
    pub node_type: i32,
    pub node_weight: f32,
    /// `edge type -> neighbor id -> weight`, in document order
    #[serde(default)]
    pub neighbor: HashMap<String, Map<String, Value>>,
    #[serde(flatten)]
    pub features: LegacyFeatures,
    #[serde(default)]
    pub edge: Vec<LegacyEdge>,
}

/// Encodes blocks according to one meta document.
#[derive(Debug, Clone)]
pub struct LegacyConverter {
    meta: LegacyMeta,
}

impl LegacyConverter {
    pub fn new(meta: LegacyMeta) -> Self {
        Self { meta }
    }

    /// Encode one block.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn encode_block(&self, block: &LegacyBlock) -> Result<Vec<u8>> {
        let mut node = Vec::new();
        block.node_id.encode(&mut node);
        block.node_type.encode(&mut node);
        block.node_weight.encode(&mut node);
        (self.meta.edge_type_num as i32).encode(&mut node);

        let mut sizes = Vec::with_capacity(self.meta.edge_type_num);
        let mut group_weights = Vec::with_capacity(self.meta.edge_type_num);
        let mut ids = Vec::new();
        let mut weights = Vec::new();
        for t in 0..self.meta.edge_type_num {
            let group = block.neighbor.get(&t.to_string()).ok_or_else(|| {
                Error::malformed(format!("block {} has no neighbor group {t}", block.node_id))
            })?;
            let mut total = 0f64;
            for (id, weight) in group {
                let id: u64 = id.parse().map_err(|_| {
                    Error::malformed(format!("neighbor id '{id}' is not an unsigned integer"))
                })?;
                let weight = weight.as_f64().ok_or_else(|| {
                    Error::malformed(format!("neighbor {id} has non-numeric weight {weight}"))
                })?;
                total += weight;
                ids.push(id);
                weights.push(weight as f32);
            }
            sizes.push(group.len() as i32);
            group_weights.push(total as f32);
        }
        encode_raw(&sizes, &mut node);
        encode_raw(&group_weights, &mut node);
        encode_raw(&ids, &mut node);
        encode_raw(&weights, &mut node);
        encode_features(&block.features, self.meta.node_slots(), &mut node)?;

        let mut edges = Vec::with_capacity(block.edge.len());
        for edge in &block.edge {
            let mut buf = Vec::new();
            edge.src_id.encode(&mut buf);
            edge.dst_id.encode(&mut buf);
            edge.edge_type.encode(&mut buf);
            edge.weight.encode(&mut buf);
            encode_features(&edge.features, self.meta.edge_slots(), &mut buf)?;
            edges.push(buf);
        }

        let edge_bytes: usize = edges.iter().map(Vec::len).sum();
        let block_bytes = 4 + node.len() + 4 + 4 * edges.len() + edge_bytes;

        let mut out = Vec::with_capacity(4 + block_bytes);
        (block_bytes as i32).encode(&mut out);
        (node.len() as i32).encode(&mut out);
        out.extend_from_slice(&node);
        (edges.len() as i32).encode(&mut out);
        for edge in &edges {
            (edge.len() as i32).encode(&mut out);
        }
        for edge in &edges {
            out.extend_from_slice(edge);
        }
        Ok(out)
    }

    /// Convert every non-blank line of `reader`, returning the block count.
    ///
    /// `input` and `output` name the two streams in errors: a failed read or
    /// write is [`Error::Io`], a bad line is [`Error::MalformedInput`].
    pub fn convert<R: BufRead, W: Write>(
        &self,
        reader: R,
        input: &Path,
        mut writer: W,
        output: &Path,
    ) -> Result<usize> {
        let mut blocks = 0;
        for (n, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| Error::io(input, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let block: LegacyBlock = serde_json::from_str(&line)
                .map_err(|e| Error::malformed(format!("line {}: {e}", n + 1)))?;
            let bytes = self.encode_block(&block)?;
            writer.write_all(&bytes).map_err(|e| Error::io(output, e))?;
            blocks += 1;
        }
        writer.flush().map_err(|e| Error::io(output, e))?;
        Ok(blocks)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn encode_features(features: &LegacyFeatures, slots: LegacySlots, buf: &mut Vec<u8>) -> Result<()> {
    let uint64 = collect_slots(&features.uint64_feature, slots.uint64, "uint64")?;
    (uint64.len() as i32).encode(buf);
    encode_raw(&uint64.iter().map(|v| v.len() as i32).collect::<Vec<_>>(), buf);
    for values in &uint64 {
        encode_raw(values, buf);
    }

    let float = collect_slots(&features.float_feature, slots.float, "float")?;
    (float.len() as i32).encode(buf);
    encode_raw(&float.iter().map(|v| v.len() as i32).collect::<Vec<_>>(), buf);
    for values in &float {
        encode_raw(values, buf);
    }

    let binary = collect_slots(&features.binary_feature, slots.binary, "binary")?;
    (binary.len() as i32).encode(buf);
    encode_raw(&binary.iter().map(|v| v.len() as i32).collect::<Vec<_>>(), buf);
    for value in &binary {
        buf.extend_from_slice(value.as_bytes());
    }
    Ok(())
}

/// Slots `0..count` in order; every slot must be present.
fn collect_slots<'f, T>(
    by_slot: &'f HashMap<String, T>,
    count: usize,
    kind: &str,
) -> Result<Vec<&'f T>> {
    (0..count)
        .map(|i| {
            by_slot
                .get(&i.to_string())
                .ok_or_else(|| Error::malformed(format!("missing {kind} feature slot {i}")))
        })
        .collect()
}

/// Elements back to back, without a count prefix.
fn encode_raw<T: Encode>(items: &[T], buf: &mut Vec<u8>) {
    for item in items {
        item.encode(buf);
    }
}

/// Convert `input_path` into `output_path`. The output file only appears once
/// every block has been written.
pub fn convert(meta_path: &Path, input_path: &Path, output_path: &Path) -> Result<usize> {
    let meta = LegacyMeta::from_path(meta_path)?;
    let input = File::open(input_path).map_err(|e| Error::io(input_path, e))?;

    let dir = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;

    info!("Converting {:?} into {:?}", input_path, output_path);
    let blocks = LegacyConverter::new(meta).convert(
        BufReader::new(input),
        input_path,
        BufWriter::new(staged.as_file_mut()),
        output_path,
    )?;
    staged
        .persist(output_path)
        .map_err(|e| Error::io(output_path, e.error))?;
    info!("Wrote {} blocks", blocks);
    Ok(blocks)
}
