//! Secondary Index Builder
//!
//! Extracts `(value, id, weight)` entries for every mapped field of every node
//! and edge, buckets them per partition and index, then writes
//! `Index/<name>/meta` and `Index/<name>/<prefix>_<p>.dat`.
//!
//! Node entries use the node id and belong to partition `id % partition_num`.
//! Edge entries use [`edge_id_hash`] of `(src, dst, type)` as their id and
//! belong to the partition of `src`.
//!
//! Neighbor indices are keyed by source node id. For edge fields the entry is
//! `(value, dst, edge weight)` under `src`. For node fields each node's value
//! is held back until [`IndexBuilder::write`], when every edge `src -> dst`
//! contributes `dst`'s `(value, dst, node weight)` under `src`.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::definition::{FieldPath, IndexDefinition, IndexKey, IndexKind};
use super::value::IndexValue;
use super::writer::{encode_hash, encode_neighbor, encode_range};
use super::{DESCRIPTOR_FILE, INDEX_DIR};
use crate::error::{Error, Result};
use crate::hash::{edge_id_hash, Hash64, Sha256Hash64};
use crate::input::{FeatureJson, GraphDocument};
use crate::output::StagedOutput;
use crate::schema::{GraphSchema, DEFAULT_SCHEMA_NAME, DEFAULT_SCHEMA_VERSION};
use crate::schema_builder::SchemaBuilder;
use crate::store::{partition_file_name, partition_of};

/// One extracted `(value, id, weight)` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub value: IndexValue,
    pub id: u64,
    pub weight: f32,
}

/// Entries of one index inside one partition.
#[derive(Debug, Default)]
struct Bucket {
    flat: Vec<IndexEntry>,
    neighbors: BTreeMap<u64, Vec<IndexEntry>>,
}

/// Counts gathered while building indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexBuildStats {
    /// Distinct indices written
    pub indices: usize,
    /// Entries written across all indices and partitions
    pub entries: u64,
    /// Data files written
    pub files: usize,
    /// Node neighbor-index edges skipped because `dst` had no value
    pub skipped_neighbor_edges: u64,
}

/// Builds every index of one definition over one graph.
pub struct IndexBuilder<'a> {
    definition: &'a IndexDefinition,
    schema: &'a GraphSchema,
    hasher: Box<dyn Hash64 + 'a>,
    partition_num: u32,
    /// `partitions[p][index name]`
    partitions: Vec<BTreeMap<String, Bucket>>,
    /// Node neighbor-index values held for the edge post-pass: `name -> id -> entry`
    pending_neighbors: BTreeMap<String, HashMap<u64, IndexEntry>>,
    /// Every `(src, dst)` edge seen, in input order
    edges: Vec<(u64, u64)>,
}

impl<'a> IndexBuilder<'a> {
    /// Builder using [`Sha256Hash64`] for edge ids.
    pub fn new(
        definition: &'a IndexDefinition,
        schema: &'a GraphSchema,
        partition_num: u32,
    ) -> Result<Self> {
        Self::with_hasher(definition, schema, partition_num, Box::new(Sha256Hash64))
    }

    pub fn with_hasher(
        definition: &'a IndexDefinition,
        schema: &'a GraphSchema,
        partition_num: u32,
        hasher: Box<dyn Hash64 + 'a>,
    ) -> Result<Self> {
        if partition_num == 0 {
            return Err(Error::InvalidArgument(
                "partition_num must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            definition,
            schema,
            hasher,
            partition_num,
            partitions: (0..partition_num).map(|_| BTreeMap::new()).collect(),
            pending_neighbors: BTreeMap::new(),
            edges: Vec::new(),
        })
    }

    /// Extract entries from every node and edge of a document.
    pub fn add_document(&mut self, doc: &GraphDocument) -> Result<()> {
        let definition = self.definition;

        for node in &doc.nodes {
            let p = partition_of(node.id, self.partition_num);
            for (path, key) in definition.node_fields() {
                let Some(raw) = extract(path, |f| node.field(f), &node.features)? else {
                    continue;
                };
                let entry = IndexEntry {
                    value: key.value_type.parse_json(&raw)?,
                    id: node.id,
                    weight: node.weight,
                };
                if key.kind == IndexKind::Neighbor {
                    self.pending_neighbors
                        .entry(key.name.clone())
                        .or_default()
                        .insert(node.id, entry);
                } else {
                    self.bucket(p, key).flat.push(entry);
                }
            }
        }

        for edge in &doc.edges {
            self.edges.push((edge.src, edge.dst));
            if definition.edge_fields().is_empty() {
                continue;
            }
            let edge_type = self.schema.edge_type_index(&edge.type_name.key())?;
            let edge_id = edge_id_hash(self.hasher.as_ref(), edge.src, edge.dst, edge_type);
            let p = partition_of(edge.src, self.partition_num);
            for (path, key) in definition.edge_fields() {
                let Some(raw) = extract(path, |f| edge.field(f), &edge.features)? else {
                    continue;
                };
                let value = key.value_type.parse_json(&raw)?;
                let bucket = self.bucket(p, key);
                if key.kind == IndexKind::Neighbor {
                    bucket.neighbors.entry(edge.src).or_default().push(IndexEntry {
                        value,
                        id: edge.dst,
                        weight: edge.weight,
                    });
                } else {
                    bucket.flat.push(IndexEntry {
                        value,
                        id: edge_id,
                        weight: edge.weight,
                    });
                }
            }
        }
        Ok(())
    }

    fn bucket(&mut self, partition: u32, key: &IndexKey) -> &mut Bucket {
        self.partitions[partition as usize]
            .entry(key.name.clone())
            .or_default()
    }

    /// Turn held node values into per-source neighbor lists.
    fn resolve_neighbors(&mut self) -> u64 {
        let mut skipped = 0;
        let pending = std::mem::take(&mut self.pending_neighbors);
        for (name, values) in &pending {
            for &(src, dst) in &self.edges {
                let Some(entry) = values.get(&dst) else {
                    debug!(
                        "Index '{}': node {} has no value, skipping edge {} -> {}",
                        name, dst, src, dst
                    );
                    skipped += 1;
                    continue;
                };
                let p = partition_of(src, self.partition_num) as usize;
                self.partitions[p]
                    .entry(name.clone())
                    .or_default()
                    .neighbors
                    .entry(src)
                    .or_default()
                    .push(entry.clone());
            }
        }
        skipped
    }

    /// Write descriptors and every partition file under `output_dir`.
    ///
    /// Each index gets one file per partition; partitions without entries hold
    /// the kind's empty encoding.
    pub fn write(mut self, output_dir: &Path, prefix: &str) -> Result<IndexBuildStats> {
        let mut stats = IndexBuildStats {
            skipped_neighbor_edges: self.resolve_neighbors(),
            ..IndexBuildStats::default()
        };
        let index_root = output_dir.join(INDEX_DIR);

        for key in self.definition.keys() {
            let dir = index_root.join(&key.name);
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
            let meta = dir.join(DESCRIPTOR_FILE);
            fs::write(&meta, key.descriptor()).map_err(|e| Error::io(&meta, e))?;

            let empty = Bucket::default();
            for p in 0..self.partition_num {
                let bucket = self.partitions[p as usize].get(&key.name).unwrap_or(&empty);
                let mut buf = Vec::new();
                match key.kind {
                    IndexKind::Hash => encode_hash(&bucket.flat, key.id_type, &mut buf)?,
                    IndexKind::Range => encode_range(&bucket.flat, key.id_type, &mut buf)?,
                    IndexKind::Neighbor => {
                        encode_neighbor(&bucket.neighbors, key.id_type, &mut buf)?
                    }
                }
                let entries = bucket.flat.len()
                    + bucket.neighbors.values().map(Vec::len).sum::<usize>();
                let path = dir.join(partition_file_name(prefix, p));
                fs::write(&path, buf).map_err(|e| Error::io(&path, e))?;
                debug!("Index '{}' partition {}: {} entries", key.name, p, entries);
                stats.entries += entries as u64;
                stats.files += 1;
            }
            stats.indices += 1;
        }

        info!(
            "Wrote {} indices ({} entries, {} files) under {:?}",
            stats.indices, stats.entries, stats.files, index_root
        );
        Ok(stats)
    }
}

/// Raw JSON value addressed by `path`, if the field or feature is present.
///
/// An element index past the end of a present feature is an error.
fn extract(
    path: &FieldPath,
    field: impl Fn(&str) -> Option<Value>,
    features: &[FeatureJson],
) -> Result<Option<Value>> {
    let feature = |name: &str| features.iter().find(|f| f.name == name);
    match path {
        FieldPath::Field(name) => Ok(field(name)),
        FieldPath::Feature(name) => Ok(feature(name).map(|f| f.value.clone())),
        FieldPath::FeatureElement(name, i) => {
            let Some(feature) = feature(name) else {
                return Ok(None);
            };
            let items = feature.value.as_array().ok_or_else(|| {
                Error::InvalidArgument(format!("{path}: feature '{name}' is not an array"))
            })?;
            items.get(*i).cloned().map(Some).ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "{path}: index {i} out of range for feature '{name}' with {} elements",
                    items.len()
                ))
            })
        }
    }
}

/// Load the definition and graph, build every index and commit it into
/// `output_dir`. Without a schema, one is derived from the graph itself.
pub fn build(
    definition_path: &Path,
    graph_json: &Path,
    output_dir: &Path,
    partition_num: u32,
    prefix: &str,
    schema: Option<&GraphSchema>,
) -> Result<IndexBuildStats> {
    let definition = IndexDefinition::from_path(definition_path)?;
    info!("Building indices from {:?} over {:?}", definition_path, graph_json);
    let doc = GraphDocument::from_path(graph_json)?;

    let derived;
    let schema = match schema {
        Some(schema) => schema,
        None => {
            let mut builder =
                SchemaBuilder::new(DEFAULT_SCHEMA_NAME, DEFAULT_SCHEMA_VERSION, partition_num);
            builder.add_document(&doc)?;
            derived = builder.finish();
            &derived
        }
    };

    let mut builder = IndexBuilder::new(&definition, schema, partition_num)?;
    builder.add_document(&doc)?;

    let stage = StagedOutput::new(output_dir)?;
    let stats = builder.write(stage.path(), prefix)?;
    stage.commit()?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ByteReader;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const GRAPH: &str = r#"{
        "nodes": [
            {"id": 10, "type": "A", "weight": 5.0,
             "features": [{"name": "city", "type": "binary", "value": "x"}]},
            {"id": 11, "type": "A", "weight": 1.0,
             "features": [{"name": "city", "type": "binary", "value": "y"}]},
            {"id": 12, "type": "A", "weight": 3.0}
        ],
        "edges": [
            {"src": 10, "dst": 11, "type": "r", "weight": 2.0,
             "features": [{"name": "ts", "type": "dense", "value": [7.0, 8.0]}]},
            {"src": 10, "dst": 12, "type": "r", "weight": 1.0,
             "features": [{"name": "ts", "type": "dense", "value": [6.0, 9.0]}]},
            {"src": 11, "dst": 10, "type": "r", "weight": 4.0}
        ]
    }"#;

    fn run(definition: &str, partitions: u32) -> (TempDir, IndexBuildStats) {
        let doc = GraphDocument::from_json_str(GRAPH).unwrap();
        let mut sb = SchemaBuilder::new("graph", "2.0", partitions);
        sb.add_document(&doc).unwrap();
        let schema = sb.finish();
        let definition = IndexDefinition::from_json_str(definition).unwrap();

        let temp = TempDir::new().unwrap();
        let mut builder = IndexBuilder::new(&definition, &schema, partitions).unwrap();
        builder.add_document(&doc).unwrap();
        let stats = builder.write(temp.path(), "index").unwrap();
        (temp, stats)
    }

    #[test]
    fn test_node_range_index() {
        let (temp, stats) = run(r#"{"node": {"weight": "w:float:uint64_t:range_index"}}"#, 1);
        assert_eq!(stats.indices, 1);
        assert_eq!(stats.entries, 3);

        let bytes = fs::read(temp.path().join("Index/w/index_0.dat")).unwrap();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_list::<u64>().unwrap(), vec![11, 12, 10]);
        assert_eq!(reader.read_list::<f32>().unwrap(), vec![1.0, 3.0, 5.0]);
        assert_eq!(reader.read_list::<f32>().unwrap(), vec![1.0, 4.0, 9.0]);

        let meta = fs::read(temp.path().join("Index/w/meta")).unwrap();
        assert_eq!(meta.len(), 12);
        assert_eq!(&meta[..4], &1i32.to_le_bytes());
    }

    #[test]
    fn test_node_entries_follow_partitions() {
        let (temp, _) = run(r#"{"node": {"weight": "w:float:uint64_t:range_index"}}"#, 2);
        let p0 = fs::read(temp.path().join("Index/w/index_0.dat")).unwrap();
        let p1 = fs::read(temp.path().join("Index/w/index_1.dat")).unwrap();
        assert_eq!(ByteReader::new(&p0).read_list::<u64>().unwrap(), vec![12, 10]);
        assert_eq!(ByteReader::new(&p1).read_list::<u64>().unwrap(), vec![11]);
    }

    #[test]
    fn test_node_neighbor_index_post_pass() {
        let (temp, stats) = run(
            r#"{"node": {"features": {"city": "c:string:uint64_t:neighbor_index"}}}"#,
            1,
        );
        // node 12 has no city, so edge 10 -> 12 is skipped
        assert_eq!(stats.skipped_neighbor_edges, 1);

        let bytes = fs::read(temp.path().join("Index/c/index_0.dat")).unwrap();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read::<u64>().unwrap(), 10);
        assert_eq!(reader.read_list::<u64>().unwrap(), vec![11]);
        assert_eq!(reader.read_list::<String>().unwrap(), vec!["y".to_string()]);
        assert_eq!(reader.read_list::<f32>().unwrap(), vec![1.0]);
        assert_eq!(reader.read::<u64>().unwrap(), 11);
        assert_eq!(reader.read_list::<u64>().unwrap(), vec![10]);
        assert_eq!(reader.read_list::<String>().unwrap(), vec!["x".to_string()]);
        assert_eq!(reader.read_list::<f32>().unwrap(), vec![5.0]);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_edge_neighbor_index_groups_by_src() {
        let (temp, _) = run(
            r#"{"edge": {"features": {"ts": {"1": "t:float:uint64_t:neighbor_index"}}}}"#,
            1,
        );
        let bytes = fs::read(temp.path().join("Index/t/index_0.dat")).unwrap();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read::<u64>().unwrap(), 10);
        assert_eq!(reader.read_list::<u64>().unwrap(), vec![11, 12]);
        assert_eq!(reader.read_list::<f32>().unwrap(), vec![8.0, 9.0]);
        assert_eq!(reader.read_list::<f32>().unwrap(), vec![2.0, 3.0]);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_edge_hash_index_uses_edge_ids() {
        let (temp, _) = run(r#"{"edge": {"weight": "ew:float:uint64_t:hash_index"}}"#, 1);
        let bytes = fs::read(temp.path().join("Index/ew/index_0.dat")).unwrap();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read::<f32>().unwrap(), 1.0);
        let ids = reader.read_list::<u64>().unwrap();
        assert_eq!(ids, vec![edge_id_hash(&Sha256Hash64, 10, 12, 0)]);
    }

    #[test]
    fn test_empty_partition_files_written() {
        let (temp, stats) = run(r#"{"node": {"weight": "w:float:uint64_t:hash_index"}}"#, 4);
        assert_eq!(stats.files, 4);
        // ids 10, 11, 12 land in partitions 2, 3, 0
        let bytes = fs::read(temp.path().join("Index/w/index_1.dat")).unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_injected_hasher() {
        let doc = GraphDocument::from_json_str(GRAPH).unwrap();
        let mut sb = SchemaBuilder::new("graph", "2.0", 1);
        sb.add_document(&doc).unwrap();
        let schema = sb.finish();
        let definition =
            IndexDefinition::from_json_str(r#"{"edge": {"weight": "ew:float:uint64_t:range_index"}}"#)
                .unwrap();
        let temp = TempDir::new().unwrap();
        let hasher = |bytes: &[u8]| bytes[0] as u64;
        let mut builder =
            IndexBuilder::with_hasher(&definition, &schema, 1, Box::new(hasher)).unwrap();
        builder.add_document(&doc).unwrap();
        builder.write(temp.path(), "index").unwrap();

        let bytes = fs::read(temp.path().join("Index/ew/index_0.dat")).unwrap();
        // sorted by weight: 1.0 (10->12), 2.0 (10->11), 4.0 (11->10)
        assert_eq!(ByteReader::new(&bytes).read_list::<u64>().unwrap(), vec![10, 10, 11]);
    }

    #[test]
    fn test_value_type_mismatch_is_fatal() {
        let doc = GraphDocument::from_json_str(GRAPH).unwrap();
        let mut sb = SchemaBuilder::new("graph", "2.0", 1);
        sb.add_document(&doc).unwrap();
        let schema = sb.finish();
        let definition =
            IndexDefinition::from_json_str(r#"{"node": {"weight": "w:bool:uint64_t:hash_index"}}"#)
                .unwrap();
        let mut builder = IndexBuilder::new(&definition, &schema, 1).unwrap();
        assert!(matches!(
            builder.add_document(&doc),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn test_feature_element_out_of_range_is_rejected() {
        let doc = GraphDocument::from_json_str(GRAPH).unwrap();
        let mut sb = SchemaBuilder::new("graph", "2.0", 1);
        sb.add_document(&doc).unwrap();
        let schema = sb.finish();
        let definition = IndexDefinition::from_json_str(
            r#"{"edge": {"features": {"ts": {"2": "late:float:uint64_t:range_index"}}}}"#,
        )
        .unwrap();
        let mut builder = IndexBuilder::new(&definition, &schema, 1).unwrap();

        let err = builder.add_document(&doc).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(err.to_string().contains("features.ts[2]"));
    }

    #[test]
    fn test_feature_element_of_absent_feature_is_skipped() {
        // the third edge has no `ts` feature
        let (temp, stats) = run(
            r#"{"edge": {"features": {"ts": {"1": "late:float:uint64_t:range_index"}}}}"#,
            1,
        );
        assert_eq!(stats.entries, 2);
        assert!(temp.path().join("Index/late/index_0.dat").is_file());
    }
}
