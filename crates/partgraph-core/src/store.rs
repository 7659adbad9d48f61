//! Partitioned Store Builder
//!
//! Builds every [`Node`] and [`Edge`] of a graph in memory, then writes them to
//! `Node/<prefix>_<p>.dat` and `Edge/<prefix>_<p>.dat`. A node goes to
//! partition `id % partition_num`, an edge to `src % partition_num`. Records
//! keep input order inside each partition file.
//!
//! ## Usage
//!
//! ```ignore
//! use partgraph_core::{GraphSchema, StoreConfig};
//! use std::path::Path;
//!
//! let schema = GraphSchema::read_from(Path::new("out/euler.meta"))?;
//! let stats = partgraph_core::store::build(
//!     Path::new("graph.json"),
//!     &schema,
//!     Path::new("out"),
//!     &StoreConfig::new(4),
//! )?;
//! println!("{} nodes written", stats.total_nodes());
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::{decode_bytes, encode_bytes, Decode, Encode};
use crate::error::{Error, Result};
use crate::input::{EdgeJson, GraphDocument, NodeJson};
use crate::output::StagedOutput;
use crate::record::{Edge, Node};
use crate::schema::GraphSchema;

/// Directory holding node partitions.
pub const NODE_DIR: &str = "Node";

/// Directory holding edge partitions.
pub const EDGE_DIR: &str = "Edge";

/// Default partition file prefix for node/edge data.
pub const DEFAULT_DATA_PREFIX: &str = "data";

/// Partition that owns `id`.
#[allow(clippy::cast_possible_truncation)]
pub fn partition_of(id: u64, partition_num: u32) -> u32 {
    (id % u64::from(partition_num)) as u32
}

/// `<prefix>_<p>.dat`
pub fn partition_file_name(prefix: &str, partition: u32) -> String {
    format!("{prefix}_{partition}.dat")
}

// ============================================================================
// Configuration and Statistics
// ============================================================================

/// Configuration for the store builder.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Number of output partitions
    pub partition_num: u32,
    /// File name prefix for partition files
    pub prefix: String,
    /// Encode and write partitions concurrently (one writer per file)
    pub parallel: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            partition_num: 1,
            prefix: DEFAULT_DATA_PREFIX.to_string(),
            parallel: false,
        }
    }
}

impl StoreConfig {
    pub fn new(partition_num: u32) -> Self {
        Self {
            partition_num,
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Counts and weight totals gathered while building the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    /// Nodes per partition
    pub nodes_per_partition: Vec<u64>,
    /// Edges per partition
    pub edges_per_partition: Vec<u64>,
    /// Summed node weight per node type index
    pub node_type_weight: Vec<f64>,
    /// Summed edge weight per edge type index
    pub edge_type_weight: Vec<f64>,
    /// Node records that replaced an earlier record with the same id
    pub duplicate_nodes: u64,
}

impl StoreStats {
    fn new(partition_num: u32, schema: &GraphSchema) -> Self {
        Self {
            nodes_per_partition: vec![0; partition_num as usize],
            edges_per_partition: vec![0; partition_num as usize],
            node_type_weight: vec![0.0; schema.node_types().len()],
            edge_type_weight: vec![0.0; schema.edge_type_count()],
            duplicate_nodes: 0,
        }
    }

    pub fn total_nodes(&self) -> u64 {
        self.nodes_per_partition.iter().sum()
    }

    pub fn total_edges(&self) -> u64 {
        self.edges_per_partition.iter().sum()
    }
}

// ============================================================================
// Store Builder
// ============================================================================

/// Accumulates node and edge records for one store.
///
/// All records stay resident until [`PartitionedStoreBuilder::write`], so
/// memory use grows with the graph.
pub struct PartitionedStoreBuilder<'a> {
    schema: &'a GraphSchema,
    config: StoreConfig,
    nodes: Vec<Node>,
    positions: HashMap<u64, usize>,
    edges: Vec<Edge>,
    stats: StoreStats,
}

impl<'a> PartitionedStoreBuilder<'a> {
    pub fn new(schema: &'a GraphSchema, config: StoreConfig) -> Result<Self> {
        if config.partition_num == 0 {
            return Err(Error::InvalidArgument(
                "partition_num must be at least 1".to_string(),
            ));
        }
        if config.partition_num != schema.partition_num() {
            warn!(
                "Writing {} partitions but schema records partition_num = {}",
                config.partition_num,
                schema.partition_num()
            );
        }
        Ok(Self {
            stats: StoreStats::new(config.partition_num, schema),
            schema,
            config,
            nodes: Vec::new(),
            positions: HashMap::new(),
            edges: Vec::new(),
        })
    }

    /// Add every node, then every edge, of a document.
    pub fn add_document(&mut self, doc: &GraphDocument) -> Result<()> {
        for node in &doc.nodes {
            self.add_node(node)?;
        }
        for edge in &doc.edges {
            self.add_edge(edge)?;
        }
        Ok(())
    }

    /// Add one node. A repeated id replaces the earlier record in place and
    /// keeps the adjacency gathered so far.
    pub fn add_node(&mut self, json: &NodeJson) -> Result<()> {
        let mut node = Node::from_json(json, self.schema)?;
        self.stats.node_type_weight[node.type_index as usize] += f64::from(node.weight);

        match self.positions.get(&node.id) {
            Some(&pos) => {
                warn!("Duplicate node id {}; later record replaces the earlier one", node.id);
                let previous = &mut self.nodes[pos];
                node.outgoing = std::mem::take(&mut previous.outgoing);
                node.incoming = std::mem::take(&mut previous.incoming);
                *previous = node;
                self.stats.duplicate_nodes += 1;
            }
            None => {
                let p = partition_of(node.id, self.config.partition_num);
                self.stats.nodes_per_partition[p as usize] += 1;
                self.positions.insert(node.id, self.nodes.len());
                self.nodes.push(node);
            }
        }
        Ok(())
    }

    /// Add one edge and record it in both endpoints' adjacency.
    pub fn add_edge(&mut self, json: &EdgeJson) -> Result<()> {
        let edge = Edge::from_json(json, self.schema)?;
        let src_pos = self.position(&edge, edge.src)?;
        let dst_pos = self.position(&edge, edge.dst)?;

        self.nodes[src_pos]
            .outgoing
            .push(edge.type_index, edge.dst, edge.weight)?;
        self.nodes[dst_pos]
            .incoming
            .push(edge.type_index, edge.src, edge.weight)?;

        self.stats.edge_type_weight[edge.type_index as usize] += f64::from(edge.weight);
        let p = partition_of(edge.src, self.config.partition_num);
        self.stats.edges_per_partition[p as usize] += 1;
        self.edges.push(edge);
        Ok(())
    }

    fn position(&self, edge: &Edge, id: u64) -> Result<usize> {
        self.positions
            .get(&id)
            .copied()
            .ok_or(Error::DanglingReference {
                src: edge.src,
                dst: edge.dst,
                missing: id,
            })
    }

    /// Nodes added so far (duplicates counted once).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Write every partition file under `output_dir`, consuming the builder.
    pub fn write(self, output_dir: &Path) -> Result<StoreStats> {
        let node_dir = output_dir.join(NODE_DIR);
        let edge_dir = output_dir.join(EDGE_DIR);
        fs::create_dir_all(&node_dir).map_err(|e| Error::io(&node_dir, e))?;
        fs::create_dir_all(&edge_dir).map_err(|e| Error::io(&edge_dir, e))?;

        let n = self.config.partition_num;
        let mut node_buckets: Vec<Vec<&Node>> = vec![Vec::new(); n as usize];
        for node in &self.nodes {
            node_buckets[partition_of(node.id, n) as usize].push(node);
        }
        let mut edge_buckets: Vec<Vec<&Edge>> = vec![Vec::new(); n as usize];
        for edge in &self.edges {
            edge_buckets[partition_of(edge.src, n) as usize].push(edge);
        }

        let prefix = self.config.prefix.as_str();
        let write_one = |p: u32| -> Result<()> {
            let name = partition_file_name(prefix, p);
            let nodes = &node_buckets[p as usize];
            let edges = &edge_buckets[p as usize];
            write_records(&node_dir.join(&name), nodes)?;
            write_records(&edge_dir.join(&name), edges)?;
            debug!("Partition {}: {} nodes, {} edges", p, nodes.len(), edges.len());
            Ok(())
        };

        if self.config.parallel {
            (0..n).into_par_iter().try_for_each(write_one)?;
        } else {
            (0..n).try_for_each(write_one)?;
        }

        info!(
            "Wrote {} nodes and {} edges into {} partitions under {:?}",
            self.nodes.len(),
            self.edges.len(),
            n,
            output_dir
        );
        for (t, weight) in self.stats.edge_type_weight.iter().enumerate() {
            debug!("Edge type {} total weight {}", t, weight);
        }
        Ok(self.stats)
    }
}

/// Write length-prefixed records to one partition file.
fn write_records<T: Encode>(path: &Path, records: &[&T]) -> Result<()> {
    let mut buf = Vec::new();
    let mut record = Vec::new();
    for item in records {
        record.clear();
        item.encode(&mut record);
        encode_bytes(&record, &mut buf);
    }
    fs::write(path, buf).map_err(|e| Error::io(path, e))
}

/// Read every record of a partition file.
pub fn read_partition<T: Decode>(path: &Path) -> Result<Vec<T>> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let mut rest = bytes.as_slice();
    let mut records = Vec::new();
    while !rest.is_empty() {
        let (record, next) = decode_bytes(rest)?;
        let (value, trailing) = T::decode(record)?;
        if !trailing.is_empty() {
            return Err(Error::malformed(format!(
                "record {} in {:?} has {} trailing bytes",
                records.len(),
                path,
                trailing.len()
            )));
        }
        records.push(value);
        rest = next;
    }
    Ok(records)
}

/// Paths of every partition file of one directory, in partition order.
pub fn partition_paths(dir: &Path, prefix: &str, partition_num: u32) -> Vec<PathBuf> {
    (0..partition_num)
        .map(|p| dir.join(partition_file_name(prefix, p)))
        .collect()
}

/// Load `json_path`, build the store and commit it into `output_dir`.
pub fn build(
    json_path: &Path,
    schema: &GraphSchema,
    output_dir: &Path,
    config: &StoreConfig,
) -> Result<StoreStats> {
    info!("Converting {:?}", json_path);
    let doc = GraphDocument::from_path(json_path)?;
    let mut builder = PartitionedStoreBuilder::new(schema, config.clone())?;
    builder.add_document(&doc)?;

    let stage = StagedOutput::new(output_dir)?;
    let stats = builder.write(stage.path())?;
    stage.commit()?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_builder::SchemaBuilder;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn setup(json: &str, partitions: u32) -> (GraphDocument, GraphSchema) {
        let doc = GraphDocument::from_json_str(json).unwrap();
        let mut builder = SchemaBuilder::new("graph", "2.0", partitions);
        builder.add_document(&doc).unwrap();
        (doc, builder.finish())
    }

    const TRIANGLE: &str = r#"{
        "nodes": [
            {"id": 0, "type": "A", "weight": 1.0},
            {"id": 1, "type": "A", "weight": 2.0},
            {"id": 2, "type": "B", "weight": 3.0}
        ],
        "edges": [
            {"src": 0, "dst": 1, "type": "r", "weight": 1.0},
            {"src": 1, "dst": 2, "type": "s", "weight": 2.0},
            {"src": 2, "dst": 0, "type": "r", "weight": 4.0},
            {"src": 0, "dst": 2, "type": "r", "weight": 0.5}
        ]
    }"#;

    #[test]
    fn test_partition_of() {
        assert_eq!(partition_of(7, 3), 1);
        assert_eq!(partition_of(u64::MAX, 2), 1);
        assert_eq!(partition_of(5, 1), 0);
    }

    #[test]
    fn test_zero_partitions_rejected() {
        let (_, schema) = setup(TRIANGLE, 1);
        assert!(matches!(
            PartitionedStoreBuilder::new(&schema, StoreConfig::new(0)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_adjacency_accumulates() {
        let (doc, schema) = setup(TRIANGLE, 2);
        let mut builder = PartitionedStoreBuilder::new(&schema, StoreConfig::new(2)).unwrap();
        builder.add_document(&doc).unwrap();

        let node0 = &builder.nodes[0];
        let ids: Vec<u64> = node0.outgoing.group(0).iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(node0.incoming.group(0)[0].id, 2);

        let stats = builder.stats();
        assert_eq!(stats.edge_type_weight, vec![5.5, 2.0]);
        assert_eq!(stats.node_type_weight, vec![3.0, 3.0]);
        assert_eq!(stats.nodes_per_partition, vec![2, 1]);
        assert_eq!(stats.edges_per_partition, vec![3, 1]);
    }

    #[test]
    fn test_dangling_edge_is_fatal() {
        let (_, schema) = setup(TRIANGLE, 1);
        let doc = GraphDocument::from_json_str(
            r#"{"nodes": [{"id": 0, "type": "A", "weight": 1.0}],
                "edges": [{"src": 0, "dst": 9, "type": "r", "weight": 1.0}]}"#,
        )
        .unwrap();
        let mut builder = PartitionedStoreBuilder::new(&schema, StoreConfig::new(1)).unwrap();
        let err = builder.add_document(&doc).unwrap_err();
        assert!(matches!(
            err,
            Error::DanglingReference {
                src: 0,
                dst: 9,
                missing: 9
            }
        ));
    }

    #[test]
    fn test_duplicate_node_keeps_position() {
        let json = r#"{"nodes": [
            {"id": 4, "type": "A", "weight": 1.0},
            {"id": 5, "type": "A", "weight": 1.0},
            {"id": 4, "type": "A", "weight": 9.0}
        ]}"#;
        let (doc, schema) = setup(json, 1);
        let mut builder = PartitionedStoreBuilder::new(&schema, StoreConfig::new(1)).unwrap();
        builder.add_document(&doc).unwrap();
        assert_eq!(builder.node_count(), 2);
        assert_eq!(builder.nodes[0].id, 4);
        assert_eq!(builder.nodes[0].weight, 9.0);
        assert_eq!(builder.stats().duplicate_nodes, 1);
    }

    #[test]
    fn test_write_and_read_partitions() {
        let (doc, schema) = setup(TRIANGLE, 2);
        let temp = TempDir::new().unwrap();
        let mut builder = PartitionedStoreBuilder::new(&schema, StoreConfig::new(2)).unwrap();
        builder.add_document(&doc).unwrap();
        builder.write(temp.path()).unwrap();

        let nodes: Vec<Node> = read_partition(&temp.path().join("Node/data_0.dat")).unwrap();
        assert_eq!(nodes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![0, 2]);
        let nodes: Vec<Node> = read_partition(&temp.path().join("Node/data_1.dat")).unwrap();
        assert_eq!(nodes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1]);

        let edges: Vec<Edge> = read_partition(&temp.path().join("Edge/data_0.dat")).unwrap();
        let pairs: Vec<(u64, u64)> = edges.iter().map(|e| (e.src, e.dst)).collect();
        assert_eq!(pairs, vec![(0, 1), (2, 0), (0, 2)]);
    }

    #[test]
    fn test_parallel_output_matches_sequential() {
        let (doc, schema) = setup(TRIANGLE, 3);
        let seq = TempDir::new().unwrap();
        let par = TempDir::new().unwrap();
        for (dir, parallel) in [(&seq, false), (&par, true)] {
            let config = StoreConfig::new(3).with_prefix("part").with_parallel(parallel);
            let mut builder = PartitionedStoreBuilder::new(&schema, config).unwrap();
            builder.add_document(&doc).unwrap();
            builder.write(dir.path()).unwrap();
        }
        for sub in [NODE_DIR, EDGE_DIR] {
            for path in partition_paths(&seq.path().join(sub), "part", 3) {
                let name = path.file_name().unwrap();
                let other = par.path().join(sub).join(name);
                assert_eq!(fs::read(&path).unwrap(), fs::read(other).unwrap());
            }
        }
    }

    #[test]
    fn test_read_partition_rejects_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.dat");
        fs::write(&path, [9u8, 0, 0, 0, 1, 2]).unwrap();
        assert!(matches!(
            read_partition::<Edge>(&path),
            Err(Error::MalformedInput(_))
        ));
    }
}
