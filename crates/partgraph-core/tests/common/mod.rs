//! Shared helpers for the partgraph-core integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use partgraph_core::codec::ByteReader;
use partgraph_core::store::{partition_file_name, EDGE_DIR, NODE_DIR};
use partgraph_core::{read_partition, Edge, GraphSchema, Node};

/// Two nodes sharing a dense feature and one edge between them.
pub const TWO_NODE_GRAPH: &str = r#"{
    "nodes": [
        {"id": 0, "type": "A", "weight": 1.0,
         "features": [{"name": "emb", "type": "dense", "value": [0.1, 0.2]}]},
        {"id": 1, "type": "A", "weight": 1.0,
         "features": [{"name": "emb", "type": "dense", "value": [0.3, 0.4]}]}
    ],
    "edges": [{"src": 0, "dst": 1, "type": "r", "weight": 3.0}]
}"#;

/// A small graph with mixed types, features and parallel edges.
pub const MIXED_GRAPH: &str = r#"{
    "nodes": [
        {"id": 3, "type": "user", "weight": 1.0,
         "features": [{"name": "tags", "type": "sparse", "value": [2, 5]},
                      {"name": "name", "type": "binary", "value": "ann"}]},
        {"id": 4, "type": "item", "weight": 2.5,
         "features": [{"name": "price", "type": "dense", "value": [9.5]}]},
        {"id": 7, "type": "user", "weight": 0.5,
         "features": [{"name": "tags", "type": "sparse", "value": [1, 9]}]},
        {"id": 10, "type": "item", "weight": 4.0}
    ],
    "edges": [
        {"src": 3, "dst": 4, "type": "buy", "weight": 2.0},
        {"src": 3, "dst": 10, "type": "buy", "weight": 0.5},
        {"src": 3, "dst": 7, "type": "follow", "weight": 1.0},
        {"src": 7, "dst": 10, "type": "buy", "weight": 3.0,
         "features": [{"name": "ts", "type": "dense", "value": [1.0, 2.0]}]},
        {"src": 10, "dst": 3, "type": "sim", "weight": 0.25}
    ]
}"#;

/// Write `json` to `<dir>/<name>` and return the path.
pub fn write_file(dir: &Path, name: &str, json: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, json).expect("write fixture");
    path
}

pub fn node_file(out: &Path, prefix: &str, p: u32) -> PathBuf {
    out.join(NODE_DIR).join(partition_file_name(prefix, p))
}

pub fn edge_file(out: &Path, prefix: &str, p: u32) -> PathBuf {
    out.join(EDGE_DIR).join(partition_file_name(prefix, p))
}

pub fn read_nodes(out: &Path, prefix: &str, p: u32) -> Vec<Node> {
    read_partition(&node_file(out, prefix, p)).expect("decode node partition")
}

pub fn read_edges(out: &Path, prefix: &str, p: u32) -> Vec<Edge> {
    read_partition(&edge_file(out, prefix, p)).expect("decode edge partition")
}

pub fn read_schema(path: &Path) -> GraphSchema {
    GraphSchema::read_from(path).expect("decode schema")
}

/// Every file under `dir`, relative path and contents, sorted by path.
pub fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.expect("walk output");
        if entry.file_type().is_file() {
            let rel = entry.path().strip_prefix(dir).expect("relative path");
            let bytes = fs::read(entry.path()).expect("read output");
            files.push((rel.to_string_lossy().into_owned(), bytes));
        }
    }
    files
}

/// Decoded `range_index` partition: ids, f32 values and cumulative weights.
pub fn read_float_range(path: &Path) -> (Vec<u64>, Vec<f32>, Vec<f32>) {
    let bytes = fs::read(path).expect("read index file");
    let mut reader = ByteReader::new(&bytes);
    let ids = reader.read_list::<u64>().expect("ids");
    let values = reader.read_list::<f32>().expect("values");
    let weights = reader.read_list::<f32>().expect("weights");
    assert!(reader.is_empty(), "trailing bytes in {path:?}");
    (ids, values, weights)
}
