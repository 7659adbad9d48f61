//! Index builder tests driven through files on disk.

mod common;

use std::fs;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use common::*;
use partgraph_core::codec::ByteReader;
use partgraph_core::index;
use partgraph_core::schema_builder::build_schema;
use partgraph_core::{Error, GraphSchema};

const WEIGHTED_NODES: &str = r#"{
    "nodes": [
        {"id": 10, "type": "A", "weight": 5.0},
        {"id": 11, "type": "A", "weight": 1.0},
        {"id": 12, "type": "A", "weight": 3.0}
    ],
    "edges": []
}"#;

#[test]
fn test_range_index_scenario() {
    let temp = TempDir::new().unwrap();
    let graph = write_file(temp.path(), "graph.json", WEIGHTED_NODES);
    let meta = write_file(
        temp.path(),
        "index.json",
        r#"{"node": {"weight": "w:float:uint64_t:range_index"}}"#,
    );
    let out = temp.path().join("out");

    let stats = index::build(&meta, &graph, &out, 1, "index", None).unwrap();
    assert_eq!(stats.entries, 3);

    let (ids, values, weights) = read_float_range(&out.join("Index/w/index_0.dat"));
    assert_eq!(ids, vec![11, 12, 10]);
    assert_eq!(values, vec![1.0, 3.0, 5.0]);
    assert_eq!(weights, vec![1.0, 4.0, 9.0]);
}

#[test]
fn test_build_with_schema_file() {
    let temp = TempDir::new().unwrap();
    let graph = write_file(temp.path(), "graph.json", MIXED_GRAPH);
    let meta = write_file(
        temp.path(),
        "index.json",
        r#"{"node": {"features": {"price": {"0": "price:double:uint64_t:range_index"}},
                     "type": "t:string:uint64_t:hash_index"}}"#,
    );
    let schema_path = temp.path().join("euler.meta");
    build_schema(&[&graph], "graph", "2.0", 2)
        .unwrap()
        .write_to(&schema_path)
        .unwrap();
    let schema = GraphSchema::read_from(&schema_path).unwrap();
    let out = temp.path().join("out");

    let stats = index::build(&meta, &graph, &out, 2, "idx", Some(&schema)).unwrap();
    assert_eq!(stats.indices, 2);
    assert_eq!(stats.files, 4);

    // node 4 is the only priced node and lives in partition 0
    let bytes = fs::read(out.join("Index/price/idx_0.dat")).unwrap();
    let mut reader = ByteReader::new(&bytes);
    assert_eq!(reader.read_list::<u64>().unwrap(), vec![4]);
    assert_eq!(reader.read_list::<f64>().unwrap(), vec![9.5]);
    assert_eq!(reader.read_list::<f32>().unwrap(), vec![2.5]);
    assert!(fs::read(out.join("Index/price/idx_1.dat")).unwrap().is_empty());

    // partition 1 holds the two "user" nodes, 3 and 7
    let bytes = fs::read(out.join("Index/t/idx_1.dat")).unwrap();
    let mut reader = ByteReader::new(&bytes);
    assert_eq!(reader.read::<String>().unwrap(), "user");
    assert_eq!(reader.read_list::<u64>().unwrap(), vec![3, 7]);
    assert_eq!(reader.read_list::<f32>().unwrap(), vec![1.0, 0.5]);
    assert!(reader.is_empty());
}

#[test]
fn test_bad_definition_leaves_no_output() {
    let temp = TempDir::new().unwrap();
    let graph = write_file(temp.path(), "graph.json", WEIGHTED_NODES);
    let meta = write_file(
        temp.path(),
        "index.json",
        r#"{"node": {"weight": "w:float:uint64_t:skiplist_index"}}"#,
    );
    let out = temp.path().join("out");

    let err = index::build(&meta, &graph, &out, 1, "index", None).unwrap_err();
    assert!(matches!(err, Error::UnknownType { .. }));
    assert!(!out.join("Index").exists());
}

#[test]
fn test_missing_definition_file() {
    let temp = TempDir::new().unwrap();
    let graph = write_file(temp.path(), "graph.json", WEIGHTED_NODES);
    let err = index::build(
        &temp.path().join("nope.json"),
        &graph,
        &temp.path().join("out"),
        1,
        "index",
        None,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}
