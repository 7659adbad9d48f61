//! Schema Builder
//!
//! Derives a [`GraphSchema`] from one or more JSON graph documents with a
//! single pass over every node then every edge of each document. Slot indices
//! follow traversal order (files in the order given, then array order inside
//! each file), so the same ordered inputs always produce the same schema.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::input::{FeatureJson, GraphDocument};
use crate::schema::{EntityClass, FeatureKind, GraphSchema, SlotCounts};

/// Accumulates a schema over a sequence of documents.
#[derive(Debug)]
pub struct SchemaBuilder {
    schema: GraphSchema,
    documents: usize,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>, version: impl Into<String>, partition_num: u32) -> Self {
        Self {
            schema: GraphSchema::new(name, version, partition_num),
            documents: 0,
        }
    }

    /// Register every type and feature of `doc`.
    pub fn add_document(&mut self, doc: &GraphDocument) -> Result<()> {
        self.schema
            .add_counts(doc.nodes.len() as u64, doc.edges.len() as u64);

        for node in &doc.nodes {
            self.schema.register_node_type(&node.type_name.key());
            for feature in &node.features {
                self.observe(EntityClass::Node, feature)?;
            }
        }
        for edge in &doc.edges {
            self.schema.register_edge_type(&edge.type_name.key());
            for feature in &edge.features {
                self.observe(EntityClass::Edge, feature)?;
            }
        }

        self.documents += 1;
        Ok(())
    }

    fn observe(&mut self, entity: EntityClass, feature: &FeatureJson) -> Result<()> {
        let kind = feature.kind()?;
        self.schema.register_feature(entity, &feature.name, kind);
        let key = kind.key(&feature.name);
        match kind {
            FeatureKind::Dense => {
                let len = feature.dense_values()?.len();
                self.schema.update_feature_dim(entity, &key, len as i64)?;
            }
            FeatureKind::Sparse => {
                if let Some(max) = feature.sparse_values()?.into_iter().max() {
                    let max = i64::try_from(max).map_err(|_| {
                        Error::malformed(format!(
                            "sparse index {max} of feature '{}' exceeds i64",
                            feature.name
                        ))
                    })?;
                    self.schema.update_feature_dim(entity, &key, max)?;
                }
            }
            FeatureKind::Binary => {
                feature.binary_value()?;
            }
        }
        Ok(())
    }

    /// Parse and add one JSON file.
    pub fn add_file(&mut self, path: &Path) -> Result<()> {
        info!("Scanning {:?}", path);
        let doc = GraphDocument::from_path(path)?;
        self.add_document(&doc)
    }

    /// Add a file, or every `*.json` file under a directory in sorted path order.
    pub fn add_path(&mut self, path: &Path) -> Result<()> {
        if path.is_dir() {
            let files = json_files_under(path)?;
            if files.is_empty() {
                warn!("No .json files under {:?}", path);
            }
            for file in files {
                self.add_file(&file)?;
            }
            Ok(())
        } else {
            self.add_file(path)
        }
    }

    /// Per-kind slot counts collected so far.
    pub fn slot_counts(&self, entity: EntityClass) -> SlotCounts {
        self.schema.slot_counts(entity)
    }

    /// Number of documents added.
    pub fn documents(&self) -> usize {
        self.documents
    }

    /// Finish building and return the schema.
    pub fn finish(self) -> GraphSchema {
        info!(
            "Schema built from {} document(s): {} node types, {} edge types, {} node features, {} edge features",
            self.documents,
            self.schema.node_types().len(),
            self.schema.edge_types().len(),
            self.schema.features(EntityClass::Node).len(),
            self.schema.features(EntityClass::Edge).len()
        );
        debug!("Schema:\n{}", self.schema);
        self.schema
    }
}

/// Build a schema from an ordered list of files or directories.
pub fn build_schema<P: AsRef<Path>>(
    inputs: &[P],
    name: &str,
    version: &str,
    partition_num: u32,
) -> Result<GraphSchema> {
    let mut builder = SchemaBuilder::new(name, version, partition_num);
    for input in inputs {
        builder.add_path(input.as_ref())?;
    }
    Ok(builder.finish())
}

fn json_files_under(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            match e.into_io_error() {
                Some(io) => Error::io(path, io),
                None => Error::malformed(format!("filesystem loop under {:?}", path)),
            }
        })?;
        let is_json = entry.path().extension().is_some_and(|ext| ext == "json");
        if entry.file_type().is_file() && is_json {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc(json: &str) -> GraphDocument {
        GraphDocument::from_json_str(json).unwrap()
    }

    #[test]
    fn test_registers_types_and_features() {
        let mut builder = SchemaBuilder::new("graph", "2.0", 2);
        builder
            .add_document(&doc(
                r#"{"nodes": [
                    {"id": 0, "type": "A", "weight": 1.0,
                     "features": [{"name": "f", "type": "dense", "value": [0.1, 0.2]}]},
                    {"id": 1, "type": "A", "weight": 1.0,
                     "features": [{"name": "f", "type": "dense", "value": [0.3, 0.4]}]}
                ],
                "edges": [{"src": 0, "dst": 1, "type": "r", "weight": 3.0}]}"#,
            ))
            .unwrap();
        let schema = builder.finish();

        assert_eq!(schema.node_types().len(), 1);
        assert_eq!(schema.edge_types().len(), 1);
        assert_eq!(schema.node_count(), 2);
        assert_eq!(schema.edge_count(), 1);
        let f = schema.feature(EntityClass::Node, "dense_f").unwrap();
        assert_eq!((f.slot, f.dim()), (0, 2));
    }

    #[test]
    fn test_sparse_dim_grows_across_records() {
        let mut builder = SchemaBuilder::new("graph", "2.0", 1);
        builder
            .add_document(&doc(
                r#"{"nodes": [
                    {"id": 0, "type": "A", "weight": 1.0,
                     "features": [{"name": "f", "type": "sparse", "value": [2, 5]}]},
                    {"id": 1, "type": "A", "weight": 1.0,
                     "features": [{"name": "f", "type": "sparse", "value": [1, 9]}]},
                    {"id": 2, "type": "A", "weight": 1.0,
                     "features": [{"name": "f", "type": "sparse", "value": [3]}]}
                ]}"#,
            ))
            .unwrap();
        let schema = builder.finish();
        assert_eq!(schema.feature(EntityClass::Node, "sparse_f").unwrap().dim(), 9);
    }

    #[test]
    fn test_counts_sum_across_documents() {
        let mut builder = SchemaBuilder::new("graph", "2.0", 1);
        let d = doc(r#"{"nodes": [{"id": 0, "type": "A", "weight": 1.0}]}"#);
        builder.add_document(&d).unwrap();
        builder.add_document(&d).unwrap();
        assert_eq!(builder.documents(), 2);
        assert_eq!(builder.finish().node_count(), 2);
    }

    #[test]
    fn test_unsupported_kind_is_fatal() {
        let mut builder = SchemaBuilder::new("graph", "2.0", 1);
        let err = builder
            .add_document(&doc(
                r#"{"nodes": [{"id": 0, "type": "A", "weight": 1.0,
                    "features": [{"name": "f", "type": "embedding", "value": []}]}]}"#,
            ))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFeatureKind(_)));
    }

    #[test]
    fn test_deterministic_over_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("b.json"),
            r#"{"nodes": [{"id": 1, "type": "B", "weight": 1.0}]}"#,
        )
        .unwrap();
        std::fs::write(
            temp.path().join("a.json"),
            r#"{"nodes": [{"id": 0, "type": "A", "weight": 1.0}]}"#,
        )
        .unwrap();
        std::fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

        let first = build_schema(&[temp.path()], "graph", "2.0", 1).unwrap();
        let second = build_schema(&[temp.path()], "graph", "2.0", 1).unwrap();
        assert_eq!(first.serialize(), second.serialize());
        // a.json is visited first
        assert_eq!(first.node_type_index("A").unwrap(), 0);
        assert_eq!(first.node_type_index("B").unwrap(), 1);
    }
}
