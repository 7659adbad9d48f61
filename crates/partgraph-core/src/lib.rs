//! partgraph Core - offline graph ETL into a partitioned binary store
//!
//! This crate turns a JSON description of a typed, weighted, multi-relational
//! graph into the on-disk layout consumed by the graph-serving engine:
//! - Binary codec for fixed-width scalars, strings and length-prefixed lists
//! - Graph schema (type registries and feature slot assignment) with its binary form
//! - Schema builder scanning one or more JSON graph documents
//! - Node/Edge records with weighted, type-grouped adjacency and their encoders
//! - Hash-partitioned store builder writing `Node/` and `Edge/` partition files
//! - Secondary index builder (hash / range / neighbor indices)
//!
//! # Output layout
//!
//! ```text
//! <out>/euler.meta                      serialized GraphSchema
//! <out>/Node/<prefix>_<p>.dat           node records, id % partition_num == p
//! <out>/Edge/<prefix>_<p>.dat           edge records, src_id % partition_num == p
//! <out>/Index/<name>/meta               index type descriptor
//! <out>/Index/<name>/<prefix>_<p>.dat   per-partition index data
//! ```
//!
//! Everything is held in memory before output is flushed, so residency is
//! O(graph size).

pub mod codec;
pub mod error;
pub mod hash;
pub mod index;
pub mod input;
pub mod legacy;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod schema;
pub mod schema_builder;
pub mod store;

// Re-exports for convenience
pub use codec::{Decode, Encode};
pub use error::{Error, Result};
pub use hash::{edge_id_hash, Hash64, Sha256Hash64};
pub use input::{EdgeJson, FeatureJson, GraphDocument, NodeJson};
pub use output::StagedOutput;
pub use record::{Adjacency, Edge, FeatureSlots, FeatureValue, Neighbor, Node};
pub use schema::{EntityClass, FeatureKind, FeatureSlot, GraphSchema, SlotCounts};
pub use schema_builder::SchemaBuilder;

// Store builder re-exports
pub use store::{partition_of, read_partition, PartitionedStoreBuilder, StoreConfig, StoreStats};

// Index builder re-exports
pub use index::{
    IndexBuildStats, IndexBuilder, IndexDefinition, IndexEntry, IndexKey, IndexKind, IndexValue,
    ValueType,
};

// Pipeline re-exports
pub use pipeline::{generate, GenerateOptions, GenerateReport, SchemaSummary};
