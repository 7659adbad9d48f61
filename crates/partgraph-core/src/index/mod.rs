//! Secondary indices over node and edge attributes.
//!
//! - [`definition`]: the index-definition document and `name:value:id:kind` keys
//! - [`value`]: the scalar types an index may hold
//! - [`builder`]: entry extraction, partitioning and the neighbor post-pass
//! - [`writer`]: hash / range / neighbor file encodings
//!
//! ```text
//! <out>/Index/<name>/meta               i32 kind, i32 id type, i32 value type
//! <out>/Index/<name>/<prefix>_<p>.dat   one file per partition
//! ```

pub mod builder;
pub mod definition;
pub mod value;
pub mod writer;

pub use builder::{build, IndexBuildStats, IndexBuilder, IndexEntry};
pub use definition::{FieldPath, IndexDefinition, IndexKey, IndexKind};
pub use value::{IndexValue, ValueType};

/// Directory holding every index.
pub const INDEX_DIR: &str = "Index";

/// Type-descriptor file name inside each index directory.
pub const DESCRIPTOR_FILE: &str = "meta";

/// Default partition file prefix for index data.
pub const DEFAULT_INDEX_PREFIX: &str = "index";
