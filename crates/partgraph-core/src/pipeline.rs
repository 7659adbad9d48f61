//! One-shot generator: schema, store and (optionally) indices into one
//! output directory, committed together.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::index::{
    IndexBuildStats, IndexBuilder, IndexDefinition, DEFAULT_INDEX_PREFIX, INDEX_DIR,
};
use crate::input::GraphDocument;
use crate::output::StagedOutput;
use crate::schema::{
    EntityClass, GraphSchema, DEFAULT_SCHEMA_NAME, DEFAULT_SCHEMA_VERSION, SCHEMA_FILE_NAME,
};
use crate::schema_builder::SchemaBuilder;
use crate::store::{PartitionedStoreBuilder, StoreConfig, StoreStats, DEFAULT_DATA_PREFIX};

/// Settings for [`generate`].
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub partition_num: u32,
    pub schema_name: String,
    pub schema_version: String,
    /// File name of the serialized schema inside the output directory
    pub schema_file_name: String,
    pub data_prefix: String,
    pub index_prefix: String,
    /// Write store partitions concurrently
    pub parallel: bool,
    /// Index definition document; no indices are built without one
    pub index_meta: Option<PathBuf>,
    /// After a successful commit, remove an `Index/` that this run did not
    /// rebuild
    pub clean: bool,
}

impl GenerateOptions {
    pub fn new(partition_num: u32) -> Self {
        Self {
            partition_num,
            schema_name: DEFAULT_SCHEMA_NAME.to_string(),
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            schema_file_name: SCHEMA_FILE_NAME.to_string(),
            data_prefix: DEFAULT_DATA_PREFIX.to_string(),
            index_prefix: DEFAULT_INDEX_PREFIX.to_string(),
            parallel: false,
            index_meta: None,
            clean: false,
        }
    }

    pub fn with_index_meta(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_meta = Some(path.into());
        self
    }

    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }
}

/// Counts from one schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaSummary {
    pub name: String,
    pub version: String,
    pub node_count: u64,
    pub edge_count: u64,
    pub node_types: usize,
    pub edge_types: usize,
    pub node_features: usize,
    pub edge_features: usize,
}

impl From<&GraphSchema> for SchemaSummary {
    fn from(schema: &GraphSchema) -> Self {
        Self {
            name: schema.name().to_string(),
            version: schema.version().to_string(),
            node_count: schema.node_count(),
            edge_count: schema.edge_count(),
            node_types: schema.node_types().len(),
            edge_types: schema.edge_types().len(),
            node_features: schema.features(EntityClass::Node).len(),
            edge_features: schema.features(EntityClass::Edge).len(),
        }
    }
}

/// What [`generate`] produced.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateReport {
    pub output_dir: PathBuf,
    pub schema: SchemaSummary,
    pub store: StoreStats,
    pub index: Option<IndexBuildStats>,
    /// Top-level entries committed into `output_dir`
    pub committed: Vec<PathBuf>,
    /// Stale entries removed after the commit
    pub removed: Vec<PathBuf>,
}

/// Build the schema, the partitioned store and the indices for `graph_json`
/// and commit them into `output_dir` in one step.
///
/// Nothing in `output_dir` changes unless every phase succeeds. A previous
/// `Index/` survives a run without an index definition unless
/// [`GenerateOptions::clean`] is set.
pub fn generate(
    graph_json: &Path,
    output_dir: &Path,
    options: &GenerateOptions,
) -> Result<GenerateReport> {
    if options.partition_num == 0 {
        return Err(Error::InvalidArgument(
            "partition_num must be at least 1".to_string(),
        ));
    }
    // Parse the definition before any heavy work so a bad one fails fast.
    let definition = options
        .index_meta
        .as_deref()
        .map(IndexDefinition::from_path)
        .transpose()?;

    info!("Loading {:?}", graph_json);
    let doc = GraphDocument::from_path(graph_json)?;

    let mut schema_builder = SchemaBuilder::new(
        options.schema_name.as_str(),
        options.schema_version.as_str(),
        options.partition_num,
    );
    schema_builder.add_document(&doc)?;
    let schema = schema_builder.finish();

    let stage = StagedOutput::new(output_dir)?;
    let schema_path = stage.path().join(&options.schema_file_name);
    schema.write_to(&schema_path)?;
    info!("Schema written to {:?}", output_dir.join(&options.schema_file_name));

    let config = StoreConfig::new(options.partition_num)
        .with_prefix(options.data_prefix.as_str())
        .with_parallel(options.parallel);
    let mut store = PartitionedStoreBuilder::new(&schema, config)?;
    store.add_document(&doc)?;
    let store_stats = store.write(stage.path())?;

    let index_stats = match &definition {
        Some(definition) => {
            let mut builder = IndexBuilder::new(definition, &schema, options.partition_num)?;
            builder.add_document(&doc)?;
            Some(builder.write(stage.path(), &options.index_prefix)?)
        }
        None => None,
    };

    let committed = stage.commit()?;
    info!("Generated {} entries under {:?}", committed.len(), output_dir);

    let removed = if definition.is_none() {
        remove_stale_index(output_dir, options.clean)?
    } else {
        Vec::new()
    };

    Ok(GenerateReport {
        output_dir: output_dir.to_path_buf(),
        schema: SchemaSummary::from(&schema),
        store: store_stats,
        index: index_stats,
        committed,
        removed,
    })
}

/// Handle an `Index/` left by an earlier run that this run did not rebuild.
fn remove_stale_index(output_dir: &Path, clean: bool) -> Result<Vec<PathBuf>> {
    let stale = output_dir.join(INDEX_DIR);
    if !stale.is_dir() {
        return Ok(Vec::new());
    }
    if !clean {
        warn!("{:?} from a previous run is kept; it does not match this run", stale);
        return Ok(Vec::new());
    }
    fs::remove_dir_all(&stale).map_err(|e| Error::io(&stale, e))?;
    info!("Removed stale {:?}", stale);
    Ok(vec![stale])
}
