//! Generate command - schema, store and indices in one step

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use partgraph_config::{ConfigOverrides, PipelineConfig};
use partgraph_core::{GenerateOptions, GenerateReport};

use super::{describe_store, print_info, print_json};
use crate::progress::with_spinner;
use crate::GlobalOptions;

/// Arguments for the generate command
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// JSON graph document
    graph_json: PathBuf,

    /// Output directory
    output_dir: PathBuf,

    /// Number of partitions
    partition_num: u32,

    /// Index definition document. Without one, an Index/ left by a previous
    /// run is kept unless --clean is given
    index_meta: Option<PathBuf>,

    /// Schema name written into the schema file
    #[arg(long)]
    schema_name: Option<String>,

    /// Schema version written into the schema file
    #[arg(long)]
    schema_version: Option<String>,

    /// Node/Edge partition file prefix
    #[arg(long)]
    data_prefix: Option<String>,

    /// Index partition file prefix
    #[arg(long)]
    index_prefix: Option<String>,

    /// Write partition files concurrently
    #[arg(long)]
    parallel: bool,

    /// After a successful run, remove an Index/ this run did not rebuild
    #[arg(long)]
    clean: bool,

    /// Print the build report as JSON
    #[arg(long)]
    json: bool,
}

impl GenerateArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            schema_name: self.schema_name.clone(),
            schema_version: self.schema_version.clone(),
            data_prefix: self.data_prefix.clone(),
            index_prefix: self.index_prefix.clone(),
            parallel: self.parallel.then_some(true),
            ..Default::default()
        }
    }
}

/// Build generator options from the merged configuration.
fn options(args: &GenerateArgs, config: &PipelineConfig) -> GenerateOptions {
    GenerateOptions {
        partition_num: args.partition_num,
        schema_name: config.schema.name.clone(),
        schema_version: config.schema.version.clone(),
        schema_file_name: config.schema.file_name.clone(),
        data_prefix: config.output.data_prefix.clone(),
        index_prefix: config.output.index_prefix.clone(),
        parallel: config.build.parallel,
        index_meta: args.index_meta.clone(),
        clean: args.clean,
    }
}

/// Execute the generate command
pub fn execute(args: GenerateArgs, config: &PipelineConfig, global: &GlobalOptions) -> Result<()> {
    let options = options(&args, config);

    let report = with_spinner(
        "Generating",
        global.quiet,
        || partgraph_core::generate(&args.graph_json, &args.output_dir, &options),
        |report: &GenerateReport| format!("Generated {}", report.output_dir.display()),
    )
    .with_context(|| format!("Failed to generate from {}", args.graph_json.display()))?;

    if args.json {
        return print_json(&report);
    }

    let schema = &report.schema;
    println!(
        "schema  {} {}: {} node types, {} edge types, {} node features, {} edge features",
        schema.name,
        schema.version,
        schema.node_types,
        schema.edge_types,
        schema.node_features,
        schema.edge_features
    );
    println!("store   {}", describe_store(&report.store));
    if let Some(index) = &report.index {
        println!(
            "index   {} indices, {} entries, {} files",
            index.indices, index.entries, index.files
        );
        if index.skipped_neighbor_edges > 0 {
            print_info(
                &format!(
                    "{} edges skipped in node neighbor indices (destination without a value)",
                    index.skipped_neighbor_edges
                ),
                global.quiet,
            );
        }
    }
    for path in &report.removed {
        println!("removed {}", path.display());
    }
    if report.store.duplicate_nodes > 0 {
        print_info(
            &format!(
                "{} duplicate node ids replaced earlier records",
                report.store.duplicate_nodes
            ),
            global.quiet,
        );
    }
    Ok(())
}
