//! Meta command - build a schema from JSON graph files

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use partgraph_config::{ConfigOverrides, PipelineConfig};
use partgraph_core::schema_builder::build_schema;
use partgraph_core::GraphSchema;

use super::print_json;
use crate::progress::with_spinner;
use crate::GlobalOptions;

/// Arguments for the meta command
#[derive(Args, Debug)]
pub struct MetaArgs {
    /// JSON graph files or directories (directories are scanned for *.json in name order)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Schema file to write (default: the configured schema file name)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Number of partitions recorded in the schema
    #[arg(long, short = 'p', default_value_t = 1)]
    partitions: u32,

    /// Schema name
    #[arg(long)]
    schema_name: Option<String>,

    /// Schema version
    #[arg(long)]
    schema_version: Option<String>,

    /// Print the resulting schema as JSON
    #[arg(long)]
    json: bool,
}

impl MetaArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            schema_name: self.schema_name.clone(),
            schema_version: self.schema_version.clone(),
            ..Default::default()
        }
    }
}

/// Execute the meta command
pub fn execute(args: MetaArgs, config: &PipelineConfig, global: &GlobalOptions) -> Result<()> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.schema.file_name));

    let schema = with_spinner(
        "Building schema",
        global.quiet,
        || {
            build_schema(
                args.inputs.as_slice(),
                &config.schema.name,
                &config.schema.version,
                args.partitions,
            )
        },
        |schema: &GraphSchema| {
            format!(
                "Schema built: {} nodes, {} edges",
                schema.node_count(),
                schema.edge_count()
            )
        },
    )
    .context("Failed to build schema")?;

    schema
        .write_to(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if args.json {
        print_json(&schema)
    } else {
        println!("{}", output.display());
        Ok(())
    }
}
