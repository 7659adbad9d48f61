//! Convert command - write the partitioned store for an existing schema

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use partgraph_config::{ConfigOverrides, PipelineConfig};
use partgraph_core::store::{self, StoreConfig};
use partgraph_core::{GraphSchema, StoreStats};
use tracing::warn;

use super::{describe_store, print_json};
use crate::progress::with_spinner;
use crate::GlobalOptions;

/// Arguments for the convert command
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// JSON graph document
    graph_json: PathBuf,

    /// Schema file produced by `meta`
    schema: PathBuf,

    /// Output directory
    output_dir: PathBuf,

    /// Number of partitions
    partition_num: u32,

    /// Node/Edge partition file prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Write partition files concurrently
    #[arg(long)]
    parallel: bool,

    /// Print store statistics as JSON
    #[arg(long)]
    json: bool,
}

impl ConvertArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            data_prefix: self.prefix.clone(),
            parallel: self.parallel.then_some(true),
            ..Default::default()
        }
    }
}

/// Execute the convert command
pub fn execute(args: ConvertArgs, config: &PipelineConfig, global: &GlobalOptions) -> Result<()> {
    let schema = GraphSchema::read_from(&args.schema)
        .with_context(|| format!("Failed to read schema {}", args.schema.display()))?;
    if schema.partition_num() != args.partition_num {
        warn!(
            "Schema was built for {} partitions, writing {}",
            schema.partition_num(),
            args.partition_num
        );
    }

    let store_config = StoreConfig::new(args.partition_num)
        .with_prefix(config.output.data_prefix.as_str())
        .with_parallel(config.build.parallel);

    let stats = with_spinner(
        "Writing partitions",
        global.quiet,
        || store::build(&args.graph_json, &schema, &args.output_dir, &store_config),
        |stats: &StoreStats| format!("Wrote {}", describe_store(stats)),
    )
    .with_context(|| format!("Failed to convert {}", args.graph_json.display()))?;

    if args.json {
        print_json(&stats)
    } else {
        println!("{}", describe_store(&stats));
        Ok(())
    }
}
