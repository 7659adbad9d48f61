//! Index command - build secondary indices from an index definition

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use partgraph_config::{ConfigOverrides, PipelineConfig};
use partgraph_core::{index, GraphSchema};

use super::print_json;
use crate::progress::{finish_spinner, finish_spinner_error, finish_spinner_warn, spinner};
use crate::GlobalOptions;

/// Arguments for the index command
#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Index definition document
    index_meta: PathBuf,

    /// JSON graph document
    graph_json: PathBuf,

    /// Output directory
    output_dir: PathBuf,

    /// Number of partitions
    partition_num: u32,

    /// Index partition file prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Schema file; derived from the graph when omitted
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Print index statistics as JSON
    #[arg(long)]
    json: bool,
}

impl IndexArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            index_prefix: self.prefix.clone(),
            ..Default::default()
        }
    }
}

/// Execute the index command
pub fn execute(args: IndexArgs, config: &PipelineConfig, global: &GlobalOptions) -> Result<()> {
    let schema = args
        .schema
        .as_deref()
        .map(|path| {
            GraphSchema::read_from(path)
                .with_context(|| format!("Failed to read schema {}", path.display()))
        })
        .transpose()?;

    let pb = spinner("Building indices", global.quiet);
    let result = index::build(
        &args.index_meta,
        &args.graph_json,
        &args.output_dir,
        args.partition_num,
        &config.output.index_prefix,
        schema.as_ref(),
    );
    let stats = match result {
        Ok(stats) if stats.skipped_neighbor_edges > 0 => {
            finish_spinner_warn(
                pb,
                &format!(
                    "Built {} indices; {} neighbor edges skipped",
                    stats.indices, stats.skipped_neighbor_edges
                ),
            );
            stats
        }
        Ok(stats) => {
            finish_spinner(pb, &format!("Built {} indices", stats.indices));
            stats
        }
        Err(err) => {
            finish_spinner_error(pb, "Building indices failed");
            return Err(err).with_context(|| {
                format!("Failed to build indices from {}", args.index_meta.display())
            });
        }
    };

    if args.json {
        print_json(&stats)
    } else {
        println!(
            "{} indices, {} entries, {} files",
            stats.indices, stats.entries, stats.files
        );
        Ok(())
    }
}
