//! Legacy command - JSON-lines blocks into one flat binary file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use partgraph_core::legacy;

use crate::progress::with_spinner;
use crate::GlobalOptions;

/// Arguments for the legacy command
#[derive(Args, Debug)]
pub struct LegacyArgs {
    /// Meta document with edge type and feature slot counts
    meta_path: PathBuf,

    /// JSON-lines input, one block per line
    input_path: PathBuf,

    /// Binary output file
    output_path: PathBuf,
}

/// Execute the legacy command
pub fn execute(args: LegacyArgs, global: &GlobalOptions) -> Result<()> {
    let blocks = with_spinner(
        "Converting blocks",
        global.quiet,
        || legacy::convert(&args.meta_path, &args.input_path, &args.output_path),
        |blocks: &usize| format!("Converted {blocks} blocks"),
    )
    .with_context(|| format!("Failed to convert {}", args.input_path.display()))?;

    println!("{blocks} blocks written to {}", args.output_path.display());
    Ok(())
}
