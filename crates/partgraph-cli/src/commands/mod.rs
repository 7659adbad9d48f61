//! CLI command implementations

pub mod config;
pub mod convert;
pub mod generate;
pub mod index;
pub mod inspect;
pub mod legacy;
pub mod meta;

use partgraph_core::StoreStats;

/// Print an info message to stderr (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One-line store summary.
pub fn describe_store(stats: &StoreStats) -> String {
    format!(
        "{} nodes and {} edges in {} partitions",
        stats.total_nodes(),
        stats.total_edges(),
        stats.nodes_per_partition.len()
    )
}
