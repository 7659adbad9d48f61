//! Inspect command - decode schema and partition files

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use partgraph_core::{read_partition, Adjacency, Edge, GraphSchema, Node};

use super::print_json;

/// Inspect subcommands
#[derive(Subcommand, Debug)]
pub enum InspectCommand {
    /// Print a schema file
    Schema(SchemaArgs),

    /// Print the records of a Node/ or Edge/ partition file
    Partition(PartitionArgs),
}

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Schema file
    file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum RecordKind {
    Node,
    Edge,
}

#[derive(Args, Debug)]
pub struct PartitionArgs {
    /// Partition file
    file: PathBuf,

    /// Record kind stored in the file
    #[arg(long, value_enum, default_value_t = RecordKind::Node)]
    kind: RecordKind,

    /// Print at most this many records
    #[arg(long)]
    limit: Option<usize>,

    /// One JSON object per record
    #[arg(long)]
    json: bool,
}

/// Execute the inspect command
pub fn execute(cmd: InspectCommand) -> Result<()> {
    match cmd {
        InspectCommand::Schema(args) => execute_schema(args),
        InspectCommand::Partition(args) => execute_partition(args),
    }
}

fn execute_schema(args: SchemaArgs) -> Result<()> {
    let schema = GraphSchema::read_from(&args.file)
        .with_context(|| format!("Failed to read schema {}", args.file.display()))?;
    if args.json {
        print_json(&schema)
    } else {
        print!("{schema}");
        Ok(())
    }
}

fn execute_partition(args: PartitionArgs) -> Result<()> {
    let limit = args.limit.unwrap_or(usize::MAX);
    let context = || format!("Failed to decode {}", args.file.display());
    match args.kind {
        RecordKind::Node => {
            let nodes: Vec<Node> = read_partition(&args.file).with_context(context)?;
            for node in nodes.iter().take(limit) {
                if args.json {
                    println!("{}", serde_json::to_string(node)?);
                } else {
                    println!("{}", describe_node(node));
                }
            }
        }
        RecordKind::Edge => {
            let edges: Vec<Edge> = read_partition(&args.file).with_context(context)?;
            for edge in edges.iter().take(limit) {
                if args.json {
                    println!("{}", serde_json::to_string(edge)?);
                } else {
                    println!("{}", describe_edge(edge));
                }
            }
        }
    }
    Ok(())
}

fn describe_node(node: &Node) -> String {
    format!(
        "node {} type={} weight={} out=[{}] in=[{}]",
        node.id,
        node.type_index,
        node.weight,
        describe_adjacency(&node.outgoing),
        describe_adjacency(&node.incoming)
    )
}

fn describe_edge(edge: &Edge) -> String {
    format!(
        "edge {} -> {} type={} weight={}",
        edge.src, edge.dst, edge.type_index, edge.weight
    )
}

/// `t0: id:w id:w; t1: ...`, non-empty groups only.
fn describe_adjacency(adjacency: &Adjacency) -> String {
    adjacency
        .groups()
        .iter()
        .enumerate()
        .filter(|(_, group)| !group.is_empty())
        .map(|(t, group)| {
            let neighbors: Vec<String> = group
                .iter()
                .map(|n| format!("{}:{}", n.id, n.weight))
                .collect();
            format!("t{t}: {}", neighbors.join(" "))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_adjacency_skips_empty_groups() {
        let mut adjacency = Adjacency::new(3);
        adjacency.push(0, 7, 1.5).unwrap();
        adjacency.push(2, 9, 2.0).unwrap();
        adjacency.push(2, 4, 0.5).unwrap();
        assert_eq!(describe_adjacency(&adjacency), "t0: 7:1.5; t2: 9:2 4:0.5");
    }

    #[test]
    fn test_describe_empty_adjacency() {
        assert_eq!(describe_adjacency(&Adjacency::new(2)), "");
    }
}
