//! partgraph CLI - JSON graph to partitioned binary store
//!
//! # Usage
//!
//! ```bash
//! # Schema, store and indices in one step
//! partgraph generate graph.json out/ 4 index.json
//!
//! # Individual phases
//! partgraph meta graph.json --output out/euler.meta --partitions 4
//! partgraph convert graph.json out/euler.meta out/ 4
//! partgraph index index.json graph.json out/ 4 --schema out/euler.meta
//!
//! # Single-file block format
//! partgraph legacy meta.json blocks.json graph.dat
//!
//! # Look at the output
//! partgraph inspect schema out/euler.meta
//! partgraph inspect partition out/Node/data_0.dat --kind node
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use partgraph_config::{ConfigLoader, ConfigOverrides, PipelineConfig};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod commands;
mod progress;

/// partgraph - Offline graph ETL into a hash-partitioned binary store
#[derive(Parser, Debug)]
#[command(name = "partgraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Path to configuration file (default: ./partgraph.toml if present)
    #[arg(long, short = 'c', global = true, env = "PARTGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build schema, partitioned store and indices in one step
    Generate(commands::generate::GenerateArgs),

    /// Build a schema from JSON graph files
    Meta(commands::meta::MetaArgs),

    /// Write the partitioned node/edge store for an existing schema
    Convert(commands::convert::ConvertArgs),

    /// Build secondary indices from an index definition
    Index(commands::index::IndexArgs),

    /// Convert JSON-lines blocks into the single-file block format
    Legacy(commands::legacy::LegacyArgs),

    /// Decode and print generated files
    #[command(subcommand)]
    Inspect(commands::inspect::InspectCommand),

    /// View and initialize configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

impl Commands {
    /// Config values this command's flags override.
    fn overrides(&self) -> ConfigOverrides {
        match self {
            Commands::Generate(args) => args.overrides(),
            Commands::Meta(args) => args.overrides(),
            Commands::Convert(args) => args.overrides(),
            Commands::Index(args) => args.overrides(),
            _ => ConfigOverrides::default(),
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // Help and version go to stdout and are not failures
            return if err.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.global, &cli.command.overrides())?;
    init_logging(&cli.global, &config.logging.level)?;

    match cli.command {
        Commands::Generate(args) => commands::generate::execute(args, &config, &cli.global),
        Commands::Meta(args) => commands::meta::execute(args, &config, &cli.global),
        Commands::Convert(args) => commands::convert::execute(args, &config, &cli.global),
        Commands::Index(args) => commands::index::execute(args, &config, &cli.global),
        Commands::Legacy(args) => commands::legacy::execute(args, &cli.global),
        Commands::Inspect(cmd) => commands::inspect::execute(cmd),
        Commands::Config(cmd) => commands::config::execute(cmd, &config, &cli.global),
    }
}

/// Merge global, local and command-line configuration.
fn load_config(global: &GlobalOptions, overrides: &ConfigOverrides) -> Result<PipelineConfig> {
    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let config = ConfigLoader::new()
        .load(&working_dir, global.config.as_deref(), Some(overrides))
        .context("Failed to load configuration")?;
    config.validate()?;
    Ok(config)
}

/// Install the stderr subscriber. `--quiet`/`--verbose` win over `RUST_LOG`,
/// which wins over the configured level.
fn init_logging(global: &GlobalOptions, config_level: &str) -> Result<()> {
    let filter = if global.quiet {
        EnvFilter::new("error")
    } else if global.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config_level.to_lowercase()))
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
