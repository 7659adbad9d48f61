//! Config command - view and initialize configuration

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use partgraph_config::{ConfigLoader, PipelineConfig};
use serde::Serialize;
use std::path::PathBuf;

use super::{print_info, print_json};
use crate::GlobalOptions;

/// Config management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show(ShowArgs),

    /// Write a default configuration file
    Init(InitArgs),

    /// Show configuration file paths
    Path(PathArgs),
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Output as JSON instead of TOML
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Write ~/.partgraph/config.toml instead of ./partgraph.toml
    #[arg(long)]
    global: bool,
}

#[derive(Args, Debug)]
pub struct PathArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Configuration file locations
#[derive(Debug, Clone, Serialize)]
pub struct ConfigPaths {
    pub global: Option<PathBuf>,
    pub global_exists: bool,
    pub local: PathBuf,
    pub local_exists: bool,
}

/// Execute the config command
pub fn execute(cmd: ConfigCommand, config: &PipelineConfig, global: &GlobalOptions) -> Result<()> {
    match cmd {
        ConfigCommand::Show(args) => {
            if args.json {
                print_json(config)
            } else {
                print!("{}", toml::to_string_pretty(config)?);
                Ok(())
            }
        }
        ConfigCommand::Init(args) => {
            let loader = ConfigLoader::new();
            let path = if args.global {
                loader.init_global()?
            } else {
                let cwd = std::env::current_dir().context("Failed to get current directory")?;
                loader.init_local(&cwd)?
            };
            print_info(&format!("Configuration at {}", path.display()), global.quiet);
            Ok(())
        }
        ConfigCommand::Path(args) => {
            let paths = config_paths(global)?;
            if args.json {
                return print_json(&paths);
            }
            match &paths.global {
                Some(path) => {
                    println!("global: {} ({})", path.display(), exists(paths.global_exists))
                }
                None => println!("global: (no home directory)"),
            }
            println!("local:  {} ({})", paths.local.display(), exists(paths.local_exists));
            Ok(())
        }
    }
}

fn config_paths(global: &GlobalOptions) -> Result<ConfigPaths> {
    let loader = ConfigLoader::new();
    let global_path = loader.global_config_path();
    let local = match &global.config {
        Some(path) => path.clone(),
        None => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            loader.local_config_path(&cwd)
        }
    };
    Ok(ConfigPaths {
        global_exists: global_path.as_ref().is_some_and(|p| p.exists()),
        global: global_path,
        local_exists: local.exists(),
        local,
    })
}

fn exists(flag: bool) -> &'static str {
    if flag {
        "exists"
    } else {
        "not found"
    }
}
