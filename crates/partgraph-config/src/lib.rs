//! partgraph Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.partgraph/config.toml`
//! - Local config: `./partgraph.toml`, or an explicit file (`--config`)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::{ConfigLoader, LOCAL_CONFIG_FILE};

use serde::{Deserialize, Serialize};

/// Log levels accepted by `logging.level`.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration for partgraph.
///
/// Represents the fully merged configuration from all sources.
///
/// # Example TOML
///
/// ```toml
/// [schema]
/// name = "social"
/// version = "2.0"
/// file_name = "euler.meta"
///
/// [output]
/// data_prefix = "data"
/// index_prefix = "index"
///
/// [build]
/// parallel = true
///
/// [logging]
/// level = "debug"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Schema naming
    pub schema: SchemaConfig,

    /// Output file naming
    pub output: OutputConfig,

    /// Build behavior
    pub build: BuildConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Schema name, version and file name written by the generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchemaConfig {
    pub name: String,
    pub version: String,
    /// Schema file name inside the output directory
    pub file_name: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            name: "graph".to_string(),
            version: "2.0".to_string(),
            file_name: "euler.meta".to_string(),
        }
    }
}

/// Partition file prefixes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    /// Prefix of `Node/` and `Edge/` partition files
    pub data_prefix: String,

    /// Prefix of index partition files
    pub index_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_prefix: "data".to_string(),
            index_prefix: "index".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct BuildConfig {
    /// Write partition files concurrently
    pub parallel: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub schema_name: Option<String>,
    pub schema_version: Option<String>,
    pub data_prefix: Option<String>,
    pub index_prefix: Option<String>,
    pub parallel: Option<bool>,
    pub log_level: Option<String>,
}

impl PipelineConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref name) = overrides.schema_name {
            self.schema.name = name.clone();
        }

        if let Some(ref version) = overrides.schema_version {
            self.schema.version = version.clone();
        }

        if let Some(ref prefix) = overrides.data_prefix {
            self.output.data_prefix = prefix.clone();
        }

        if let Some(ref prefix) = overrides.index_prefix {
            self.output.index_prefix = prefix.clone();
        }

        if let Some(parallel) = overrides.parallel {
            self.build.parallel = parallel;
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("schema.name", &self.schema.name),
            ("schema.file_name", &self.schema.file_name),
            ("output.data_prefix", &self.output.data_prefix),
            ("output.index_prefix", &self.output.index_prefix),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptySetting { key });
            }
        }

        if self.schema.file_name.contains(['/', '\\']) {
            return Err(ConfigError::NestedSchemaFile(self.schema.file_name.clone()));
        }

        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::UnknownLogLevel {
                level: self.logging.level.clone(),
                expected: LOG_LEVELS.join(", "),
            });
        }
        Ok(())
    }
}
