//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.partgraph/config.toml`
//! 2. Local config: an explicit file, or `partgraph.toml` in the working directory
//! 3. CLI overrides
//!
//! Later sources override earlier ones.

use crate::error::ConfigError;
use crate::{ConfigOverrides, PipelineConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Global configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Global configuration directory name.
const GLOBAL_CONFIG_DIR: &str = ".partgraph";

/// Local configuration file name.
pub const LOCAL_CONFIG_FILE: &str = "partgraph.toml";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.partgraph`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<PipelineConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.partgraph`).
    pub fn new() -> Self {
        let global_config_dir = dirs::home_dir().map(|h| h.join(GLOBAL_CONFIG_DIR));

        Self {
            global_config_dir,
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    ///
    /// Useful for testing.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    /// Get the global config file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Get the implicit local config file path for a directory.
    pub fn local_config_path(&self, dir: &Path) -> PathBuf {
        dir.join(LOCAL_CONFIG_FILE)
    }

    /// Load configuration with optional CLI overrides.
    ///
    /// `explicit` must exist when given; otherwise `partgraph.toml` in
    /// `working_dir` is used if present. Merges global → local → overrides.
    pub fn load(
        &mut self,
        working_dir: &Path,
        explicit: Option<&Path>,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<PipelineConfig, ConfigError> {
        let mut config = PipelineConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        let local = match explicit {
            Some(path) => {
                debug!("Loading config from {:?}", path);
                Some(load_config_file(path)?)
            }
            None => self.load_local(working_dir)?,
        };
        if let Some(local_config) = local {
            config = merge_configs(config, local_config);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<PipelineConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let config = load_config_file(&global_path)?;

        self.global_config = Some(config.clone());

        Ok(Some(config))
    }

    /// Load only the implicit local configuration of a directory.
    pub fn load_local(&self, dir: &Path) -> Result<Option<PipelineConfig>, ConfigError> {
        let local_path = self.local_config_path(dir);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        load_config_file(&local_path).map(Some)
    }

    /// Write a default `partgraph.toml` into `dir` unless one exists.
    pub fn init_local(&self, dir: &Path) -> Result<PathBuf, ConfigError> {
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| ConfigError::write(dir, e))?;
        }

        let config_path = self.local_config_path(dir);
        if !config_path.exists() {
            save_config_file(&config_path, &PipelineConfig::default())?;
        }

        Ok(config_path)
    }

    /// Write a default global config unless one exists.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoGlobalDir);
        };

        let config_path = global_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            save_config_file(&config_path, &PipelineConfig::default())?;
        }

        Ok(config_path)
    }
}

/// Load a configuration file from disk.
fn load_config_file(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse(path, e))
}

/// Save a configuration file to disk.
fn save_config_file(path: &Path, config: &PipelineConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::write(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write(path, e))
}

/// Merge two configurations, with `overlay` taking precedence.
///
/// An overlay value equal to its default leaves the base value in place.
fn merge_configs(base: PipelineConfig, overlay: PipelineConfig) -> PipelineConfig {
    let defaults = PipelineConfig::default();
    let pick = |base: String, overlay: String, default: &str| {
        if overlay != default {
            overlay
        } else {
            base
        }
    };

    PipelineConfig {
        schema: crate::SchemaConfig {
            name: pick(base.schema.name, overlay.schema.name, &defaults.schema.name),
            version: pick(
                base.schema.version,
                overlay.schema.version,
                &defaults.schema.version,
            ),
            file_name: pick(
                base.schema.file_name,
                overlay.schema.file_name,
                &defaults.schema.file_name,
            ),
        },
        output: crate::OutputConfig {
            data_prefix: pick(
                base.output.data_prefix,
                overlay.output.data_prefix,
                &defaults.output.data_prefix,
            ),
            index_prefix: pick(
                base.output.index_prefix,
                overlay.output.index_prefix,
                &defaults.output.index_prefix,
            ),
        },
        build: crate::BuildConfig {
            parallel: overlay.build.parallel || base.build.parallel,
        },
        logging: crate::LoggingConfig {
            level: pick(
                base.logging.level,
                overlay.logging.level,
                &defaults.logging.level,
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_global(dir: &Path, content: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(CONFIG_FILE_NAME), content).unwrap();
    }

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let config = loader.load(temp.path(), None, None).unwrap();

        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_load_local_config() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        std::fs::write(
            temp.path().join(LOCAL_CONFIG_FILE),
            r#"
            [schema]
            name = "social"

            [build]
            parallel = true
            "#,
        )
        .unwrap();

        let config = loader.load(temp.path(), None, None).unwrap();

        assert_eq!(config.schema.name, "social");
        assert!(config.build.parallel);
    }

    #[test]
    fn test_local_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");
        write_global(
            &global_dir,
            r#"
            [logging]
            level = "debug"

            [output]
            data_prefix = "global"
            "#,
        );
        std::fs::write(
            temp.path().join(LOCAL_CONFIG_FILE),
            r#"
            [output]
            data_prefix = "local"
            "#,
        )
        .unwrap();

        let mut loader = ConfigLoader::with_global_dir(&global_dir);
        let config = loader.load(temp.path(), None, None).unwrap();

        assert_eq!(config.output.data_prefix, "local");
        // not set locally, so the global value survives
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_explicit_file_replaces_implicit_local() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(LOCAL_CONFIG_FILE),
            "[output]\ndata_prefix = \"implicit\"\n",
        )
        .unwrap();
        let explicit = temp.path().join("custom.toml");
        std::fs::write(&explicit, "[output]\ndata_prefix = \"explicit\"\n").unwrap();

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let config = loader.load(temp.path(), Some(&explicit), None).unwrap();

        assert_eq!(config.output.data_prefix, "explicit");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let missing = temp.path().join("missing.toml");

        let err = loader.load(temp.path(), Some(&missing), None).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_bad_toml_reports_path() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(LOCAL_CONFIG_FILE), "[output\n").unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let err = loader.load(temp.path(), None, None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(LOCAL_CONFIG_FILE));
    }

    #[test]
    fn test_cli_overrides_all() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(LOCAL_CONFIG_FILE),
            "[output]\nindex_prefix = \"local\"\n",
        )
        .unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let overrides = ConfigOverrides {
            index_prefix: Some("cli".to_string()),
            log_level: Some("trace".to_string()),
            ..Default::default()
        };
        let config = loader.load(temp.path(), None, Some(&overrides)).unwrap();

        assert_eq!(config.output.index_prefix, "cli");
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_global_config_is_cached() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");
        write_global(&global_dir, "[schema]\nversion = \"3.1\"\n");

        let mut loader = ConfigLoader::with_global_dir(&global_dir);
        assert!(loader.load_global().unwrap().is_some());
        std::fs::remove_file(global_dir.join(CONFIG_FILE_NAME)).unwrap();

        let config = loader.load(temp.path(), None, None).unwrap();
        assert_eq!(config.schema.version, "3.1");
    }

    #[test]
    fn test_init_local_creates_loadable_config() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let path = loader.init_local(&temp.path().join("project")).unwrap();

        assert!(path.ends_with(LOCAL_CONFIG_FILE));
        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: PipelineConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed, PipelineConfig::default());
    }

    #[test]
    fn test_init_global() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let path = loader.init_global().unwrap();
        assert!(path.exists());
        // second call leaves the file alone
        std::fs::write(&path, "[build]\nparallel = true\n").unwrap();
        loader.init_global().unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("parallel = true"));
    }
}
