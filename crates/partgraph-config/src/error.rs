//! Errors raised while loading, writing or validating a [`PipelineConfig`].
//!
//! [`PipelineConfig`]: crate::PipelineConfig

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// A config source exists but could not be read
    #[error("cannot read pipeline config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A config source is not valid TOML for the pipeline sections
    #[error("{path:?} is not a valid pipeline config: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Default config could not be rendered as TOML
    #[error("cannot render pipeline config as TOML: {0}")]
    Render(#[from] toml::ser::Error),

    /// `config init` could not write the file or its directory
    #[error("cannot write pipeline config to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no home directory, so there is no global config location")]
    NoGlobalDir,

    /// A required naming setting is blank
    #[error("`{key}` must not be empty")]
    EmptySetting { key: &'static str },

    /// `schema.file_name` points into a subdirectory
    #[error("`schema.file_name` must be a plain file name inside the output directory, got {0:?}")]
    NestedSchemaFile(String),

    #[error("unknown `logging.level` {level:?}; expected one of {expected}")]
    UnknownLogLevel { level: String, expected: String },
}

impl ConfigError {
    pub fn read(path: &Path, source: std::io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn parse(path: &Path, source: toml::de::Error) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn write(path: &Path, source: std::io::Error) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            source,
        }
    }

    /// File the error is about, when there is one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } | Self::Write { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }
}
