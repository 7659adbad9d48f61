//! Error types shared by every pipeline stage.
//!
//! All variants are unrecoverable for the current run: a build either
//! completes or aborts, there is no partial-success mode.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while building a schema, store or index.
#[derive(Debug, Error)]
pub enum Error {
    /// Truncated or garbled binary input, or a JSON value of the wrong shape
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Unregistered node/edge type, feature, or value/id type name
    #[error("unknown {what}: '{name}'")]
    UnknownType { what: &'static str, name: String },

    /// Feature kind outside {dense, sparse, binary}
    #[error("unsupported feature kind: '{0}'")]
    UnsupportedFeatureKind(String),

    /// Edge referencing a node id absent from the node set
    #[error("edge {src} -> {dst} references missing node {missing}")]
    DanglingReference { src: u64, dst: u64, missing: u64 },

    /// Invalid caller-supplied argument (e.g. zero partitions)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error on a specific path
    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parse error on a specific path
    #[error("failed to parse JSON '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Create a new MalformedInput error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput(message.into())
    }

    /// Create a new UnknownType error.
    pub fn unknown_type(what: &'static str, name: impl Into<String>) -> Self {
        Self::UnknownType {
            what,
            name: name.into(),
        }
    }

    /// Create a new Io error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a new Json error.
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
