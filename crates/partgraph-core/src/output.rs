//! Staged output directory.
//!
//! Writers fill a hidden staging directory created inside the target
//! directory. [`StagedOutput::commit`] then moves every top-level entry into
//! place, replacing what was there. Dropping an uncommitted stage deletes it,
//! so a failed run leaves the previous output untouched.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::error::{Error, Result};

const STAGING_PREFIX: &str = ".partgraph-staging-";

/// A staging directory bound to its final location.
#[derive(Debug)]
pub struct StagedOutput {
    target: PathBuf,
    staging: TempDir,
}

impl StagedOutput {
    /// Create the target directory (if needed) and a fresh stage inside it.
    pub fn new(target: &Path) -> Result<Self> {
        fs::create_dir_all(target).map_err(|e| Error::io(target, e))?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(target)
            .map_err(|e| Error::io(target, e))?;
        debug!("Staging output for {:?} in {:?}", target, staging.path());
        Ok(Self {
            target: target.to_path_buf(),
            staging,
        })
    }

    /// Directory writers should write into.
    pub fn path(&self) -> &Path {
        self.staging.path()
    }

    /// Final output directory.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Move every staged top-level entry into the target, replacing existing
    /// entries of the same name. Returns the committed paths in name order.
    pub fn commit(self) -> Result<Vec<PathBuf>> {
        let staging = self.staging.path();
        let mut entries = fs::read_dir(staging)
            .map_err(|e| Error::io(staging, e))?
            .map(|entry| entry.map(|e| e.file_name()))
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| Error::io(staging, e))?;
        entries.sort();

        let mut committed = Vec::with_capacity(entries.len());
        for name in entries {
            let from = staging.join(&name);
            let to = self.target.join(&name);
            remove_existing(&to)?;
            fs::rename(&from, &to).map_err(|e| Error::io(&to, e))?;
            debug!("Committed {:?}", to);
            committed.push(to);
        }
        Ok(committed)
    }
}

fn remove_existing(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).map_err(|e| Error::io(path, e)),
        Ok(_) => fs::remove_file(path).map_err(|e| Error::io(path, e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}
