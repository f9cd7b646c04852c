//! Transient download/extraction workspace
//!
//! Owned by exactly one refresh cycle. `cleanup` removes it and reports
//! failures; if the cycle is dropped early (panic, cancelled future) the
//! directory is still removed on drop.

use crate::error::{CacheError, CacheResult};
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

const WORKSPACE_PREFIX: &str = "ondie-cache-";

/// Scoped temporary directory for one refresh cycle
#[derive(Debug)]
pub struct TransientWorkspace {
    dir: TempDir,
}

impl TransientWorkspace {
    /// Create a fresh workspace under `parent`, or the system temp dir
    pub fn acquire(parent: Option<&Path>) -> CacheResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|e| CacheError::io("creating transient workspace", e))?;

        debug!("Acquired workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Root of the workspace
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the raw bundle is downloaded
    pub fn download_dir(&self) -> PathBuf {
        self.dir.path().join("download")
    }

    /// Where the bundle is unpacked
    pub fn extract_dir(&self) -> PathBuf {
        self.dir.path().join("extract")
    }

    /// Remove the workspace recursively
    pub fn cleanup(self) -> Result<(), CleanupWarning> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| CleanupWarning {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        debug!("Removed workspace {}", path.display());
        Ok(())
    }
}

/// Non-fatal failure to remove a workspace
///
/// The cache itself is unaffected; only disk space is wasted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupWarning {
    /// Workspace that could not be fully removed
    pub path: PathBuf,
    /// Underlying error
    pub reason: String,
}

impl fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not remove workspace {}: {}",
            self.path.display(),
            self.reason
        )
    }
}
