//! Local bundle transport (`file://` URLs and plain paths)
//!
//! Used for offline mirrors where the bundle is synced onto the host by
//! other means.

use crate::error::{CacheError, CacheResult};
use crate::fetch::{bundle_file_name, BundleSource};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Copies a bundle from the local filesystem
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Create a source for a local path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a source from a `file://` URL or a plain path
    pub fn from_url(url: &str) -> Self {
        let path = url
            .strip_prefix("file://")
            .or_else(|| url.strip_prefix("FILE://"))
            .unwrap_or(url);
        Self::new(path)
    }

    /// Path of the bundle being copied
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BundleSource for FileSource {
    async fn fetch(&self, dest_dir: &Path) -> CacheResult<PathBuf> {
        let dest = dest_dir.join(bundle_file_name(&self.path.to_string_lossy()));
        let copied = fs::copy(&self.path, &dest)
            .await
            .map_err(|e| CacheError::transport(self.location(), e))?;

        info!("Copied {} bytes from {}", copied, self.path.display());
        Ok(dest)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
