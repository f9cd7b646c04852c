//! Cache directory handle and naming rules
//!
//! Every cache operation takes a `CacheDirectory` instead of a raw path, so
//! the naming rules for live files, shadow files and the marker live in one
//! place.

use crate::error::{CacheError, CacheResult};
use serde::Serialize;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Suffix appended to an artifact name while it waits for promotion
pub const SHADOW_SUFFIX: &str = ".new";

/// Name of the zero-byte "update pending" marker
pub const MARKER_NAME: &str = "cache_updated";

/// Prefix of the scratch files a shadow is written through
pub const STAGING_PREFIX: &str = ".ondie-staging-";

/// Validated handle to a cache directory shared by one writer and many readers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDirectory {
    path: PathBuf,
}

impl CacheDirectory {
    /// Open an existing cache directory
    pub async fn open(path: impl Into<PathBuf>) -> CacheResult<Self> {
        let path = path.into();
        let metadata = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::CacheDirMissing(path));
            }
            Err(e) => {
                return Err(CacheError::io(
                    format!("inspecting cache directory {}", path.display()),
                    e,
                ));
            }
        };

        if !metadata.is_dir() {
            return Err(CacheError::CacheDirNotDirectory(path));
        }

        Ok(Self { path })
    }

    /// The directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the update marker
    pub fn marker_path(&self) -> PathBuf {
        self.path.join(MARKER_NAME)
    }

    /// Path of the live file for an artifact name
    pub fn live_path(&self, name: &OsStr) -> PathBuf {
        self.path.join(name)
    }

    /// Path of the shadow file for an artifact name
    pub fn shadow_path(&self, name: &OsStr) -> PathBuf {
        self.path.join(shadow_name(name))
    }

    /// List the shadow files currently in the directory, sorted by name
    pub async fn shadow_files(&self) -> CacheResult<Vec<PathBuf>> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot
            .shadow
            .iter()
            .map(|name| self.path.join(name))
            .collect())
    }

    /// Classify every entry in the directory
    pub async fn snapshot(&self) -> CacheResult<CacheSnapshot> {
        let mut snapshot = CacheSnapshot::default();
        let mut entries = fs::read_dir(&self.path).await.map_err(|e| {
            CacheError::io(format!("reading cache directory {}", self.path.display()), e)
        })?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::io("reading cache directory entry", e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);

            if !is_file || name.starts_with(STAGING_PREFIX) {
                snapshot.other.push(name);
            } else if name == MARKER_NAME {
                snapshot.marker = true;
            } else if live_name_for(OsStr::new(&name)).is_some() {
                snapshot.shadow.push(name);
            } else {
                snapshot.live.push(name);
            }
        }

        snapshot.live.sort();
        snapshot.shadow.sort();
        snapshot.other.sort();
        Ok(snapshot)
    }
}

/// Point-in-time classification of a cache directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheSnapshot {
    /// Files readers consume
    pub live: Vec<String>,
    /// Staged replacements waiting for promotion
    pub shadow: Vec<String>,
    /// Whether the update marker exists
    pub marker: bool,
    /// Directories, in-flight scratch files and anything else that is not
    /// a regular artifact
    pub other: Vec<String>,
}

impl CacheSnapshot {
    /// Shadow files that have no live counterpart yet
    pub fn new_artifacts(&self) -> Vec<&str> {
        self.shadow
            .iter()
            .filter_map(|s| s.strip_suffix(SHADOW_SUFFIX))
            .filter(|live| !self.live.iter().any(|l| l == live))
            .collect()
    }
}

/// Shadow file name for an artifact name
pub fn shadow_name(name: &OsStr) -> OsString {
    let mut shadow = name.to_os_string();
    shadow.push(SHADOW_SUFFIX);
    shadow
}

/// Live name a shadow file promotes to, or `None` if it is not a shadow name
///
/// Strips exactly one trailing suffix; a bare `.new` has no live name.
pub fn live_name_for(shadow: &OsStr) -> Option<OsString> {
    let name = shadow.to_str()?;
    match name.strip_suffix(SHADOW_SUFFIX) {
        Some(live) if !live.is_empty() => Some(OsString::from(live)),
        _ => None,
    }
}
