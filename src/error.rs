//! Error types for ondie-cache
//!
//! All modules use `CacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ondie-cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// All errors that can occur while refreshing or reading the cache
#[derive(Error, Debug)]
pub enum CacheError {
    // Signal errors
    #[error("Previous update not yet processed: {reason}")]
    PendingUpdate { reason: String, stale: bool },

    #[error("Failed to publish update marker {path}: {source}")]
    Publish {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Transport errors
    #[error("Failed to fetch bundle from {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Unsupported bundle source: {0}")]
    SourceInvalid(String),

    #[error("Invalid bundle {path}: {reason}")]
    BundleInvalid { path: PathBuf, reason: String },

    // Staging errors
    #[error("Failed to stage {artifact}: {source}")]
    Staging {
        artifact: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing to stage {artifact}: {reason}")]
    ArtifactRejected { artifact: PathBuf, reason: String },

    // Reader-side errors
    #[error("Failed to promote {shadow}: {source}")]
    Promotion {
        shadow: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Cache directory errors
    #[error("Cache directory does not exist: {0}")]
    CacheDirMissing(PathBuf),

    #[error("Cache path is not a directory: {0}")]
    CacheDirNotDirectory(PathBuf),

    #[error("No cache directory given")]
    CacheDirRequired,

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a transport error for a source URL
    pub fn transport(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transport {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a bundle error
    pub fn bundle(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::BundleInvalid {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if the caller can expect a later retry to succeed without changes
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PendingUpdate { .. } | Self::Transport { .. })
    }

    /// Process exit code for this error
    ///
    /// Every refresh failure kind gets its own code so wrappers (cron,
    /// systemd timers) can tell them apart.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::PendingUpdate { .. } => 2,
            Self::Transport { .. } | Self::SourceInvalid(_) => 3,
            Self::BundleInvalid { .. } => 4,
            Self::Staging { .. } | Self::ArtifactRejected { .. } => 5,
            Self::Publish { .. } => 6,
            Self::Promotion { .. } => 7,
            _ => 1,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::PendingUpdate { stale: true, .. } => Some(
                "The marker is old; check that the reader is running, or rerun with --force",
            ),
            Self::PendingUpdate { stale: false, .. } => {
                Some("Wait for the reader to pick up the update, or rerun with --force")
            }
            Self::CacheDirRequired => {
                Some("Pass --cache-dir, set ONDIE_CACHE_DIR, or set cache.dir in the config")
            }
            Self::CacheDirMissing(_) => Some("Create the directory before the first update"),
            Self::Publish { .. } => {
                Some("Staged .new files were left in place; the next update overwrites them")
            }
            _ => None,
        }
    }
}
