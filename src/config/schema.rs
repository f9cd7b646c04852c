//! Configuration schema for ondie-cache
//!
//! Configuration is stored at `~/.config/ondie-cache/config.toml`

use crate::fetch::DEFAULT_SOURCE_URL;
use crate::refresh::DEFAULT_SUBTREES;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Bundle source settings
    pub source: SourceConfig,

    /// Cache directory settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Record refresh and promotion events in the audit log
    pub audit_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            audit_log: true,
        }
    }
}

/// Where the artifact bundle comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Bundle URL: http(s)://, file:// or a local path
    pub url: String,

    /// Transfer timeout in seconds (0 = no timeout)
    pub timeout_secs: u64,

    /// Directories inside the bundle holding artifacts
    pub subtrees: Vec<PathBuf>,
}

impl SourceConfig {
    /// Transfer timeout, `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            timeout_secs: 300,
            subtrees: DEFAULT_SUBTREES.iter().map(PathBuf::from).collect(),
        }
    }
}

/// Cache directory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory used when none is given on the command line
    pub dir: Option<PathBuf>,

    /// Parent of the per-cycle workspace (defaults to the system temp dir)
    pub work_dir: Option<PathBuf>,

    /// Hours after which a pending marker is reported as stale
    pub stale_after_hours: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            work_dir: None,
            stale_after_hours: 24,
        }
    }
}
