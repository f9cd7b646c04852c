//! Update history of cache directories
//!
//! Each refresh attempt and promotion appends one JSON line to
//! `~/.local/state/ondie-cache/audit.log`. `status` reads the history back
//! to show the last thing that happened to a cache directory.

use crate::cache::{CacheDirectory, StagedArtifact};
use crate::config::{schema::Config, ConfigManager};
use crate::error::CacheError;
use crate::refresh::RefreshReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Something that happened to a cache directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AuditEvent {
    /// Shadows were staged and the marker published
    RefreshCompleted {
        cycle: Uuid,
        cache_dir: PathBuf,
        source: String,
        staged: Vec<StagedArtifact>,
        forced: bool,
        cleanup_warning: Option<String>,
    },
    /// An unconsumed update blocked the refresh
    RefreshDenied {
        cycle: Uuid,
        cache_dir: PathBuf,
        source: String,
        reason: String,
        stale: bool,
    },
    /// The refresh failed before publishing
    RefreshFailed {
        cycle: Uuid,
        cache_dir: PathBuf,
        source: String,
        error: String,
        exit_code: u8,
        retryable: bool,
    },
    /// Shadows were promoted over live files
    CachePromoted {
        cache_dir: PathBuf,
        promoted: Vec<PathBuf>,
    },
}

impl AuditEvent {
    /// Event for a successful refresh cycle
    pub fn refresh_completed(cache: &CacheDirectory, report: &RefreshReport) -> Self {
        Self::RefreshCompleted {
            cycle: report.cycle_id,
            cache_dir: cache.path().to_path_buf(),
            source: report.source.clone(),
            staged: report.staged.clone(),
            forced: report.overrode_pending,
            cleanup_warning: report.cleanup_warning.as_ref().map(|w| w.to_string()),
        }
    }

    /// Event for a refresh cycle that ended in `err`
    pub fn refresh_rejected(
        cache: &CacheDirectory,
        cycle: Uuid,
        source: &str,
        err: &CacheError,
    ) -> Self {
        let cache_dir = cache.path().to_path_buf();
        let source = source.to_string();
        match err {
            CacheError::PendingUpdate { reason, stale } => Self::RefreshDenied {
                cycle,
                cache_dir,
                source,
                reason: reason.clone(),
                stale: *stale,
            },
            _ => Self::RefreshFailed {
                cycle,
                cache_dir,
                source,
                error: err.to_string(),
                exit_code: err.exit_code(),
                retryable: err.is_retryable(),
            },
        }
    }

    /// Event for a promotion that renamed `promoted` into place
    pub fn cache_promoted(cache: &CacheDirectory, promoted: &[PathBuf]) -> Self {
        Self::CachePromoted {
            cache_dir: cache.path().to_path_buf(),
            promoted: promoted.to_vec(),
        }
    }

    /// Name recorded in the `event` field
    pub fn name(&self) -> &'static str {
        match self {
            Self::RefreshCompleted { .. } => "refresh.completed",
            Self::RefreshDenied { .. } => "refresh.denied",
            Self::RefreshFailed { .. } => "refresh.failed",
            Self::CachePromoted { .. } => "cache.promoted",
        }
    }
}

#[derive(Serialize)]
struct AuditRecord<'a> {
    timestamp: DateTime<Utc>,
    event: &'static str,
    data: &'a AuditEvent,
}

/// An event read back from the history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub data: serde_json::Value,
}

impl AuditEntry {
    fn concerns(&self, cache_dir: &Path) -> bool {
        self.data
            .get("cache_dir")
            .and_then(|v| v.as_str())
            .is_some_and(|dir| Path::new(dir) == cache_dir)
    }
}

/// Append-only JSON-lines history
pub struct AuditLog {
    enabled: bool,
    path: PathBuf,
}

impl AuditLog {
    /// Create a history writer from config
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.audit_log,
            path: ConfigManager::audit_log_path(),
        }
    }

    /// Append an event
    ///
    /// IO failures are logged and dropped; the cache has already changed by
    /// the time this runs.
    pub async fn record(&self, event: &AuditEvent) {
        if !self.enabled {
            return;
        }

        let record = AuditRecord {
            timestamp: Utc::now(),
            event: event.name(),
            data: event,
        };
        let mut line = match serde_json::to_string(&record) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize {} event: {}", event.name(), e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write audit log {}: {}", self.path.display(), e);
        }
    }

    /// Most recent event recorded for `cache_dir`, if any
    ///
    /// Reads the history even when recording is disabled, so older entries
    /// stay visible. Lines that do not parse are skipped.
    pub async fn last_for(&self, cache_dir: &Path) -> Option<AuditEntry> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read audit log {}: {}", self.path.display(), e);
                return None;
            }
        };

        content
            .lines()
            .rev()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<AuditEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping unreadable audit line: {}", e);
                    None
                }
            })
            .find(|entry| entry.concerns(cache_dir))
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}
