//! Update marker lifecycle
//!
//! The writer checks the marker before a refresh and creates it once every
//! shadow file is on disk. Only the reader removes it. The marker is an
//! advisory signal: two writers racing past `preflight` are not prevented.

use crate::cache::directory::CacheDirectory;
use crate::error::{CacheError, CacheResult};
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, warn};

/// Observed state of the update marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerState {
    /// Whether the marker exists
    pub present: bool,
    /// Time since the marker was last written, if known
    pub age: Option<Duration>,
}

impl MarkerState {
    /// Whether the marker has been waiting longer than `threshold`
    pub fn is_stale(&self, threshold: Duration) -> bool {
        self.present && self.age.is_some_and(|age| age >= threshold)
    }
}

/// Outcome of the pre-flight check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preflight {
    /// No unconsumed update; a refresh may start
    Allow,
    /// An unconsumed update exists but `force` overrides the guard
    Override { marker_age: Option<Duration> },
    /// An unconsumed update exists
    Deny { reason: String, stale: bool },
}

/// Inspect the marker without changing anything
pub async fn inspect(cache: &CacheDirectory) -> CacheResult<MarkerState> {
    let path = cache.marker_path();
    match fs::metadata(&path).await {
        Ok(metadata) => {
            let age = metadata
                .modified()
                .ok()
                .map(|mtime| Utc::now() - DateTime::<Utc>::from(mtime));
            Ok(MarkerState { present: true, age })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(MarkerState {
            present: false,
            age: None,
        }),
        Err(e) => Err(CacheError::io(
            format!("inspecting marker {}", path.display()),
            e,
        )),
    }
}

/// Decide whether a refresh cycle may start
///
/// `stale_after` only changes the wording of a denial: a stale marker still
/// blocks unless `force` is set, but the caller is told why.
pub async fn preflight(
    cache: &CacheDirectory,
    force: bool,
    stale_after: Duration,
) -> CacheResult<Preflight> {
    let state = inspect(cache).await?;

    if !state.present {
        debug!("No pending update in {}", cache.path().display());
        return Ok(Preflight::Allow);
    }

    if force {
        warn!(
            "Overriding pending update in {} (marker age: {})",
            cache.path().display(),
            describe_age(state.age)
        );
        return Ok(Preflight::Override {
            marker_age: state.age,
        });
    }

    let stale = state.is_stale(stale_after);
    let mut reason = format!(
        "marker {} exists (age: {})",
        cache.marker_path().display(),
        describe_age(state.age)
    );
    if stale {
        reason.push_str(&format!(
            "; older than {}h, the reader may not be running",
            stale_after.num_hours()
        ));
    }

    Ok(Preflight::Deny { reason, stale })
}

/// Create the marker, signalling readers that a complete shadow set exists
///
/// Must only be called after every shadow file of the cycle has been
/// written and synced. On failure no marker is left behind.
pub async fn publish(cache: &CacheDirectory) -> CacheResult<PathBuf> {
    let path = cache.marker_path();

    if let Err(source) = create_marker(&path).await {
        if fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
            let _ = fs::remove_file(&path).await;
        }
        return Err(CacheError::Publish { path, source });
    }

    sync_dir(cache).await;
    debug!("Published marker {}", path.display());
    Ok(path)
}

async fn create_marker(path: &std::path::Path) -> std::io::Result<()> {
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .await?;
    file.sync_all().await
}

/// Flush the directory entry so the marker survives a crash (unix only)
async fn sync_dir(cache: &CacheDirectory) {
    #[cfg(unix)]
    {
        let result = match fs::File::open(cache.path()).await {
            Ok(dir) => dir.sync_all().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            debug!("Could not sync {}: {}", cache.path().display(), e);
        }
    }
    #[cfg(not(unix))]
    let _ = cache;
}

fn describe_age(age: Option<Duration>) -> String {
    match age {
        Some(age) if age.num_hours() > 0 => format!("{}h", age.num_hours()),
        Some(age) if age.num_minutes() > 0 => format!("{}m", age.num_minutes()),
        Some(age) => format!("{}s", age.num_seconds().max(0)),
        None => "unknown".to_string(),
    }
}
