//! Refresh cycle orchestration
//!
//! ```text
//! PREFLIGHT -> FETCHING -> STAGING -> PUBLISHING -> CLEANUP -> DONE
//!                  \___________\____________\_______/
//!                            (any failure) -> CLEANUP -> FAILED
//! ```
//!
//! A denied preflight fails before any I/O. Every later failure still runs
//! workspace cleanup before it is returned. The marker is only published
//! once every artifact has been staged.

use crate::cache::signal::{self, Preflight};
use crate::cache::stager::{self, StagedArtifact};
use crate::cache::CacheDirectory;
use crate::error::{CacheError, CacheResult};
use crate::fetch::{self, BundleSource};
use crate::refresh::workspace::{CleanupWarning, TransientWorkspace};
use chrono::Duration;
use std::fmt;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Directories inside the bundle that hold artifacts
pub const DEFAULT_SUBTREES: &[&str] = &["content/OnDieCA/certs", "content/OnDieCA/crls"];

/// Steps of a refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Preflight,
    Fetching,
    Staging,
    Publishing,
    Cleanup,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Preflight => "preflight",
            Self::Fetching => "fetching",
            Self::Staging => "staging",
            Self::Publishing => "publishing",
            Self::Cleanup => "cleanup",
            Self::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Knobs for one refresh cycle
#[derive(Debug, Clone)]
pub struct RefreshOptions {
    /// Start even if an unconsumed update is pending
    pub force: bool,
    /// Bundle directories to stage artifacts from
    pub subtrees: Vec<PathBuf>,
    /// Parent directory of the transient workspace
    pub work_dir: Option<PathBuf>,
    /// Marker age after which a denial is reported as stale
    pub stale_after: Duration,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            force: false,
            subtrees: DEFAULT_SUBTREES.iter().map(PathBuf::from).collect(),
            work_dir: None,
            stale_after: Duration::hours(24),
        }
    }
}

/// Outcome of a successful refresh cycle
#[derive(Debug, Clone)]
pub struct RefreshReport {
    /// Identifier used in logs and the audit history
    pub cycle_id: Uuid,
    /// Where the bundle came from
    pub source: String,
    /// Artifacts written to shadow names, in staging order
    pub staged: Vec<StagedArtifact>,
    /// The published marker
    pub marker: PathBuf,
    /// Whether a pending update was overridden with `force`
    pub overrode_pending: bool,
    /// Set when the workspace could not be fully removed
    pub cleanup_warning: Option<CleanupWarning>,
}

/// One end-to-end fetch, stage, publish and cleanup run
pub struct RefreshCycle<'a> {
    id: Uuid,
    cache: &'a CacheDirectory,
    source: &'a dyn BundleSource,
    options: RefreshOptions,
}

impl<'a> RefreshCycle<'a> {
    /// Prepare a cycle against `cache` using `source`
    pub fn new(
        cache: &'a CacheDirectory,
        source: &'a dyn BundleSource,
        options: RefreshOptions,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            cache,
            source,
            options,
        }
    }

    /// Cycle identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Run the cycle to completion
    pub async fn run(self) -> CacheResult<RefreshReport> {
        let span = info_span!("refresh", cycle = %self.id);
        self.run_phases().instrument(span).await
    }

    async fn run_phases(self) -> CacheResult<RefreshReport> {
        info!(
            "Refreshing {} from {}",
            self.cache.path().display(),
            self.source.location()
        );

        self.enter(Phase::Preflight);
        let preflight =
            signal::preflight(self.cache, self.options.force, self.options.stale_after).await?;
        let overrode_pending = match preflight {
            Preflight::Allow => false,
            Preflight::Override { .. } => true,
            Preflight::Deny { reason, stale } => {
                info!("Refresh skipped: {}", reason);
                return Err(CacheError::PendingUpdate { reason, stale });
            }
        };

        let workspace = TransientWorkspace::acquire(self.options.work_dir.as_deref())?;
        let outcome = self.fetch_stage_publish(&workspace).await;

        self.enter(Phase::Cleanup);
        let cleanup_warning = workspace.cleanup().err();
        if let Some(ref warning) = cleanup_warning {
            warn!("Cleanup incomplete: {}", warning);
        }

        let (staged, marker) = outcome?;
        self.enter(Phase::Done);
        info!("Refresh complete: {} artifact(s) staged", staged.len());

        Ok(RefreshReport {
            cycle_id: self.id,
            source: self.source.location(),
            staged,
            marker,
            overrode_pending,
            cleanup_warning,
        })
    }

    async fn fetch_stage_publish(
        &self,
        workspace: &TransientWorkspace,
    ) -> CacheResult<(Vec<StagedArtifact>, PathBuf)> {
        self.enter(Phase::Fetching);
        let artifacts = self
            .fetch_into(workspace)
            .await
            .map_err(|e| self.fail(Phase::Fetching, e))?;

        self.enter(Phase::Staging);
        stager::prune_stale_shadows(&artifacts, self.cache)
            .await
            .map_err(|e| self.fail(Phase::Staging, e))?;
        let staged = stager::stage_all(&artifacts, self.cache)
            .await
            .map_err(|e| self.fail(Phase::Staging, e))?;

        self.enter(Phase::Publishing);
        let marker = signal::publish(self.cache)
            .await
            .map_err(|e| self.fail(Phase::Publishing, e))?;

        Ok((staged, marker))
    }

    /// Download and unpack the bundle, then list the artifacts to stage
    async fn fetch_into(&self, workspace: &TransientWorkspace) -> CacheResult<Vec<PathBuf>> {
        let download_dir = workspace.download_dir();
        let extract_dir = workspace.extract_dir();
        for dir in [&download_dir, &extract_dir] {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| CacheError::io(format!("creating {}", dir.display()), e))?;
        }

        let bundle = self.source.fetch(&download_dir).await?;
        let extracted = fetch::extract(&bundle, &extract_dir).await?;
        debug!("Bundle held {} file(s)", extracted);

        stager::discover(&extract_dir, &self.options.subtrees).await
    }

    fn enter(&self, phase: Phase) {
        debug!(%phase, "Entering phase");
    }

    fn fail(&self, phase: Phase, err: CacheError) -> CacheError {
        error!(%phase, "Refresh failed: {}", err);
        err
    }
}
