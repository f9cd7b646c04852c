//! Refresh cycle: fetch a bundle, stage it as shadow files, publish the marker

pub mod cycle;
pub mod workspace;

pub use cycle::{Phase, RefreshCycle, RefreshOptions, RefreshReport, DEFAULT_SUBTREES};
pub use workspace::{CleanupWarning, TransientWorkspace};
