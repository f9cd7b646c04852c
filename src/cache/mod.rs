//! On-disk artifact cache shared by one writer and many readers
//!
//! Live files are what readers consume. A refresh writes replacements next
//! to them as shadow files and then creates the marker. Readers that see the
//! marker promote every shadow over its live name and delete the marker.
//!
//! # Directory Layout
//!
//! | Entry | Owner | Description |
//! |-------|-------|-------------|
//! | `<name>` | reader | Live artifact, never written by a refresh |
//! | `<name>.new` | writer | Shadow artifact, waiting for promotion |
//! | `cache_updated` | writer creates, reader deletes | Zero-byte marker |

pub mod directory;
pub mod promote;
pub mod signal;
pub mod stager;

pub use directory::{CacheDirectory, CacheSnapshot, MARKER_NAME, SHADOW_SUFFIX};
pub use promote::{promote, Promotion};
pub use signal::{MarkerState, Preflight};
pub use stager::StagedArtifact;
