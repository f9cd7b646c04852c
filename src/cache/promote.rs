//! Reader-side promotion of staged artifacts
//!
//! Readers call this when they see the marker: every shadow file is renamed
//! over its live name, then the marker is removed. Each rename replaces the
//! live file atomically, so a reader opening a live name sees either the old
//! or the new contents, never a mix.

use crate::cache::directory::{live_name_for, CacheDirectory};
use crate::cache::signal;
use crate::error::{CacheError, CacheResult};
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info};

/// Result of a promotion attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Promotion {
    /// No marker, nothing was touched
    NothingPending,
    /// Shadows were promoted and the marker cleared
    Promoted { live: Vec<PathBuf> },
}

/// Promote all shadow files if the marker is present
pub async fn promote(cache: &CacheDirectory) -> CacheResult<Promotion> {
    if !signal::inspect(cache).await?.present {
        debug!("No marker in {}, nothing to promote", cache.path().display());
        return Ok(Promotion::NothingPending);
    }

    let mut live = Vec::new();
    for shadow in cache.shadow_files().await? {
        let Some(name) = shadow.file_name().and_then(live_name_for) else {
            continue;
        };
        let target = cache.live_path(&name);

        match fs::rename(&shadow, &target).await {
            Ok(()) => {}
            // A forced refresh pruned it between listing and rename
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(source) => return Err(CacheError::Promotion { shadow, source }),
        }
        debug!("Promoted {} -> {}", shadow.display(), target.display());
        live.push(target);
    }

    let marker = cache.marker_path();
    fs::remove_file(&marker)
        .await
        .map_err(|source| CacheError::Promotion {
            shadow: marker.clone(),
            source,
        })?;

    info!(
        "Promoted {} artifact(s) in {}",
        live.len(),
        cache.path().display()
    );
    Ok(Promotion::Promoted { live })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::directory::MARKER_NAME;
    use tempfile::TempDir;

    #[tokio::test]
    async fn no_marker_leaves_shadows() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.cer"), b"old").unwrap();
        std::fs::write(dir.path().join("a.cer.new"), b"new").unwrap();
        let cache = CacheDirectory::open(dir.path()).await.unwrap();

        let result = promote(&cache).await.unwrap();

        assert_eq!(result, Promotion::NothingPending);
        assert_eq!(std::fs::read(dir.path().join("a.cer")).unwrap(), b"old");
        assert!(dir.path().join("a.cer.new").exists());
    }

    #[tokio::test]
    async fn promotes_and_clears_marker() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.cer"), b"old").unwrap();
        std::fs::write(dir.path().join("a.cer.new"), b"new").unwrap();
        std::fs::write(dir.path().join("b.crl.new"), b"crl").unwrap();
        std::fs::write(dir.path().join(MARKER_NAME), b"").unwrap();
        let cache = CacheDirectory::open(dir.path()).await.unwrap();

        let result = promote(&cache).await.unwrap();

        match result {
            Promotion::Promoted { live } => assert_eq!(live.len(), 2),
            other => panic!("expected Promoted, got {:?}", other),
        }
        let snapshot = cache.snapshot().await.unwrap();
        assert_eq!(snapshot.live, vec!["a.cer", "b.crl"]);
        assert!(snapshot.shadow.is_empty());
        assert!(!snapshot.marker);
        assert_eq!(std::fs::read(dir.path().join("a.cer")).unwrap(), b"new");
    }
}
