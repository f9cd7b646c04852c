//! Artifact discovery and shadow staging
//!
//! Artifacts are copied into the cache under `<name>.new`. Live names are
//! never opened for writing here. Each shadow is written to a scratch file
//! in the cache directory and renamed onto its shadow name once synced, so
//! a reader promoting during a forced refresh only ever sees an old or a
//! new shadow, never a partial one.

use crate::cache::directory::{live_name_for, CacheDirectory, MARKER_NAME, STAGING_PREFIX};
use crate::error::{CacheError, CacheResult};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use std::io::Write;
use tracing::{debug, info, warn};

/// An artifact written to its shadow name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedArtifact {
    /// Live name the artifact will be promoted to
    pub name: String,
    /// Shadow file path inside the cache directory
    pub shadow: PathBuf,
    /// Bytes written
    pub size: u64,
    /// SHA256 of the contents (first 12 hex chars), for reporting only
    pub digest: String,
}

/// Find every artifact directly under the given subtrees of `root`
///
/// Any regular file counts, whatever its extension. Missing subtrees are
/// skipped. Returns files sorted by name within each subtree, subtrees in
/// the order given.
pub async fn discover(root: &Path, subtrees: &[PathBuf]) -> CacheResult<Vec<PathBuf>> {
    let mut artifacts = Vec::new();
    let mut seen = HashSet::new();

    for subtree in subtrees {
        let dir = root.join(subtree);
        if !fs::metadata(&dir).await.is_ok_and(|m| m.is_dir()) {
            warn!("Bundle has no {} directory, skipping", subtree.display());
            continue;
        }

        let mut found = Vec::new();
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| CacheError::io(format!("reading {}", dir.display()), e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::io(format!("reading entry in {}", dir.display()), e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                found.push(entry.path());
            }
        }
        found.sort();

        debug!("Found {} artifact(s) in {}", found.len(), subtree.display());
        for path in found {
            let name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
            if !seen.insert(name.clone()) {
                return Err(CacheError::bundle(
                    root,
                    format!(
                        "artifact name {} appears more than once",
                        name.to_string_lossy()
                    ),
                ));
            }
            artifacts.push(path);
        }
    }

    if artifacts.is_empty() {
        let listed: Vec<String> = subtrees.iter().map(|s| s.display().to_string()).collect();
        return Err(CacheError::bundle(
            root,
            format!("no artifacts under {}", listed.join(", ")),
        ));
    }

    Ok(artifacts)
}

/// Copy one artifact into the cache under its shadow name
///
/// Replaces any earlier shadow of the same name in one rename. The data is
/// synced before the rename. On failure the shadow name is left untouched
/// and the scratch file is removed.
pub async fn stage(source: &Path, cache: &CacheDirectory) -> CacheResult<StagedArtifact> {
    let name = source
        .file_name()
        .ok_or_else(|| CacheError::ArtifactRejected {
            artifact: source.to_path_buf(),
            reason: "path has no file name".to_string(),
        })?;

    if name == MARKER_NAME {
        return Err(CacheError::ArtifactRejected {
            artifact: source.to_path_buf(),
            reason: "name collides with the update marker".to_string(),
        });
    }
    if live_name_for(name).is_some() {
        return Err(CacheError::ArtifactRejected {
            artifact: source.to_path_buf(),
            reason: "name already carries the shadow suffix".to_string(),
        });
    }

    let shadow = cache.shadow_path(name);
    let contents = copy_to_shadow(source, cache.path(), &shadow)
        .await
        .map_err(|e| CacheError::Staging {
            artifact: source.to_path_buf(),
            source: e,
        })?;

    let artifact = StagedArtifact {
        name: name.to_string_lossy().into_owned(),
        shadow,
        size: contents.len() as u64,
        digest: short_digest(&contents),
    };
    info!("Staged {} ({} bytes)", artifact.name, artifact.size);
    Ok(artifact)
}

/// Stage artifacts in order, stopping at the first failure
pub async fn stage_all(
    sources: &[PathBuf],
    cache: &CacheDirectory,
) -> CacheResult<Vec<StagedArtifact>> {
    let mut staged = Vec::with_capacity(sources.len());
    for source in sources {
        staged.push(stage(source, cache).await?);
    }
    Ok(staged)
}

/// Remove shadow files left by earlier cycles that this cycle will not rewrite
///
/// Keeps the pending generation to exactly one bundle: after staging, the
/// shadow set matches the new bundle instead of a merge of old and new.
pub async fn prune_stale_shadows(
    sources: &[PathBuf],
    cache: &CacheDirectory,
) -> CacheResult<Vec<PathBuf>> {
    let keep: HashSet<_> = sources
        .iter()
        .filter_map(|s| s.file_name())
        .map(|name| cache.shadow_path(name))
        .collect();

    let mut removed = Vec::new();
    for shadow in cache.shadow_files().await? {
        if keep.contains(&shadow) {
            continue;
        }
        match fs::remove_file(&shadow).await {
            Ok(()) => {
                debug!("Removed stale shadow {}", shadow.display());
                removed.push(shadow);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(CacheError::Staging {
                    artifact: shadow,
                    source,
                })
            }
        }
    }

    if !removed.is_empty() {
        info!("Removed {} stale shadow file(s)", removed.len());
    }
    Ok(removed)
}

async fn copy_to_shadow(source: &Path, dir: &Path, shadow: &Path) -> std::io::Result<Vec<u8>> {
    let contents = fs::read(source).await?;
    let dir = dir.to_path_buf();
    let shadow = shadow.to_path_buf();

    tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        // Scratch files default to 0600; readers may run as another user
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o644));
        }
        let mut scratch = builder.tempfile_in(&dir)?;
        scratch.write_all(&contents)?;
        scratch.as_file().sync_all()?;
        // Dropping the PersistError removes the scratch file
        scratch.persist(&shadow).map_err(|e| e.error)?;
        Ok(contents)
    })
    .await
    .map_err(std::io::Error::other)?
}

fn short_digest(contents: &[u8]) -> String {
    let digest = Sha256::digest(contents);
    hex::encode(&digest[..6])
}
