//! Bundle extraction
//!
//! The published bundle is a zip; gzip'd tarballs are accepted for mirrors
//! that repackage it. The format is detected from the leading bytes, not
//! the file name. Entries that would land outside the destination are
//! skipped.

use crate::error::{CacheError, CacheResult};
use flate2::read::GzDecoder;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, warn};

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Supported bundle archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleFormat {
    /// PKZIP archive
    Zip,
    /// gzip-compressed tar archive
    TarGz,
}

impl BundleFormat {
    /// Detect the format from the first bytes of `path`
    pub fn detect(path: &Path) -> CacheResult<Self> {
        let mut header = [0u8; 4];
        let mut file = File::open(path)
            .map_err(|e| CacheError::io(format!("opening bundle {}", path.display()), e))?;
        let read = read_prefix(&mut file, &mut header)
            .map_err(|e| CacheError::io(format!("reading bundle {}", path.display()), e))?;

        if read == 4 && header == ZIP_MAGIC {
            Ok(Self::Zip)
        } else if read >= 2 && header[..2] == GZIP_MAGIC {
            Ok(Self::TarGz)
        } else {
            Err(CacheError::bundle(path, "not a zip or tar.gz archive"))
        }
    }
}

impl fmt::Display for BundleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zip => write!(f, "zip"),
            Self::TarGz => write!(f, "tar.gz"),
        }
    }
}

/// Extract `bundle` into `dest`, returning the number of files written
pub async fn extract(bundle: &Path, dest: &Path) -> CacheResult<usize> {
    let bundle = bundle.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || extract_blocking(&bundle, &dest))
        .await
        .map_err(|e| CacheError::Internal(format!("extraction task failed: {}", e)))?
}

fn extract_blocking(bundle: &Path, dest: &Path) -> CacheResult<usize> {
    let format = BundleFormat::detect(bundle)?;
    debug!("Extracting {} bundle {}", format, bundle.display());

    let count = match format {
        BundleFormat::Zip => extract_zip(bundle, dest)?,
        BundleFormat::TarGz => extract_tar_gz(bundle, dest)?,
    };

    debug!("Extracted {} file(s) into {}", count, dest.display());
    Ok(count)
}

fn extract_zip(bundle: &Path, dest: &Path) -> CacheResult<usize> {
    let file = File::open(bundle)
        .map_err(|e| CacheError::io(format!("opening bundle {}", bundle.display()), e))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| CacheError::bundle(bundle, e.to_string()))?;

    let mut count = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| CacheError::bundle(bundle, e.to_string()))?;

        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe zip entry {}", entry.name());
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| CacheError::io(format!("creating {}", target.display()), e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CacheError::io(format!("creating {}", parent.display()), e))?;
        }
        let mut out = File::create(&target)
            .map_err(|e| CacheError::io(format!("creating {}", target.display()), e))?;
        io::copy(&mut entry, &mut out).map_err(|e| CacheError::bundle(bundle, e.to_string()))?;
        count += 1;
    }

    Ok(count)
}

fn extract_tar_gz(bundle: &Path, dest: &Path) -> CacheResult<usize> {
    let file = File::open(bundle)
        .map_err(|e| CacheError::io(format!("opening bundle {}", bundle.display()), e))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let entries = archive
        .entries()
        .map_err(|e| CacheError::bundle(bundle, e.to_string()))?;

    let mut count = 0;
    for entry in entries {
        let mut entry = entry.map_err(|e| CacheError::bundle(bundle, e.to_string()))?;
        let kind = entry.header().entry_type();
        if !kind.is_file() && !kind.is_dir() {
            debug!("Skipping non-file tar entry");
            continue;
        }

        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| CacheError::bundle(bundle, e.to_string()))?;
        if !unpacked {
            warn!("Skipping unsafe tar entry in {}", bundle.display());
        } else if kind.is_file() {
            count += 1;
        }
    }

    Ok(count)
}

fn read_prefix(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
