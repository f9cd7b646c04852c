//! Bundle retrieval
//!
//! A `BundleSource` downloads the artifact bundle into the refresh cycle's
//! transient workspace. The concrete transport is picked from the source
//! URL scheme.

pub mod archive;
pub mod file;
pub mod http;

pub use archive::{extract, BundleFormat};
pub use file::FileSource;
pub use http::HttpSource;

use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default public location of the OnDie CA bundle
pub const DEFAULT_SOURCE_URL: &str = "https://tsci.intel.com/content/csme.zip";

/// Abstract bundle transport
///
/// Implementations write the bundle into `dest_dir` and return the path of
/// the downloaded file. They must not touch anything outside `dest_dir`.
#[async_trait]
pub trait BundleSource: Send + Sync {
    /// Download the bundle into `dest_dir`
    async fn fetch(&self, dest_dir: &Path) -> CacheResult<PathBuf>;

    /// Human-readable location for logs and reports
    fn location(&self) -> String;
}

/// Transport selected for a source URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `http://` or `https://`
    Http,
    /// `file://` URL or a plain filesystem path
    File,
}

impl SourceKind {
    /// Detect the transport for a URL
    pub fn detect(url: &str) -> CacheResult<Self> {
        let lower = url.to_ascii_lowercase();
        if lower.starts_with("https://") || lower.starts_with("http://") {
            Ok(Self::Http)
        } else if lower.starts_with("file://") || !lower.contains("://") {
            Ok(Self::File)
        } else {
            Err(CacheError::SourceInvalid(url.to_string()))
        }
    }
}

/// Create the bundle source for a URL
///
/// # Arguments
/// * `url` - `http(s)://`, `file://` or a plain path
/// * `timeout` - overall transfer timeout for network sources, `None` to wait forever
pub fn create_source(url: &str, timeout: Option<Duration>) -> CacheResult<Box<dyn BundleSource>> {
    if url.trim().is_empty() {
        return Err(CacheError::SourceInvalid("empty source URL".to_string()));
    }

    match SourceKind::detect(url)? {
        SourceKind::Http => Ok(Box::new(HttpSource::new(url, timeout))),
        SourceKind::File => Ok(Box::new(FileSource::from_url(url))),
    }
}

/// File name to store a bundle under, taken from the last URL segment
pub(crate) fn bundle_file_name(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|u| u.rsplit(['/', '\\']).next())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or("bundle")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_kinds() {
        assert_eq!(
            SourceKind::detect("https://tsci.intel.com/content/csme.zip").unwrap(),
            SourceKind::Http
        );
        assert_eq!(SourceKind::detect("HTTP://host/b.zip").unwrap(), SourceKind::Http);
        assert_eq!(SourceKind::detect("file:///srv/b.zip").unwrap(), SourceKind::File);
        assert_eq!(SourceKind::detect("/srv/b.zip").unwrap(), SourceKind::File);
        assert!(SourceKind::detect("ftp://host/b.zip").is_err());
    }

    #[test]
    fn create_source_rejects_empty() {
        assert!(matches!(
            create_source("  ", None),
            Err(CacheError::SourceInvalid(_))
        ));
    }

    #[test]
    fn create_source_describes_location() {
        let source = create_source(DEFAULT_SOURCE_URL, Some(Duration::from_secs(5))).unwrap();
        assert_eq!(source.location(), DEFAULT_SOURCE_URL);
    }

    #[test]
    fn bundle_names() {
        assert_eq!(bundle_file_name("https://h/content/csme.zip"), "csme.zip");
        assert_eq!(bundle_file_name("https://h/csme.zip?x=1"), "csme.zip");
        assert_eq!(bundle_file_name("https://h/"), "bundle");
        assert_eq!(bundle_file_name("/srv/mirror/b.tar.gz"), "b.tar.gz");
    }
}
