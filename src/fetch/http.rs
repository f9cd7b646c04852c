//! HTTP(S) bundle transport

use crate::error::{CacheError, CacheResult};
use crate::fetch::{bundle_file_name, BundleSource};
use async_trait::async_trait;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Downloads the bundle with a blocking HTTP client on the blocking pool
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: String,
    timeout: Option<Duration>,
}

impl HttpSource {
    /// Create a source for `url`; `timeout` bounds the whole transfer
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    fn download(&self, dest: &Path) -> CacheResult<u64> {
        let config = ureq::Agent::config_builder()
            .timeout_global(self.timeout)
            .build();
        let agent: ureq::Agent = config.into();

        debug!("GET {}", self.url);
        let mut response = agent
            .get(&self.url)
            .call()
            .map_err(|e| CacheError::transport(&self.url, e))?;

        let mut file = File::create(dest)
            .map_err(|e| CacheError::io(format!("creating {}", dest.display()), e))?;
        let mut reader = response.body_mut().as_reader();
        let written =
            io::copy(&mut reader, &mut file).map_err(|e| CacheError::transport(&self.url, e))?;
        file.flush()
            .map_err(|e| CacheError::io(format!("writing {}", dest.display()), e))?;

        Ok(written)
    }
}

#[async_trait]
impl BundleSource for HttpSource {
    async fn fetch(&self, dest_dir: &Path) -> CacheResult<PathBuf> {
        let dest = dest_dir.join(bundle_file_name(&self.url));
        let source = self.clone();
        let target = dest.clone();

        let written = tokio::task::spawn_blocking(move || source.download(&target))
            .await
            .map_err(|e| CacheError::Internal(format!("download task failed: {}", e)))??;

        info!("Downloaded {} bytes from {}", written, self.url);
        Ok(dest)
    }

    fn location(&self) -> String {
        self.url.clone()
    }
}
