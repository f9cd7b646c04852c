//! CLI command implementations

pub mod config;
pub mod promote;
pub mod status;
pub mod update;

pub use config::execute as config;
pub use promote::execute as promote;
pub use status::execute as status;
pub use update::execute as update;

use crate::cache::CacheDirectory;
use crate::cli::args::CacheDirArg;
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use tracing::debug;

/// Resolve and open the cache directory from the flag or the config
pub(crate) async fn open_cache(arg: &CacheDirArg, config: &Config) -> CacheResult<CacheDirectory> {
    let path = arg
        .cache_dir
        .clone()
        .or_else(|| config.cache.dir.clone())
        .ok_or(CacheError::CacheDirRequired)?;

    debug!("Using cache directory {}", path.display());
    CacheDirectory::open(path).await
}
