//! Archive sources: format dispatch, resolvers, and the URL cache.

pub mod source;
pub mod tar;
pub mod url_cache;

use anyhow::Result;

use crate::util::config::NetConfig;
use crate::util::GlobalContext;

pub use source::{ArchiveSet, ArchiveSource, EnsureOptions, UnsupportedFormatError};
pub use tar::TarballSource;
pub use url_cache::{CachedFetch, UrlCache};

/// Build the default resolver set: the tarball source backed by the URL
/// cache under the context's home.
pub fn default_archive_set(ctx: &GlobalContext, net: &NetConfig) -> Result<ArchiveSet> {
    let urls = UrlCache::new(ctx.url_cache_dir(), net.clone())?;

    let mut set = ArchiveSet::new();
    set.register(Box::new(TarballSource::new(urls)));
    Ok(set)
}
