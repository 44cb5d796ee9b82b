//! The build cache store.
//!
//! Maps locators to directories under the install-cache root. Each entry
//! holds one unpacked-and-built source tree and persists indefinitely;
//! nothing here evicts. A failed build removes its own entry so a later
//! run starts clean.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::core::Locator;

/// Handle to the on-disk build cache store.
#[derive(Debug, Clone)]
pub struct BuildCache {
    root: PathBuf,
}

/// Snapshot of one locator's cache slot.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Absolute directory for the locator's build output.
    pub path: PathBuf,

    /// Whether the directory existed when the snapshot was taken. A
    /// missing entry invalidates any "unchanged" answer from a resolver.
    pub existed: bool,
}

impl BuildCache {
    /// Create a handle rooted at `root`. No I/O happens here.
    pub fn new(root: PathBuf) -> Self {
        BuildCache { root }
    }

    /// The install-cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute cache directory for a locator. Pure; nothing is created.
    pub fn path_for(&self, locator: &Locator) -> Result<PathBuf> {
        let key = locator.cache_key();
        if key.as_os_str().is_empty() {
            bail!("locator `{}` does not yield a usable cache key", locator);
        }
        Ok(self.root.join(key))
    }

    /// Take a snapshot of the locator's entry: its path plus whether the
    /// directory exists at this moment.
    pub fn entry(&self, locator: &Locator) -> Result<CacheEntry> {
        let path = self.path_for(locator)?;
        let existed = path.exists();
        Ok(CacheEntry { path, existed })
    }
}
