//! The install operation.
//!
//! Runs the full pipeline for one locator: derive its cache directory,
//! have an archive resolver populate or validate it, build inside it,
//! and promote the finished tree into the live install path. The whole
//! span runs under a per-locator advisory lock.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::builder::{BuildSteps, Builder};
use crate::cache::BuildCache;
use crate::core::{Freshness, Locator};
use crate::installer;
use crate::sources::{ArchiveSet, EnsureOptions, UnsupportedFormatError};
use crate::util::lock::CacheLock;
use crate::util::GlobalContext;

/// Options for an install run.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Promote the cached build even when the live path looks current.
    /// Does not refetch or rebuild an unchanged cache entry.
    pub force: bool,

    /// Stream build output live instead of buffering it.
    pub verbose: bool,

    /// Commands for the in-cache build.
    pub steps: BuildSteps,
}

/// What an install run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The live path now holds the (re)built tree.
    Installed {
        /// Where the previous install went, when there was one.
        backup: Option<PathBuf>,
    },

    /// Cache and live path were already current; nothing was touched.
    AlreadyCurrent,
}

/// Install `locator` into `live_path`.
///
/// Fails with [`UnsupportedFormatError`] before creating anything on
/// disk, lock file included, when no resolver recognizes the locator.
pub fn install(
    ctx: &GlobalContext,
    sources: &mut ArchiveSet,
    locator: &Locator,
    live_path: &Path,
    options: &InstallOptions,
) -> Result<InstallOutcome> {
    if !sources.supports(locator) {
        return Err(UnsupportedFormatError {
            locator: locator.to_string(),
        }
        .into());
    }

    let cache = BuildCache::new(ctx.install_cache_dir());
    let _guard = CacheLock::acquire(&ctx.locks_dir(), locator.as_str())?;

    let entry = cache.entry(locator)?;
    tracing::debug!("cache entry for {}: {}", locator, entry.path.display());

    let freshness = sources.resolve(locator, &entry, &EnsureOptions::default())?;
    tracing::info!("{} resolved as {}", locator, freshness);

    let builder = Builder::new(options.steps.clone(), options.verbose);
    builder.build(&entry.path, freshness)?;

    if !should_promote(freshness, live_path.exists(), options.force) {
        tracing::info!("{} is already installed at {}", locator, live_path.display());
        return Ok(InstallOutcome::AlreadyCurrent);
    }

    let backup = installer::promote(&entry.path, live_path)?;
    tracing::info!("Installed {} to {}", locator, live_path.display());

    Ok(InstallOutcome::Installed { backup })
}

/// Whether the live path must be refreshed from the cache.
pub fn should_promote(freshness: Freshness, live_exists: bool, force: bool) -> bool {
    freshness.requires_build() || !live_exists || force
}
