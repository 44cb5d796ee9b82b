//! ArchiveSource trait - common interface for archive-format resolvers.

use std::path::Path;

use anyhow::Result;
use thiserror::Error;

use crate::cache::CacheEntry;
use crate::core::{Freshness, Locator};

/// Options passed through to a resolver's `ensure` call.
#[derive(Debug, Clone, Default)]
pub struct EnsureOptions {
    /// Refetch and repopulate even when the cached copy looks current.
    pub force: bool,
}

/// The locator matches no registered archive format.
#[derive(Debug, Error)]
#[error("unsupported archive type for `{locator}`")]
pub struct UnsupportedFormatError {
    pub locator: String,
}

/// A resolver for one archive format.
///
/// Given a locator it recognizes, an implementation populates or
/// validates the locator's cache directory and reports whether the
/// content changed. It must not overwrite existing content unless the
/// content is stale or `force` is set.
pub trait ArchiveSource {
    /// Get the source name for display.
    fn name(&self) -> &str;

    /// Check if this source recognizes the locator's format.
    fn supports(&self, locator: &Locator) -> bool;

    /// Populate or validate `cache_dir` for the locator.
    fn ensure(
        &mut self,
        locator: &Locator,
        cache_dir: &Path,
        opts: &EnsureOptions,
    ) -> Result<Freshness>;
}

/// Registered archive resolvers, tried in registration order.
#[derive(Default)]
pub struct ArchiveSet {
    sources: Vec<Box<dyn ArchiveSource>>,
}

impl ArchiveSet {
    /// Create an empty set.
    pub fn new() -> Self {
        ArchiveSet {
            sources: Vec::new(),
        }
    }

    /// Register a resolver.
    pub fn register(&mut self, source: Box<dyn ArchiveSource>) {
        self.sources.push(source);
    }

    /// Check whether any registered resolver recognizes the locator.
    pub fn supports(&self, locator: &Locator) -> bool {
        self.sources.iter().any(|s| s.supports(locator))
    }

    /// Dispatch resolution for a locator against its cache entry.
    ///
    /// Fails with [`UnsupportedFormatError`] before touching anything
    /// when no resolver matches. A reported `Unchanged` is upgraded to
    /// `Fetched` when the cache directory did not exist at snapshot
    /// time: "not modified" against an empty cache is meaningless and a
    /// build must happen.
    pub fn resolve(
        &mut self,
        locator: &Locator,
        entry: &CacheEntry,
        opts: &EnsureOptions,
    ) -> Result<Freshness> {
        let source = self
            .sources
            .iter_mut()
            .find(|s| s.supports(locator))
            .ok_or_else(|| UnsupportedFormatError {
                locator: locator.to_string(),
            })?;

        tracing::debug!("resolving {} via {} source", locator, source.name());
        let status = source.ensure(locator, &entry.path, opts)?;

        if entry.existed {
            Ok(status)
        } else {
            Ok(Freshness::Fetched)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct FixtureSource {
        report: Freshness,
    }

    impl ArchiveSource for FixtureSource {
        fn name(&self) -> &str {
            "fixture"
        }

        fn supports(&self, locator: &Locator) -> bool {
            locator.as_str().ends_with(".tar.gz")
        }

        fn ensure(
            &mut self,
            _locator: &Locator,
            cache_dir: &Path,
            _opts: &EnsureOptions,
        ) -> Result<Freshness> {
            fs::create_dir_all(cache_dir)?;
            Ok(self.report)
        }
    }

    fn entry_for(dir: &Path) -> CacheEntry {
        CacheEntry {
            path: dir.to_path_buf(),
            existed: dir.exists(),
        }
    }

    #[test]
    fn test_resolve_unsupported_format() {
        let tmp = TempDir::new().unwrap();
        let mut set = ArchiveSet::new();
        set.register(Box::new(FixtureSource {
            report: Freshness::Fetched,
        }));

        let locator = Locator::new("http://example.com/pkg.zip");
        let cache_dir = tmp.path().join("entry");
        let err = set
            .resolve(&locator, &entry_for(&cache_dir), &EnsureOptions::default())
            .unwrap_err();

        assert!(err.downcast_ref::<UnsupportedFormatError>().is_some());
        assert!(!cache_dir.exists());
    }

    #[test]
    fn test_resolve_forces_fetched_for_new_entry() {
        let tmp = TempDir::new().unwrap();
        let mut set = ArchiveSet::new();
        set.register(Box::new(FixtureSource {
            report: Freshness::Unchanged,
        }));

        let locator = Locator::new("http://example.com/pkg.tar.gz");
        let cache_dir = tmp.path().join("entry");

        let status = set
            .resolve(&locator, &entry_for(&cache_dir), &EnsureOptions::default())
            .unwrap();
        assert_eq!(status, Freshness::Fetched);
    }

    #[test]
    fn test_resolve_passes_through_for_existing_entry() {
        let tmp = TempDir::new().unwrap();
        let mut set = ArchiveSet::new();
        set.register(Box::new(FixtureSource {
            report: Freshness::Unchanged,
        }));

        let locator = Locator::new("http://example.com/pkg.tar.gz");
        let cache_dir = tmp.path().join("entry");
        fs::create_dir_all(&cache_dir).unwrap();

        let status = set
            .resolve(&locator, &entry_for(&cache_dir), &EnsureOptions::default())
            .unwrap();
        assert_eq!(status, Freshness::Unchanged);
    }

    #[test]
    fn test_supports_consults_all_sources() {
        let mut set = ArchiveSet::new();
        assert!(!set.supports(&Locator::new("pkg.tar.gz")));

        set.register(Box::new(FixtureSource {
            report: Freshness::Fetched,
        }));
        assert!(set.supports(&Locator::new("pkg.tar.gz")));
        assert!(!set.supports(&Locator::new("pkg.zip")));
    }
}
