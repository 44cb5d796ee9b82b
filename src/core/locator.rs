//! Package locators and cache-key derivation.

use std::fmt;
use std::path::PathBuf;

/// An opaque string identifying a package source, typically a URL ending
/// in an archive suffix (`http://example.com/pkg-1.0.tar.gz`).
///
/// The locator doubles as the durable cache key: [`Locator::cache_key`]
/// maps it to a stable relative path inside the build cache store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator(String);

impl Locator {
    /// Wrap a locator string.
    pub fn new(locator: impl Into<String>) -> Self {
        Locator(locator.into())
    }

    /// The raw locator string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the relative cache path for this locator.
    ///
    /// Each of `:`, `@` and `#` becomes a path separator, runs of
    /// separators collapse to one, and the remaining components are
    /// joined relative to the cache root. Empty, `.` and `..` components
    /// are discarded so the key can never point outside the root.
    ///
    /// The mapping is pure and stable across runs: the same locator
    /// always lands in the same directory. Distinct locators are kept
    /// apart on a best-effort basis, not cryptographically.
    pub fn cache_key(&self) -> PathBuf {
        let normalized: String = self
            .0
            .chars()
            .map(|c| match c {
                ':' | '@' | '#' => '/',
                c => c,
            })
            .collect();

        let mut key = PathBuf::new();
        for component in normalized.split('/') {
            if component.is_empty() || component == "." || component == ".." {
                continue;
            }
            key.push(component);
        }
        key
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        Locator::new(s)
    }
}

impl From<String> for Locator {
    fn from(s: String) -> Self {
        Locator::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_cache_key_replaces_delimiters() {
        let locator = Locator::new("http://example.com/pkg-1.0.tar.gz");
        assert_eq!(
            locator.cache_key(),
            Path::new("http/example.com/pkg-1.0.tar.gz")
        );
    }

    #[test]
    fn test_cache_key_collapses_separator_runs() {
        // `://` produces `:` then `//`; both collapse into single steps.
        let locator = Locator::new("git@github.com:owner/repo#v1.2.tgz");
        assert_eq!(
            locator.cache_key(),
            Path::new("git/github.com/owner/repo/v1.2.tgz")
        );
    }

    #[test]
    fn test_cache_key_plain_string() {
        let locator = Locator::new("plain-name.tar.gz");
        assert_eq!(locator.cache_key(), Path::new("plain-name.tar.gz"));
    }

    #[test]
    fn test_cache_key_deterministic() {
        let locator = Locator::new("http://example.com/a@2.0.tar.gz");
        assert_eq!(locator.cache_key(), locator.cache_key());
    }

    #[test]
    fn test_cache_key_distinct_locators_differ() {
        let a = Locator::new("http://example.com/pkg-1.0.tar.gz");
        let b = Locator::new("http://example.com/pkg-1.1.tar.gz");
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_cache_key_discards_traversal_components() {
        let locator = Locator::new("http://example.com/../../etc/pkg.tar.gz");
        assert_eq!(
            locator.cache_key(),
            Path::new("http/example.com/etc/pkg.tar.gz")
        );
    }

    #[test]
    fn test_cache_key_empty_for_delimiter_only_input() {
        let locator = Locator::new(":@#//.");
        assert_eq!(locator.cache_key(), PathBuf::new());
    }
}
