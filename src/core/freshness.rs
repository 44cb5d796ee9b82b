//! Freshness signal for cached archive content.

use std::fmt;

/// Whether cached content changed on the last resolution.
///
/// Mirrors the HTTP pair this is usually derived from: `Fetched` is the
/// 200 case (new content, a rebuild is required), `Unchanged` is the 304
/// case (cached content still valid, reuse it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Content was fetched or changed; downstream steps must re-run.
    Fetched,

    /// Content is unchanged; cached results may be reused.
    Unchanged,
}

impl Freshness {
    /// True when the build step has to run for this status.
    pub fn requires_build(self) -> bool {
        matches!(self, Freshness::Fetched)
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Freshness::Fetched => f.write_str("fetched"),
            Freshness::Unchanged => f.write_str("unchanged"),
        }
    }
}
