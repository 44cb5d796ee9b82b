//! URL content cache with conditional revalidation.
//!
//! Downloaded archives live flat under the url-cache root, named after
//! the sanitized URL plus a short hash, with a JSON sidecar recording
//! the validators (`ETag`, `Last-Modified`) and the archive checksum.
//! A later fetch of the same URL revalidates with a conditional GET:
//! HTTP 304 reuses the cached file, HTTP 200 replaces it atomically.
//! Cached copies are checksummed before reuse; a corrupt file is
//! treated as a miss rather than served.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::Freshness;
use crate::util::config::NetConfig;
use crate::util::fs::{ensure_dir, write_string};
use crate::util::hash::{sha256_file, sha256_str};

/// A fetch result: where the archive lives and whether it changed.
#[derive(Debug)]
pub struct CachedFetch {
    pub path: PathBuf,
    pub freshness: Freshness,
}

/// Sidecar metadata stored next to each cached archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FetchMeta {
    url: String,

    #[serde(default)]
    etag: Option<String>,

    #[serde(default)]
    last_modified: Option<String>,

    sha256: String,

    fetched_at: u64,
}

/// Content cache keyed by URL.
#[derive(Debug)]
pub struct UrlCache {
    root: PathBuf,
    net: NetConfig,
    client: reqwest::blocking::Client,
}

impl UrlCache {
    /// Create a cache rooted at `root`.
    pub fn new(root: PathBuf, net: NetConfig) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(secs) = net.timeout {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("failed to build HTTP client")?;

        Ok(UrlCache { root, net, client })
    }

    /// The url-cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fetch `url`, revalidating any cached copy.
    pub fn fetch(&self, url: &str) -> Result<CachedFetch> {
        let archive_path = self.archive_path(url)?;
        let meta_path = meta_path_for(&archive_path);
        let cached = load_valid_meta(&archive_path, &meta_path);

        if self.net.offline {
            if cached.is_some() {
                tracing::debug!("offline: using cached copy of {}", url);
                return Ok(CachedFetch {
                    path: archive_path,
                    freshness: Freshness::Unchanged,
                });
            }
            bail!("offline mode is enabled and {} is not cached", url);
        }

        let mut request = self.client.get(url);
        if let Some(meta) = &cached {
            if let Some(etag) = &meta.etag {
                request = request.header(reqwest::header::IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = &meta.last_modified {
                request = request.header(reqwest::header::IF_MODIFIED_SINCE, last_modified);
            }
        }

        let response = match request.send() {
            Ok(response) => response,
            Err(e) if cached.is_some() => {
                tracing::warn!("network error fetching {}: {}; using cached copy", url, e);
                return Ok(CachedFetch {
                    path: archive_path,
                    freshness: Freshness::Unchanged,
                });
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to download {}", url));
            }
        };

        if response.status() == reqwest::StatusCode::NOT_MODIFIED {
            tracing::debug!("{} not modified", url);
            return Ok(CachedFetch {
                path: archive_path,
                freshness: Freshness::Unchanged,
            });
        }

        if !response.status().is_success() {
            bail!("failed to download {}: HTTP {}", url, response.status());
        }

        tracing::info!("Fetching {}", url);

        let etag = header_string(&response, reqwest::header::ETAG);
        let last_modified = header_string(&response, reqwest::header::LAST_MODIFIED);

        // The cached copy is replaced atomically, so it survives a transfer
        // that dies mid-body and can still be served.
        if let Err(e) = self.download(url, response, &archive_path) {
            if cached.is_some() {
                tracing::warn!("failed to download {}: {:#}; using cached copy", url, e);
                return Ok(CachedFetch {
                    path: archive_path,
                    freshness: Freshness::Unchanged,
                });
            }
            return Err(e);
        }
        let sha256 = sha256_file(&archive_path)?;

        let meta = FetchMeta {
            url: url.to_string(),
            etag,
            last_modified,
            sha256,
            fetched_at: unix_now(),
        };
        let contents =
            serde_json::to_string_pretty(&meta).context("failed to serialize fetch metadata")?;
        write_string(&meta_path, &contents)?;

        Ok(CachedFetch {
            path: archive_path,
            freshness: Freshness::Fetched,
        })
    }

    /// Stream the response body into place, replacing any previous copy
    /// atomically.
    fn download(
        &self,
        url: &str,
        response: reqwest::blocking::Response,
        dest: &Path,
    ) -> Result<()> {
        ensure_dir(&self.root)?;

        let pb = download_progress(response.content_length());
        pb.set_message(url.to_string());

        let mut file = tempfile::NamedTempFile::new_in(&self.root)
            .with_context(|| format!("failed to create temp file in {}", self.root.display()))?;

        let mut reader = pb.wrap_read(response);
        io::copy(&mut reader, &mut file)
            .with_context(|| format!("failed to download {}", url))?;
        pb.finish_and_clear();

        file.persist(dest)
            .with_context(|| format!("failed to move download into {}", dest.display()))?;

        Ok(())
    }

    /// Cache file path for a URL: sanitized name plus a short hash of the
    /// full URL to keep distinct URLs with similar names apart.
    fn archive_path(&self, url: &str) -> Result<PathBuf> {
        let parsed = Url::parse(url).with_context(|| format!("invalid url: {}", url))?;
        let name = format!(
            "{}-{}",
            sanitize_url_for_path(&parsed),
            &sha256_str(url)[..8]
        );
        Ok(self.root.join(name))
    }
}

/// Load the sidecar for a cached archive, discarding it when the archive
/// is missing or fails its recorded checksum.
fn load_valid_meta(archive: &Path, meta_path: &Path) -> Option<FetchMeta> {
    if !archive.is_file() || !meta_path.is_file() {
        return None;
    }

    let contents = fs::read_to_string(meta_path).ok()?;
    let meta: FetchMeta = serde_json::from_str(&contents).ok()?;

    match sha256_file(archive) {
        Ok(actual) if actual == meta.sha256 => Some(meta),
        _ => {
            tracing::warn!(
                "cached archive {} failed its checksum, refetching",
                archive.display()
            );
            None
        }
    }
}

/// Sanitize a URL for use as a file name.
fn sanitize_url_for_path(url: &Url) -> String {
    let mut name = String::new();

    if let Some(host) = url.host_str() {
        name.push_str(host);
    }

    let path = url.path().trim_matches('/');
    if !path.is_empty() {
        name.push('-');
        name.push_str(&path.replace('/', "-"));
    }

    name
}

fn meta_path_for(archive: &Path) -> PathBuf {
    let mut name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".meta.json");
    archive.with_file_name(name)
}

fn header_string(
    response: &reqwest::blocking::Response,
    name: reqwest::header::HeaderName,
) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn download_progress(len: Option<u64>) -> ProgressBar {
    match len {
        Some(len) => {
            let pb = ProgressBar::new(len);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg} {bytes}")
                    .unwrap(),
            );
            pb
        }
    }
}
