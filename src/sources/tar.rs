//! Tarball archive resolver.
//!
//! Handles the tar.gz family (`.tar.gz`, `.tgz`). Archives are fetched
//! through the URL cache and unpacked into the locator's cache
//! directory. When every entry in the archive sits under one leading
//! directory (the usual `pkg-1.0/` layout), that directory is stripped
//! so the cache entry is the package tree itself.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use regex::Regex;
use tar::Archive;

use crate::core::{Freshness, Locator};
use crate::sources::source::{ArchiveSource, EnsureOptions};
use crate::sources::url_cache::UrlCache;
use crate::util::fs::{ensure_dir, remove_dir_all_if_exists};

/// Locator suffixes handled by this resolver.
static TARBALL_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(tar\.gz|tgz)$").unwrap());

/// Archive resolver for gzip-compressed tarballs.
pub struct TarballSource {
    urls: UrlCache,
}

impl TarballSource {
    pub fn new(urls: UrlCache) -> Self {
        TarballSource { urls }
    }
}

impl ArchiveSource for TarballSource {
    fn name(&self) -> &str {
        "tarball"
    }

    fn supports(&self, locator: &Locator) -> bool {
        TARBALL_SUFFIX.is_match(locator.as_str())
    }

    fn ensure(
        &mut self,
        locator: &Locator,
        cache_dir: &Path,
        opts: &EnsureOptions,
    ) -> Result<Freshness> {
        let fetched = self.urls.fetch(locator.as_str())?;

        if fetched.freshness == Freshness::Unchanged && dir_is_populated(cache_dir) && !opts.force
        {
            tracing::debug!("cache entry for {} is current", locator);
            return Ok(Freshness::Unchanged);
        }

        refresh_entry(&fetched.path, cache_dir)
            .with_context(|| format!("failed to unpack {}", fetched.path.display()))?;

        tracing::info!("Unpacked {} into {}", locator, cache_dir.display());
        Ok(Freshness::Fetched)
    }
}

/// Replace `cache_dir` with a fresh unpack of `archive`. Stale content is
/// never merged into, and a failed unpack leaves no entry behind.
fn refresh_entry(archive: &Path, cache_dir: &Path) -> Result<()> {
    remove_dir_all_if_exists(cache_dir)?;
    ensure_dir(cache_dir)?;

    let strip = leading_dir(archive)?;
    if let Err(e) = extract_tarball(archive, cache_dir, strip.as_deref()) {
        // A partial unpack must not survive as a populated entry.
        if let Err(cleanup) = remove_dir_all_if_exists(cache_dir) {
            tracing::warn!("failed to clean up {}: {:#}", cache_dir.display(), cleanup);
        }
        return Err(e);
    }
    Ok(())
}

fn dir_is_populated(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Detect a single leading directory shared by every archive entry.
///
/// Returns `None` as soon as any entry lives at the top level as a file
/// or under a different first component.
fn leading_dir(archive: &Path) -> Result<Option<String>> {
    let file = File::open(archive)
        .with_context(|| format!("failed to open archive: {}", archive.display()))?;
    let mut ar = Archive::new(GzDecoder::new(BufReader::new(file)));

    let mut prefix: Option<String> = None;

    for entry in ar.entries().context("failed to read tarball entries")? {
        let entry = entry.context("failed to read tarball entry")?;
        let path = entry.path().context("failed to get entry path")?;

        let mut components = path.components();
        let first = match components.next() {
            Some(c) => c.as_os_str().to_string_lossy().into_owned(),
            None => continue,
        };
        let nested = components.next().is_some();

        match &prefix {
            None => {
                if !nested && !entry.header().entry_type().is_dir() {
                    return Ok(None);
                }
                prefix = Some(first);
            }
            Some(p) if *p == first => {}
            Some(_) => return Ok(None),
        }
    }

    Ok(prefix)
}

/// Extract a gzip-compressed tarball into `dest`.
///
/// If `strip_prefix` is given, that leading directory is removed from
/// every entry path. Entries that would resolve outside `dest` are
/// rejected.
pub fn extract_tarball(archive: &Path, dest: &Path, strip_prefix: Option<&str>) -> Result<()> {
    let file = File::open(archive)
        .with_context(|| format!("failed to open archive: {}", archive.display()))?;
    let mut ar = Archive::new(GzDecoder::new(BufReader::new(file)));

    fs::create_dir_all(dest)
        .with_context(|| format!("failed to create destination directory: {}", dest.display()))?;

    for entry in ar.entries().context("failed to read tarball entries")? {
        let mut entry = entry.context("failed to read tarball entry")?;
        let entry_path: PathBuf = entry.path().context("failed to get entry path")?.into_owned();

        let relative = match strip_prefix {
            Some(prefix) => match entry_path.strip_prefix(prefix) {
                // The prefix directory itself unpacks to nothing.
                Ok(rest) if rest.as_os_str().is_empty() => continue,
                Ok(rest) => rest.to_path_buf(),
                Err(_) => entry_path.clone(),
            },
            None => entry_path.clone(),
        };

        let escapes = relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if escapes {
            bail!(
                "tarball entry escapes destination directory: {}",
                entry_path.display()
            );
        }

        let output_path = dest.join(&relative);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }

        entry
            .unpack(&output_path)
            .with_context(|| format!("failed to extract: {}", output_path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn write_archive(path: &Path, entries: &[(&str, &str)]) {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for (entry_path, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, entry_path, contents.as_bytes())
                .unwrap();
        }

        let bytes = builder.into_inner().unwrap().finish().unwrap();
        fs::write(path, bytes).unwrap();
    }

    // Writes entry names byte for byte, bypassing `set_path`, which
    // refuses traversal names.
    fn write_archive_raw(path: &Path, entries: &[(&[u8], &str)]) {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for (name, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.as_gnu_mut().unwrap().name[..name.len()].copy_from_slice(name);
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, contents.as_bytes()).unwrap();
        }

        let bytes = builder.into_inner().unwrap().finish().unwrap();
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_supports_tarball_suffixes() {
        let urls = UrlCache::new(PathBuf::from("/tmp/none"), Default::default()).unwrap();
        let source = TarballSource::new(urls);

        assert!(source.supports(&Locator::new("http://example.com/pkg-1.0.tar.gz")));
        assert!(source.supports(&Locator::new("http://example.com/pkg.tgz")));
        assert!(!source.supports(&Locator::new("http://example.com/pkg.zip")));
        assert!(!source.supports(&Locator::new("http://example.com/pkg.tar.bz2")));
        assert!(!source.supports(&Locator::new("http://example.com/pkg.tar.gz#frag")));
    }

    #[test]
    fn test_leading_dir_detected() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("pkg.tar.gz");
        write_archive(
            &archive,
            &[
                ("pkg-1.0/configure", "#!/bin/sh\n"),
                ("pkg-1.0/src/main.c", "int main(){}"),
            ],
        );

        assert_eq!(leading_dir(&archive).unwrap(), Some("pkg-1.0".to_string()));
    }

    #[test]
    fn test_leading_dir_absent_for_flat_archive() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("pkg.tar.gz");
        write_archive(&archive, &[("README", "hi"), ("src/main.c", "int main(){}")]);

        assert_eq!(leading_dir(&archive).unwrap(), None);
    }

    #[test]
    fn test_leading_dir_absent_for_mixed_roots() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("pkg.tar.gz");
        write_archive(&archive, &[("a/x", "1"), ("b/y", "2")]);

        assert_eq!(leading_dir(&archive).unwrap(), None);
    }

    #[test]
    fn test_extract_with_strip() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("pkg.tar.gz");
        let dest = tmp.path().join("out");
        write_archive(
            &archive,
            &[
                ("pkg-1.0/configure", "#!/bin/sh\n"),
                ("pkg-1.0/src/main.c", "int main(){}"),
            ],
        );

        extract_tarball(&archive, &dest, Some("pkg-1.0")).unwrap();

        assert!(dest.join("configure").is_file());
        assert!(dest.join("src/main.c").is_file());
        assert!(!dest.join("pkg-1.0").exists());
    }

    #[test]
    fn test_extract_without_strip() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("pkg.tar.gz");
        let dest = tmp.path().join("out");
        write_archive(&archive, &[("README", "hi")]);

        extract_tarball(&archive, &dest, None).unwrap();
        assert_eq!(fs::read_to_string(dest.join("README")).unwrap(), "hi");
    }

    #[test]
    fn test_extract_rejects_escaping_entry() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("evil.tar.gz");
        write_archive_raw(
            &archive,
            &[(b"../evil.txt".as_slice(), "gotcha"), (b"README".as_slice(), "hi")],
        );

        let dest = tmp.path().join("out");
        let err = extract_tarball(&archive, &dest, None).unwrap_err();

        assert!(err.to_string().contains("escapes destination"));
        assert!(!tmp.path().join("evil.txt").exists());
        assert!(!dest.join("README").exists());
    }

    #[test]
    fn test_failed_unpack_discards_partial_entry() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("evil.tar.gz");
        // The good entry unpacks before the escaping one is rejected.
        write_archive_raw(
            &archive,
            &[
                (b"pkg-1.0/README".as_slice(), "hi"),
                (b"../evil.txt".as_slice(), "gotcha"),
            ],
        );

        let cache_dir = tmp.path().join("entry");
        assert!(refresh_entry(&archive, &cache_dir).is_err());

        assert!(!cache_dir.exists());
        assert!(!tmp.path().join("evil.txt").exists());
    }

    #[test]
    fn test_refresh_entry_replaces_stale_content() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("pkg.tar.gz");
        let cache_dir = tmp.path().join("entry");
        write_archive(&archive, &[("pkg-1.0/new.txt", "new")]);

        fs::create_dir_all(&cache_dir).unwrap();
        fs::write(cache_dir.join("stale.txt"), "stale").unwrap();

        refresh_entry(&archive, &cache_dir).unwrap();

        assert!(!cache_dir.join("stale.txt").exists());
        assert_eq!(
            fs::read_to_string(cache_dir.join("new.txt")).unwrap(),
            "new"
        );
    }
}
