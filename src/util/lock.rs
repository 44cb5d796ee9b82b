//! Advisory per-locator locking.
//!
//! Concurrent installs of the same locator from separate processes would
//! race on one cache directory. Each install therefore holds an exclusive
//! advisory lock, keyed by the locator hash, for the whole
//! resolve/build/promote span. Locks are advisory: they coordinate
//! instances of this tool only.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs4::FileExt;

use crate::util::fs::ensure_dir;
use crate::util::hash::sha256_str;

/// An exclusive advisory lock, released on drop.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Acquire the lock for `key`, blocking until it is available.
    pub fn acquire(locks_dir: &Path, key: &str) -> Result<Self> {
        let path = lock_path(locks_dir, key);
        let file = open_lock_file(&path)?;

        file.lock_exclusive()
            .with_context(|| format!("failed to lock {}", path.display()))?;
        tracing::debug!("acquired lock {}", path.display());

        Ok(CacheLock { file, path })
    }

    /// Acquire the lock for `key` without blocking.
    ///
    /// Returns `None` when another holder has it.
    pub fn try_acquire(locks_dir: &Path, key: &str) -> Result<Option<Self>> {
        let path = lock_path(locks_dir, key);
        let file = open_lock_file(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(CacheLock { file, path })),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("failed to lock {}", path.display()))
            }
        }
    }

    /// The lock file's path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        tracing::debug!("released lock {}", self.path.display());
    }
}

fn lock_path(locks_dir: &Path, key: &str) -> PathBuf {
    locks_dir.join(format!("{}.lock", &sha256_str(key)[..16]))
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("failed to open lock file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_creates_lock_file() {
        let tmp = TempDir::new().unwrap();

        let lock = CacheLock::acquire(tmp.path(), "http://example.com/pkg.tar.gz").unwrap();
        assert!(lock.path().exists());
    }

    #[test]
    fn test_try_acquire_contended() {
        let tmp = TempDir::new().unwrap();
        let key = "http://example.com/pkg.tar.gz";

        let held = CacheLock::try_acquire(tmp.path(), key).unwrap();
        assert!(held.is_some());

        let contended = CacheLock::try_acquire(tmp.path(), key).unwrap();
        assert!(contended.is_none());

        drop(held);
        let reacquired = CacheLock::try_acquire(tmp.path(), key).unwrap();
        assert!(reacquired.is_some());
    }

    #[test]
    fn test_distinct_keys_do_not_contend() {
        let tmp = TempDir::new().unwrap();

        let a = CacheLock::try_acquire(tmp.path(), "pkg-a.tar.gz").unwrap();
        let b = CacheLock::try_acquire(tmp.path(), "pkg-b.tar.gz").unwrap();

        assert!(a.is_some());
        assert!(b.is_some());
    }
}
