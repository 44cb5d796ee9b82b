//! Promotion of build output into the live install path.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::util::fs::{copy_dir_all, remove_dir_all_if_exists, remove_vcs_metadata};

/// Staging from cache into the live path failed after the backup step.
#[derive(Debug, Error)]
#[error("failed to stage {} into {}: {reason}", cache_dir.display(), live_path.display())]
pub struct PromotionError {
    pub cache_dir: PathBuf,
    pub live_path: PathBuf,
    pub backup: Option<PathBuf>,
    pub reason: String,
}

/// Promote a finished cache directory into the live install path.
///
/// Any existing install is first renamed to `<live>~backup-<millis>`; the
/// backup belongs to the caller and is never removed here, success or
/// not. The live path is then recreated and filled from the cache, and
/// top-level version-control metadata is scrubbed so the installed copy
/// is detached from its build history. If filling fails, the partially
/// copied live path is deleted entirely before the error propagates,
/// leaving the backup as the recovery point.
///
/// Returns the backup path when one was created.
pub fn promote(cache_dir: &Path, live_path: &Path) -> Result<Option<PathBuf>> {
    let backup = if live_path.exists() {
        let backup = backup_path(live_path);
        fs::rename(live_path, &backup).with_context(|| {
            format!(
                "failed to back up {} to {}",
                live_path.display(),
                backup.display()
            )
        })?;
        tracing::info!("Backed up previous install to {}", backup.display());
        Some(backup)
    } else {
        None
    };

    if let Err(e) = stage(cache_dir, live_path) {
        // Never leave a half-copied live tree; the backup stays put.
        if let Err(cleanup) = remove_dir_all_if_exists(live_path) {
            tracing::warn!(
                "failed to clean up {}: {:#}",
                live_path.display(),
                cleanup
            );
        }

        return Err(PromotionError {
            cache_dir: cache_dir.to_path_buf(),
            live_path: live_path.to_path_buf(),
            backup,
            reason: format!("{:#}", e),
        }
        .into());
    }

    for name in remove_vcs_metadata(live_path)? {
        tracing::debug!("removed {} from {}", name, live_path.display());
    }

    Ok(backup)
}

fn stage(cache_dir: &Path, live_path: &Path) -> Result<()> {
    fs::create_dir_all(live_path)
        .with_context(|| format!("failed to create directory: {}", live_path.display()))?;
    copy_dir_all(cache_dir, live_path)
}

/// Timestamped sibling of the live path.
fn backup_path(live_path: &Path) -> PathBuf {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);

    let mut name = live_path.as_os_str().to_os_string();
    name.push(format!("~backup-{}", millis));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed_dir(dir: &Path, files: &[(&str, &str)]) {
        for (name, contents) in files {
            let path = dir.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
    }

    #[test]
    fn test_promote_fresh_install() {
        let tmp = TempDir::new().unwrap();
        let cache_dir = tmp.path().join("cache");
        let live = tmp.path().join("live");
        seed_dir(&cache_dir, &[("bin/tool", "v2"), ("share/doc.txt", "docs")]);

        let backup = promote(&cache_dir, &live).unwrap();

        assert!(backup.is_none());
        assert_eq!(fs::read_to_string(live.join("bin/tool")).unwrap(), "v2");
        assert_eq!(
            fs::read_to_string(live.join("share/doc.txt")).unwrap(),
            "docs"
        );
    }

    #[test]
    fn test_promote_backs_up_existing_install() {
        let tmp = TempDir::new().unwrap();
        let cache_dir = tmp.path().join("cache");
        let live = tmp.path().join("live");
        seed_dir(&cache_dir, &[("bin/tool", "v2")]);
        seed_dir(&live, &[("bin/tool", "v1")]);

        let backup = promote(&cache_dir, &live).unwrap().unwrap();

        assert!(backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("live~backup-"));
        assert_eq!(fs::read_to_string(backup.join("bin/tool")).unwrap(), "v1");
        assert_eq!(fs::read_to_string(live.join("bin/tool")).unwrap(), "v2");
    }

    #[test]
    fn test_promote_scrubs_vcs_metadata() {
        let tmp = TempDir::new().unwrap();
        let cache_dir = tmp.path().join("cache");
        let live = tmp.path().join("live");
        seed_dir(
            &cache_dir,
            &[("bin/tool", "v2"), (".git/config", "[core]"), (".hg/store", "x")],
        );

        promote(&cache_dir, &live).unwrap();

        assert!(live.join("bin/tool").exists());
        assert!(!live.join(".git").exists());
        assert!(!live.join(".hg").exists());
        // The cache copy keeps its metadata; only the live tree is scrubbed.
        assert!(cache_dir.join(".git/config").exists());
    }

    #[test]
    fn test_promote_failure_removes_live_and_keeps_backup() {
        let tmp = TempDir::new().unwrap();
        let cache_dir = tmp.path().join("cache-missing");
        let live = tmp.path().join("live");
        seed_dir(&live, &[("bin/tool", "v1")]);

        let err = promote(&cache_dir, &live).unwrap_err();

        let promotion = err.downcast_ref::<PromotionError>().unwrap();
        let backup = promotion.backup.clone().unwrap();

        assert!(!live.exists());
        assert_eq!(fs::read_to_string(backup.join("bin/tool")).unwrap(), "v1");
    }

    #[test]
    fn test_promote_failure_without_prior_install() {
        let tmp = TempDir::new().unwrap();
        let cache_dir = tmp.path().join("cache-missing");
        let live = tmp.path().join("live");

        let err = promote(&cache_dir, &live).unwrap_err();

        let promotion = err.downcast_ref::<PromotionError>().unwrap();
        assert!(promotion.backup.is_none());
        assert!(!live.exists());
    }

    #[test]
    fn test_backup_path_is_timestamped_sibling() {
        let path = backup_path(Path::new("/opt/pkg"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();

        assert_eq!(path.parent(), Some(Path::new("/opt")));
        assert!(name.starts_with("pkg~backup-"));
        assert!(name["pkg~backup-".len()..].chars().all(|c| c.is_ascii_digit()));
    }
}
