//! Global context for capstan operations.
//!
//! Provides centralized access to the home base directory and the
//! well-known paths beneath it:
//!
//! - `<home>/url-cache`      downloaded archives plus revalidation metadata
//! - `<home>/install-cache`  unpacked and built trees, keyed by locator
//! - `<home>/locks`          advisory per-locator lock files
//! - `<home>/config.toml`    configuration
//!
//! The home base defaults to the platform cache directory and can be
//! overridden with the `CAPSTAN_HOME` environment variable.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use directories::ProjectDirs;

/// Project directories for capstan
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("com", "capstan", "capstan"));

/// Global context containing paths and output settings.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global capstan data
    home: PathBuf,

    /// Whether to use verbose output
    verbose: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext with defaults.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        let home = default_home();

        Ok(GlobalContext {
            cwd,
            home,
            verbose: false,
        })
    }

    /// Create a GlobalContext with a specific home directory.
    pub fn with_home(home: PathBuf) -> Result<Self> {
        let mut ctx = Self::new()?;
        ctx.home = home;
        Ok(ctx)
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the capstan home directory.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the URL content cache directory.
    pub fn url_cache_dir(&self) -> PathBuf {
        self.home.join("url-cache")
    }

    /// Get the build cache store directory.
    pub fn install_cache_dir(&self) -> PathBuf {
        self.home.join("install-cache")
    }

    /// Get the advisory lock directory.
    pub fn locks_dir(&self) -> PathBuf {
        self.home.join("locks")
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Resolve the default home base: `CAPSTAN_HOME` wins, then the platform
/// cache directory, then `~/.capstan`.
fn default_home() -> PathBuf {
    if let Some(home) = std::env::var_os("CAPSTAN_HOME") {
        let home = PathBuf::from(home);
        if !home.as_os_str().is_empty() {
            return home;
        }
    }

    if let Some(dirs) = PROJECT_DIRS.as_ref() {
        return dirs.cache_dir().to_path_buf();
    }

    directories::BaseDirs::new()
        .map(|b| b.home_dir().join(".capstan"))
        .unwrap_or_else(|| PathBuf::from(".capstan"))
}
