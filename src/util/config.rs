//! Configuration file support for capstan.
//!
//! Configuration lives at `<home>/config.toml`:
//!
//! ```toml
//! [build]
//! configure = "./configure"
//! build = "make"
//!
//! [net]
//! offline = false
//! timeout = 60
//! ```
//!
//! Missing files and unparsable files both degrade to defaults; a parse
//! failure is reported as a warning rather than aborting the run.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// capstan configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// Network settings
    pub net: NetConfig,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Override for the configure step command
    pub configure: Option<String>,

    /// Override for the build step command
    pub build: Option<String>,
}

/// Network-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Offline mode (never fetch from the network)
    #[serde(default)]
    pub offline: bool,

    /// HTTP request timeout in seconds (None = client default)
    pub timeout: Option<u64>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.configure.is_some() {
            self.build.configure = other.build.configure;
        }
        if other.build.build.is_some() {
            self.build.build = other.build.build;
        }
        if other.net.offline {
            self.net.offline = true;
        }
        if other.net.timeout.is_some() {
            self.net.timeout = other.net.timeout;
        }
    }
}
