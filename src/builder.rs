//! External build toolchain execution.
//!
//! A build is two commands run in sequence inside a cache directory: a
//! configure step, then a build step. Each command string is split on
//! whitespace, so a configured override such as `make -j4` carries its
//! arguments; the defaults are bare names. Commands run with the cache
//! directory as their working directory and the inherited process
//! environment. There is no timeout: a hung toolchain blocks the
//! install until it exits.

use std::path::{Path, PathBuf};

use anyhow::Result;
use thiserror::Error;

use crate::core::Freshness;
use crate::util::config::BuildConfig;
use crate::util::fs::remove_dir_all_if_exists;
use crate::util::process::{OutputMode, ProcessBuilder};

/// The two toolchain commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSteps {
    pub configure: String,
    pub build: String,
}

impl Default for BuildSteps {
    fn default() -> Self {
        BuildSteps {
            configure: "./configure".to_string(),
            build: "make".to_string(),
        }
    }
}

impl BuildSteps {
    /// Apply configuration overrides on top of the defaults.
    pub fn from_config(config: &BuildConfig) -> Self {
        let defaults = Self::default();
        BuildSteps {
            configure: config.configure.clone().unwrap_or(defaults.configure),
            build: config.build.clone().unwrap_or(defaults.build),
        }
    }
}

/// A build command failed or could not be launched.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to launch `{command}` in {}: {reason}", dir.display())]
    Launch {
        command: String,
        dir: PathBuf,
        reason: String,
    },

    #[error("`{command}` failed with exit code {code:?} in {}", dir.display())]
    Failed {
        command: String,
        dir: PathBuf,
        code: Option<i32>,
    },
}

/// Runs the configure and build steps for a cache entry.
#[derive(Debug, Clone)]
pub struct Builder {
    steps: BuildSteps,
    verbose: bool,
}

impl Builder {
    pub fn new(steps: BuildSteps, verbose: bool) -> Self {
        Builder { steps, verbose }
    }

    /// Build the cache directory's content if its freshness demands it.
    ///
    /// `Unchanged` skips the toolchain entirely, which is what makes a
    /// repeated install of an unchanged locator build at most once. On
    /// any failure the whole cache directory is deleted before the error
    /// propagates, so no half-built entry survives to satisfy a later
    /// fast path.
    pub fn build(&self, cache_dir: &Path, freshness: Freshness) -> Result<()> {
        if !freshness.requires_build() {
            tracing::debug!(
                "cache entry {} is fresh, skipping build",
                cache_dir.display()
            );
            return Ok(());
        }

        self.run_step(&self.steps.configure, cache_dir)?;
        self.run_step(&self.steps.build, cache_dir)?;
        Ok(())
    }

    fn run_step(&self, command: &str, cache_dir: &Path) -> Result<()> {
        tracing::info!("Running `{}` in {}", command, cache_dir.display());

        // Overrides from config may carry arguments, e.g. `make -j4`.
        let mut words = command.split_whitespace();
        let program = match words.next() {
            Some(program) => program,
            None => {
                self.discard_entry(cache_dir);
                return Err(BuildError::Launch {
                    command: command.to_string(),
                    dir: cache_dir.to_path_buf(),
                    reason: "empty command".to_string(),
                }
                .into());
            }
        };

        let mode = if self.verbose {
            OutputMode::Stream
        } else {
            OutputMode::Capture
        };

        let process = ProcessBuilder::new(program).args(words).cwd(cache_dir);
        let output = match process.exec_streamed(mode) {
            Ok(output) => output,
            Err(e) => {
                self.discard_entry(cache_dir);
                return Err(BuildError::Launch {
                    command: command.to_string(),
                    dir: cache_dir.to_path_buf(),
                    reason: format!("{:#}", e),
                }
                .into());
            }
        };

        if output.status.success() {
            return Ok(());
        }

        // Reveal what the failing command printed; in verbose mode it
        // already streamed live.
        if !self.verbose && !output.output.is_empty() {
            eprint!("{}", output.output);
        }

        self.discard_entry(cache_dir);
        Err(BuildError::Failed {
            command: command.to_string(),
            dir: cache_dir.to_path_buf(),
            code: output.status.code(),
        }
        .into())
    }

    /// A failed build may not leave a partial entry behind.
    fn discard_entry(&self, cache_dir: &Path) {
        if let Err(e) = remove_dir_all_if_exists(cache_dir) {
            tracing::warn!("failed to clean up {}: {:#}", cache_dir.display(), e);
        }
    }
}
