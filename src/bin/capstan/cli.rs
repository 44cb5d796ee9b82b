//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Capstan - a cached, crash-safe installer for configure/make packages
#[derive(Parser)]
#[command(name = "capstan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (build output streams live)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override the home base directory
    #[arg(long, global = true, env = "CAPSTAN_HOME", value_name = "DIR")]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch, build, and install a package archive
    Install(InstallArgs),

    /// Manage the download and build caches
    Cache(CacheArgs),

    /// Check the environment for the tools installs need
    Doctor,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct InstallArgs {
    /// Package locator (URL of a .tar.gz/.tgz archive)
    pub locator: String,

    /// Directory to install into
    pub dest: PathBuf,

    /// Reinstall even when the destination looks current
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// List cached content with sizes
    List,

    /// Remove cached content
    Clean(CacheCleanArgs),

    /// Print the build cache root
    Path,
}

#[derive(Args)]
pub struct CacheCleanArgs {
    /// Only clean unpacked build trees
    #[arg(long)]
    pub installs: bool,

    /// Only clean downloaded archives
    #[arg(long)]
    pub urls: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
