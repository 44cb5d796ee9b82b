//! `capstan cache` command
//!
//! Manage the Capstan caches (downloaded archives, unpacked build trees).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use capstan::util::fs::{dir_size, remove_dir_all_if_exists};
use capstan::util::GlobalContext;

use crate::cli::{CacheArgs, CacheCleanArgs, CacheCommands};

pub fn execute(ctx: &GlobalContext, args: CacheArgs) -> Result<()> {
    match args.command {
        CacheCommands::List => list_cache(ctx),
        CacheCommands::Clean(clean_args) => clean_cache(ctx, clean_args),
        CacheCommands::Path => show_path(ctx),
    }
}

/// List cached items.
fn list_cache(ctx: &GlobalContext) -> Result<()> {
    println!("Cache directory: {}", ctx.home().display());
    println!();

    // Downloaded archives
    let url_cache = ctx.url_cache_dir();
    println!("Downloaded archives:");
    if url_cache.exists() {
        list_directory_entries(&url_cache, "  ")?;
    } else {
        println!("  (none)");
    }
    println!();

    // Unpacked build trees
    let install_cache = ctx.install_cache_dir();
    println!("Build cache entries:");
    if install_cache.exists() {
        list_directory_entries(&install_cache, "  ")?;
    } else {
        println!("  (none)");
    }

    Ok(())
}

/// List directory entries with their sizes.
fn list_directory_entries(dir: &Path, prefix: &str) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_name().to_string_lossy().ends_with(".meta.json"))
        .collect();

    entries.sort_by_key(|e| e.file_name());

    if entries.is_empty() {
        println!("{}(empty)", prefix);
        return Ok(());
    }

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name();
        let name_str = name.to_string_lossy();

        if path.is_dir() {
            println!("{}{} ({})", prefix, name_str, format_size(dir_size(&path)));
        } else {
            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            println!("{}{} ({})", prefix, name_str, format_size(size));
        }
    }

    Ok(())
}

/// Clean cache.
fn clean_cache(ctx: &GlobalContext, args: CacheCleanArgs) -> Result<()> {
    // If no specific flags, clean everything
    let clean_all = !args.installs && !args.urls;

    let mut cleaned_something = false;

    // Clean unpacked build trees
    if clean_all || args.installs {
        let install_cache = ctx.install_cache_dir();
        if install_cache.exists() {
            remove_dir_all_if_exists(&install_cache)?;
            eprintln!("     Removed {}", install_cache.display());
            cleaned_something = true;
        }
    }

    // Clean downloaded archives
    if clean_all || args.urls {
        let url_cache = ctx.url_cache_dir();
        if url_cache.exists() {
            remove_dir_all_if_exists(&url_cache)?;
            eprintln!("     Removed {}", url_cache.display());
            cleaned_something = true;
        }
    }

    if !cleaned_something {
        eprintln!("     Nothing to clean");
    }

    Ok(())
}

/// Show the build cache root.
fn show_path(ctx: &GlobalContext) -> Result<()> {
    println!("{}", ctx.install_cache_dir().display());
    Ok(())
}

/// Format a size in bytes to a human-readable string.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
