//! Capstan CLI - a cached installer for configure/make packages

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use capstan::util::GlobalContext;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("capstan=debug")
    } else {
        EnvFilter::new("capstan=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let ctx = context(&cli)?;

    // Execute command
    match cli.command {
        Commands::Install(args) => commands::install::execute(&ctx, args),
        Commands::Cache(args) => commands::cache::execute(&ctx, args),
        Commands::Doctor => commands::doctor::execute(&ctx),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

fn context(cli: &Cli) -> Result<GlobalContext> {
    let mut ctx = match &cli.home {
        Some(home) => GlobalContext::with_home(home.clone())?,
        None => GlobalContext::new()?,
    };
    ctx.set_verbose(cli.verbose);
    Ok(ctx)
}
