//! `capstan install` command

use anyhow::Result;

use capstan::builder::BuildSteps;
use capstan::core::Locator;
use capstan::ops::{install, InstallOptions, InstallOutcome};
use capstan::sources::default_archive_set;
use capstan::util::{Config, GlobalContext};

use crate::cli::InstallArgs;

pub fn execute(ctx: &GlobalContext, args: InstallArgs) -> Result<()> {
    let config = Config::load_or_default(&ctx.config_path());
    let locator = Locator::new(args.locator);
    let mut sources = default_archive_set(ctx, &config.net)?;

    let options = InstallOptions {
        force: args.force,
        verbose: ctx.is_verbose(),
        steps: BuildSteps::from_config(&config.build),
    };

    match install(ctx, &mut sources, &locator, &args.dest, &options)? {
        InstallOutcome::Installed { backup } => {
            println!("Installed {} to {}", locator, args.dest.display());
            if let Some(backup) = backup {
                println!("Previous install backed up to {}", backup.display());
            }
        }
        InstallOutcome::AlreadyCurrent => {
            println!("{} is already current at {}", locator, args.dest.display());
        }
    }

    Ok(())
}
