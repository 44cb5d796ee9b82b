//! `capstan doctor` command

use anyhow::Result;

use capstan::ops::{doctor, format_report};
use capstan::util::GlobalContext;

pub fn execute(ctx: &GlobalContext) -> Result<()> {
    let report = doctor(ctx)?;

    // Problems show up inside the report; the command itself succeeds.
    print!("{}", format_report(&report, ctx.is_verbose()));

    Ok(())
}
