//! `warden check` - dry run across the fleet

use super::Fleet;
use crate::Context;
use crate::cli::CheckArgs;
use crate::report::{self, Mode, Tally};
use crate::ui;
use anyhow::{Result, bail};
use reconcile::ReconcileOptions;

pub fn run(ctx: &Context, args: CheckArgs) -> Result<()> {
    let fleet = Fleet::prepare(ctx, &args.targets)?;

    if !args.json && !ctx.quiet {
        ui::header(&format!("Checking {}", ui::count(fleet.len(), "target")));
    }

    let reports = fleet.reconcile(
        ReconcileOptions { dry_run: true },
        args.jobs,
        None,
        !args.json && !ctx.quiet,
    )?;
    let tally = Tally::from_reports(&reports);

    if args.json {
        println!("{}", report::to_json(Mode::Check, &reports)?);
    } else {
        for r in &reports {
            report::print_report(r);
        }
        report::print_summary(tally);
    }

    if tally.failed > 0 || tally.deviating > 0 {
        bail!(
            "{} out of compliance, {} failed",
            ui::count(tally.deviating, "target"),
            tally.failed
        );
    }
    Ok(())
}
