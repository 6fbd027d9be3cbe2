//! `warden apply` - check, confirm, then reconcile
//!
//! The check pass only decides what to show and which targets are reachable.
//! The apply pass observes every target again, so the commands sent always
//! reflect the device as it is at apply time.

use super::Fleet;
use crate::Context;
use crate::cli::ApplyArgs;
use crate::report::{self, Mode, Tally};
use crate::ui;
use anyhow::{Context as _, Result, bail};
use dialoguer::Confirm;
use reconcile::{ReconcileOptions, ReconcileReport};
use std::io::IsTerminal;

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    if args.json && !args.yes {
        bail!("--json needs --yes; there is no one to answer the confirmation prompt");
    }

    let fleet = Fleet::prepare(ctx, &args.targets)?;
    let interactive = !args.json && !ctx.quiet;

    if interactive {
        ui::header(&format!("Checking {}", ui::count(fleet.len(), "target")));
    }
    let checked = fleet.reconcile(
        ReconcileOptions { dry_run: true },
        args.jobs,
        None,
        interactive,
    )?;

    if !args.json {
        for r in &checked {
            report::print_report(r);
        }
    }

    let reachable: Vec<usize> = checked
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_success())
        .map(|(i, _)| i)
        .collect();

    if reachable.is_empty() {
        if args.json {
            println!("{}", report::to_json(Mode::Apply, &checked)?);
        } else {
            report::print_summary(Tally::from_reports(&checked));
        }
        bail!("No target could be checked; nothing to apply");
    }

    if !args.yes && !confirm(reachable.len())? {
        ui::info("Aborted; no changes made");
        return Ok(());
    }

    if interactive {
        ui::header(&format!("Applying to {}", ui::count(reachable.len(), "target")));
    }
    let applied = fleet.reconcile(
        ReconcileOptions { dry_run: false },
        args.jobs,
        Some(&reachable),
        interactive,
    )?;

    let reports = merge(checked, &reachable, applied);
    let tally = Tally::from_reports(&reports);

    if args.json {
        println!("{}", report::to_json(Mode::Apply, &reports)?);
    } else {
        for (i, r) in reports.iter().enumerate() {
            if reachable.contains(&i) {
                report::print_report(r);
            }
        }
        report::print_summary(tally);
    }

    if tally.failed > 0 {
        bail!("{} failed", ui::count(tally.failed, "target"));
    }
    Ok(())
}

/// Ask before touching devices. Refuses when stdin is not a terminal so the
/// process never hangs waiting for input.
fn confirm(targets: usize) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        bail!("Refusing to apply without confirmation; pass --yes to proceed non-interactively");
    }

    println!();
    Confirm::new()
        .with_prompt(format!(
            "Apply compliance changes to {}?",
            ui::count(targets, "target")
        ))
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

/// Replace the check reports of applied targets with their apply reports,
/// keeping the configured target order.
fn merge(
    checked: Vec<ReconcileReport>,
    applied_indices: &[usize],
    applied: Vec<ReconcileReport>,
) -> Vec<ReconcileReport> {
    let mut slots: Vec<Option<ReconcileReport>> = checked.into_iter().map(Some).collect();
    for (&index, report) in applied_indices.iter().zip(applied) {
        slots[index] = Some(report);
    }
    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use devicekit::TargetHandle;
    use devicekit::backend::mock::{MockConnector, MockDevice};
    use reconcile::{Dialect, Outcome, Policy, Reconciler};

    fn report(name: &str, dry_run: bool) -> ReconcileReport {
        let connector = MockConnector::new(MockDevice::new());
        let reconciler = Reconciler::new(&connector, Dialect::default())
            .unwrap()
            .with_options(ReconcileOptions { dry_run });
        let policy = Policy::builder("x").build().unwrap();
        reconciler.run(&TargetHandle::new(name, "10.0.0.1", 22, "u"), &policy)
    }

    #[test]
    fn test_merge_keeps_order() {
        let checked = vec![report("a", true), report("b", true), report("c", true)];
        let applied = vec![report("a", false), report("c", false)];

        let merged = merge(checked, &[0, 2], applied);

        assert_eq!(merged.len(), 3);
        assert!(merged[0].target.starts_with("a "));
        assert!(matches!(merged[0].outcome, Outcome::Applied(_)));
        assert!(matches!(merged[1].outcome, Outcome::Planned));
        assert!(matches!(merged[2].outcome, Outcome::Applied(_)));
    }
}
