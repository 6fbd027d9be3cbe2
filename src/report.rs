//! Rendering of reconciliation reports
//!
//! Two outputs: colored terminal text, and a JSON document for automation.
//! Both only ever show commands in their masked form.

use crate::ui;
use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use reconcile::{Deviation, Outcome, ReconcileReport, Stage};
use serde::Serialize;

/// What the run was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Check,
    Apply,
}

/// Counts across a fleet run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub compliant: usize,
    pub deviating: usize,
    pub failed: usize,
    pub unsaved: usize,
}

impl Tally {
    pub fn from_reports(reports: &[ReconcileReport]) -> Self {
        let mut tally = Self::default();
        for report in reports {
            if !report.is_success() {
                tally.failed += 1;
            } else if report.is_compliant() {
                tally.compliant += 1;
            } else {
                tally.deviating += 1;
            }
            if report.apply_result().is_some_and(|r| !r.persisted) {
                tally.unsaved += 1;
            }
        }
        tally
    }
}

#[derive(Debug, Serialize)]
struct FleetView<'a> {
    mode: Mode,
    checked_at: DateTime<Utc>,
    summary: Tally,
    targets: Vec<TargetView<'a>>,
}

#[derive(Debug, Serialize)]
struct TargetView<'a> {
    target: &'a str,
    stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    compliant: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deviation: Option<&'a Deviation>,
    plan: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    applied: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    persisted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    persist_warning: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorView>,
}

#[derive(Debug, Serialize)]
struct ErrorView {
    stage: Stage,
    category: &'static str,
    message: String,
    applied_before_failure: usize,
}

impl<'a> TargetView<'a> {
    fn new(report: &'a ReconcileReport) -> Self {
        let apply = report.apply_result();
        Self {
            target: &report.target,
            stage: report.stage,
            compliant: report.deviation.as_ref().map(Deviation::is_empty),
            deviation: report.deviation.as_ref(),
            plan: report
                .plan
                .iter()
                .flat_map(|p| p.steps.iter().map(|s| s.display.as_str()))
                .collect(),
            applied: apply.map(|r| r.applied),
            persisted: apply.map(|r| r.persisted),
            persist_warning: apply.and_then(|r| r.persist_warning.as_deref()),
            error: report.error().map(|e| ErrorView {
                stage: e.stage(),
                category: e.category().description(),
                message: e.to_string(),
                applied_before_failure: e.applied(),
            }),
        }
    }
}

/// Serialize a fleet run as pretty JSON.
pub fn to_json(mode: Mode, reports: &[ReconcileReport]) -> Result<String> {
    let view = FleetView {
        mode,
        checked_at: Utc::now(),
        summary: Tally::from_reports(reports),
        targets: reports.iter().map(TargetView::new).collect(),
    };
    Ok(serde_json::to_string_pretty(&view)?)
}

/// Print one target's report.
pub fn print_report(report: &ReconcileReport) {
    ui::section(&report.target);

    if let Some(deviation) = &report.deviation {
        print_deviation(deviation);
    }

    match &report.outcome {
        Outcome::Planned => {
            if let Some(plan) = &report.plan {
                ui::info(&format!("Planned {}:", ui::count(plan.len(), "command")));
                for line in plan.display_lines() {
                    ui::dim(&line);
                }
            }
        }
        Outcome::Applied(result) => {
            ui::success(&format!("Applied {}", ui::count(result.applied, "command")));
            match &result.persist_warning {
                None if result.persisted => ui::dim("Configuration saved"),
                Some(warning) => ui::warn(&format!("Configuration not saved: {warning}")),
                None => {}
            }
        }
        Outcome::Failed(err) => {
            ui::error(&format!("Failed while {}: {err}", err.stage()));
            ui::dim(err.category().advice());
            if err.applied() > 0 {
                ui::warn(&format!(
                    "{} applied before the failure; verify the device state",
                    ui::count(err.applied(), "command")
                ));
            }
        }
    }
}

fn print_deviation(deviation: &Deviation) {
    if deviation.is_empty() {
        ui::success("Compliant");
        return;
    }
    if !deviation.unauthorized_principals.is_empty() {
        ui::warn(&format!(
            "Unauthorized users: {}",
            ui::list(&deviation.unauthorized_principals)
        ));
    }
    if !deviation.unauthorized_secrets.is_empty() {
        ui::warn(&format!(
            "Unauthorized communities: {}",
            ui::list(&deviation.unauthorized_secrets)
        ));
    }
}

/// Print the closing summary line.
pub fn print_summary(tally: Tally) {
    println!();
    let mut parts = vec![format!("{} compliant", tally.compliant).green().to_string()];
    if tally.deviating > 0 {
        parts.push(format!("{} deviating", tally.deviating).yellow().to_string());
    }
    if tally.failed > 0 {
        parts.push(format!("{} failed", tally.failed).red().to_string());
    }
    if tally.unsaved > 0 {
        parts.push(format!("{} unsaved", tally.unsaved).yellow().to_string());
    }
    println!("{}", parts.join(", "));
}
