//! Core types for access-compliance reconciliation

use crate::error::ReconcileError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Live access configuration read from a target.
///
/// Produced fresh by every inspection and never cached across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedState {
    /// Principals configured on the target
    pub principals: BTreeSet<String>,
    /// Shared secrets configured on the target
    pub secrets: BTreeSet<String>,
}

impl ObservedState {
    /// Build a state from parsed facts.
    pub fn new<P, S>(principals: P, secrets: S) -> Self
    where
        P: IntoIterator<Item = String>,
        S: IntoIterator<Item = String>,
    {
        Self {
            principals: principals.into_iter().collect(),
            secrets: secrets.into_iter().collect(),
        }
    }
}

/// What the target has that policy does not allow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deviation {
    /// Configured principals not authorized by policy
    pub unauthorized_principals: BTreeSet<String>,
    /// Configured secrets that are neither compliant nor built in
    pub unauthorized_secrets: BTreeSet<String>,
}

impl Deviation {
    /// Whether the target is in compliance.
    pub fn is_empty(&self) -> bool {
        self.unauthorized_principals.is_empty() && self.unauthorized_secrets.is_empty()
    }

    /// Number of unauthorized items.
    pub fn total(&self) -> usize {
        self.unauthorized_principals.len() + self.unauthorized_secrets.len()
    }
}

/// Resource class a command acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    /// Local accounts
    Principal,
    /// Shared secrets (SNMP communities)
    Secret,
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceClass::Principal => write!(f, "principal"),
            ResourceClass::Secret => write!(f, "secret"),
        }
    }
}

/// What a command does to its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Remove an unauthorized item
    Remove,
    /// Assert the policy-desired item
    Enforce,
}

/// One step of a remediation plan.
#[derive(Clone, PartialEq, Eq)]
pub struct PlannedCommand {
    /// Resource class
    pub class: ResourceClass,
    /// Removal or enforcement
    pub action: Action,
    /// The command sent to the device (may contain credentials)
    pub command: String,
    /// The command with credentials masked, for logs and reports
    pub display: String,
}

impl fmt::Debug for PlannedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannedCommand")
            .field("class", &self.class)
            .field("action", &self.action)
            .field("command", &self.display)
            .finish()
    }
}

/// Ordered corrective commands for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemediationPlan {
    /// Commands in submission order
    pub steps: Vec<PlannedCommand>,
}

impl RemediationPlan {
    /// Number of commands.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the plan has no commands.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Raw commands, in order.
    pub fn commands(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.command.clone()).collect()
    }

    /// Masked commands, in order.
    pub fn display_lines(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.display.clone()).collect()
    }

    /// Number of removal commands.
    pub fn removals(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.action == Action::Remove)
            .count()
    }
}

/// Result of applying a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Commands the device accepted
    pub applied: usize,
    /// Whether the configuration was saved durably
    pub persisted: bool,
    /// Why persistence failed, if it did
    pub persist_warning: Option<String>,
}

/// Stages of a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Opening the session
    Connecting,
    /// Reading principals and secrets
    Observing,
    /// Comparing against policy
    Diffing,
    /// Building the remediation plan
    Planning,
    /// Submitting change commands
    Applying,
    /// Finished successfully
    Done,
    /// Finished with an error
    Failed,
}

impl Stage {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Connecting => "connecting",
            Stage::Observing => "observing",
            Stage::Diffing => "diffing",
            Stage::Planning => "planning",
            Stage::Applying => "applying",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Options for a reconciliation run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Stop after planning; nothing is sent to the device
    pub dry_run: bool,
}

/// How a run ended.
#[derive(Debug)]
pub enum Outcome {
    /// The plan was applied
    Applied(ApplyResult),
    /// Dry run: planned but not applied
    Planned,
    /// The run failed
    Failed(ReconcileError),
}

/// Everything a caller needs to know about one run.
#[derive(Debug)]
pub struct ReconcileReport {
    /// Target label
    pub target: String,
    /// Terminal stage (`Done` or `Failed`)
    pub stage: Stage,
    /// Deviation, if observation succeeded
    pub deviation: Option<Deviation>,
    /// Plan, if planning was reached
    pub plan: Option<RemediationPlan>,
    /// Outcome
    pub outcome: Outcome,
}

impl ReconcileReport {
    /// Whether the run reached `Done`.
    pub fn is_success(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Whether the target was observed to be in compliance.
    pub fn is_compliant(&self) -> bool {
        self.deviation.as_ref().is_some_and(Deviation::is_empty)
    }

    /// The error, if the run failed.
    pub fn error(&self) -> Option<&ReconcileError> {
        match &self.outcome {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// The apply result, if the plan was applied.
    pub fn apply_result(&self) -> Option<&ApplyResult> {
        match &self.outcome {
            Outcome::Applied(result) => Some(result),
            _ => None,
        }
    }
}
