//! Executor - submits a remediation plan to a session
//!
//! The executor never interprets command failures. The session classifies
//! them; the executor stops at the first one and reports how far it got.

use crate::context::StageObserver;
use crate::error::ApplyFailure;
use crate::types::{ApplyResult, RemediationPlan};
use devicekit::Session;

/// Apply `plan` and persist the result.
///
/// Atomic sessions receive the whole plan as one batch. Other sessions get
/// one command at a time, stopping at the first failure. A persist failure
/// is recorded on the result and logged, never returned as an error.
pub fn apply(
    session: &mut dyn Session,
    plan: &RemediationPlan,
    target: &str,
    observer: &dyn StageObserver,
) -> Result<ApplyResult, ApplyFailure> {
    if plan.is_empty() {
        return Ok(ApplyResult::default());
    }

    let applied = if session.supports_atomic_batch() {
        apply_batch(session, plan, target, observer)?
    } else {
        apply_sequential(session, plan, target, observer)?
    };

    let mut result = ApplyResult {
        applied,
        ..Default::default()
    };

    match session.persist() {
        Ok(()) => result.persisted = true,
        Err(e) => {
            log::warn!("{target}: configuration applied but not saved: {e}");
            result.persist_warning = Some(e.to_string());
        }
    }

    Ok(result)
}

fn apply_sequential(
    session: &mut dyn Session,
    plan: &RemediationPlan,
    target: &str,
    observer: &dyn StageObserver,
) -> Result<usize, ApplyFailure> {
    let total = plan.len();
    for (index, step) in plan.steps.iter().enumerate() {
        log::debug!("{target}: [{}/{total}] {}", index + 1, step.display);
        session
            .run_change(std::slice::from_ref(&step.command))
            .map_err(|source| step_failure(source, index, &step.command, &step.display))?;
        observer.on_command_applied(target, index + 1, total, &step.display);
    }
    Ok(total)
}

/// Attribute a failure to the plan step only when the step itself failed.
/// Errors from commands the session issues on its own (entering config
/// mode, for instance) keep their command text.
fn step_failure(
    source: devicekit::Error,
    applied: usize,
    command: &str,
    display: &str,
) -> ApplyFailure {
    match source.command() {
        Some(failed) if failed != command => ApplyFailure {
            applied,
            failing_command: failed.to_string(),
            source,
        },
        _ => ApplyFailure {
            applied,
            failing_command: display.to_string(),
            source: source.redact_command(display),
        },
    }
}

fn apply_batch(
    session: &mut dyn Session,
    plan: &RemediationPlan,
    target: &str,
    observer: &dyn StageObserver,
) -> Result<usize, ApplyFailure> {
    let total = plan.len();
    log::debug!("{target}: submitting {total} command(s) as one batch");

    if let Err(source) = session.run_change(&plan.commands()) {
        let failing = source
            .command()
            .and_then(|cmd| plan.steps.iter().find(|s| s.command == cmd));
        let (failing_command, source) = match failing {
            Some(step) => (step.display.clone(), source.redact_command(&step.display)),
            None => (format!("batch of {total} command(s)"), source),
        };
        return Err(ApplyFailure {
            applied: 0,
            failing_command,
            source,
        });
    }

    for (index, step) in plan.steps.iter().enumerate() {
        observer.on_command_applied(target, index + 1, total, &step.display);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoObserver;
    use crate::types::{Action, PlannedCommand, ResourceClass, Stage};
    use devicekit::backend::mock::{MockConnector, MockDevice};
    use devicekit::{ChangeOutcome, Connector, TargetHandle};
    use std::sync::Mutex;

    fn five_step_plan() -> RemediationPlan {
        let steps = (1..=5)
            .map(|i| PlannedCommand {
                class: ResourceClass::Principal,
                action: Action::Remove,
                command: format!("cmd-{i} secret-{i}"),
                display: format!("cmd-{i} ****"),
            })
            .collect();
        RemediationPlan { steps }
    }

    fn run(
        device: MockDevice,
        plan: &RemediationPlan,
    ) -> (Result<ApplyResult, ApplyFailure>, MockConnector) {
        let connector = MockConnector::new(device);
        let target = TargetHandle::new("lab", "127.0.0.1", 22, "expert");
        let mut session = connector.connect(&target).unwrap();
        let result = apply(session.as_mut(), plan, "lab", &NoObserver);
        (result, connector)
    }

    #[test]
    fn test_applies_all_and_persists() {
        let plan = five_step_plan();
        let (result, connector) = run(MockDevice::new(), &plan);
        let result = result.unwrap();
        assert_eq!(result.applied, 5);
        assert!(result.persisted);
        assert_eq!(result.persist_warning, None);
        assert_eq!(connector.log().applied(), plan.commands());
        assert_eq!(connector.log().persist_count(), 1);
    }

    #[test]
    fn test_failure_on_third_of_five() {
        let plan = five_step_plan();
        let (result, connector) = run(MockDevice::new().fail_change_at(2), &plan);
        let failure = result.unwrap_err();
        assert_eq!(failure.applied, 2);
        assert_eq!(failure.failing_command, "cmd-3 ****");
        assert!(!failure.source.to_string().contains("secret-3"));
        // Nothing after the failing command was attempted.
        assert_eq!(connector.log().batches().len(), 3);
        assert_eq!(connector.log().applied(), plan.commands()[..2]);
        assert_eq!(connector.log().persist_count(), 0);
    }

    #[test]
    fn test_atomic_batch_failure_applies_nothing() {
        let plan = five_step_plan();
        let (result, connector) = run(MockDevice::new().atomic().fail_change_at(2), &plan);
        let failure = result.unwrap_err();
        assert_eq!(failure.applied, 0);
        assert_eq!(failure.failing_command, "cmd-3 ****");
        assert_eq!(connector.log().batches().len(), 1);
        assert!(connector.log().applied().is_empty());
    }

    #[test]
    fn test_atomic_batch_success() {
        let plan = five_step_plan();
        let (result, connector) = run(MockDevice::new().atomic(), &plan);
        assert_eq!(result.unwrap().applied, 5);
        assert_eq!(connector.log().batches(), [plan.commands()]);
    }

    #[test]
    fn test_persist_failure_is_a_warning() {
        let plan = five_step_plan();
        let (result, _) = run(MockDevice::new().fail_persist(), &plan);
        let result = result.unwrap();
        assert_eq!(result.applied, 5);
        assert!(!result.persisted);
        assert!(result.persist_warning.is_some());
    }

    #[test]
    fn test_empty_plan_touches_nothing() {
        let (result, connector) = run(MockDevice::new(), &RemediationPlan::default());
        assert_eq!(result.unwrap(), ApplyResult::default());
        assert!(connector.log().batches().is_empty());
        assert_eq!(connector.log().persist_count(), 0);
    }

    struct Recorder(Mutex<Vec<(usize, usize)>>);

    impl StageObserver for Recorder {
        fn on_stage(&self, _target: &str, _stage: Stage) {}

        fn on_command_applied(&self, _target: &str, index: usize, total: usize, display: &str) {
            assert!(display.ends_with("****"));
            self.0.lock().unwrap().push((index, total));
        }
    }

    #[test]
    fn test_observer_sees_each_command() {
        let connector = MockConnector::new(MockDevice::new());
        let target = TargetHandle::new("lab", "127.0.0.1", 22, "expert");
        let mut session = connector.connect(&target).unwrap();
        let recorder = Recorder(Mutex::new(Vec::new()));
        apply(session.as_mut(), &five_step_plan(), "lab", &recorder).unwrap();
        let seen = recorder.0.lock().unwrap().clone();
        assert_eq!(seen, [(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]);
    }

    /// Fails entering configuration mode on the second batch.
    struct ConfigModeFailure {
        batches: usize,
    }

    impl Session for ConfigModeFailure {
        fn run_read(&mut self, _command: &str) -> devicekit::Result<String> {
            Ok(String::new())
        }

        fn run_change(&mut self, commands: &[String]) -> devicekit::Result<ChangeOutcome> {
            self.batches += 1;
            if self.batches == 2 {
                return Err(devicekit::Error::Rejected {
                    command: "configure terminal".to_string(),
                    output: "% Configuration locked".to_string(),
                });
            }
            Ok(ChangeOutcome {
                applied: commands.len(),
                output: String::new(),
            })
        }

        fn persist(&mut self) -> devicekit::Result<()> {
            Ok(())
        }

        fn close(&mut self) -> devicekit::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_session_command_failure_names_session_command() {
        let mut session = ConfigModeFailure { batches: 0 };
        let failure = apply(&mut session, &five_step_plan(), "lab", &NoObserver).unwrap_err();
        assert_eq!(failure.applied, 1);
        assert_eq!(failure.failing_command, "configure terminal");
        assert_eq!(failure.source.command(), Some("configure terminal"));
    }
}
