//! Reconciler - drives one target through the run state machine
//!
//! `Connecting -> Observing -> Diffing -> Planning -> Applying -> Done`, with
//! any stage able to end in `Failed`. The session opened while connecting is
//! closed before the run leaves `Applying`, whatever the outcome.

use crate::context::{NoObserver, StageObserver};
use crate::dialect::Dialect;
use crate::diff::diff;
use crate::error::{ReconcileError, SetupError};
use crate::executor;
use crate::inspect::observe;
use crate::parser::FactParser;
use crate::planner;
use crate::policy::Policy;
use crate::types::{Outcome, ReconcileOptions, ReconcileReport, Stage};
use devicekit::{Connector, Session, SessionGuard, TargetHandle};

/// Runs reconciliations against targets reachable through one connector.
///
/// Holds no per-run state, so one instance can serve many targets
/// concurrently.
pub struct Reconciler<'a> {
    connector: &'a dyn Connector,
    dialect: Dialect,
    parser: FactParser,
    options: ReconcileOptions,
    observer: &'a dyn StageObserver,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler for a dialect.
    pub fn new(connector: &'a dyn Connector, dialect: Dialect) -> Result<Self, SetupError> {
        let parser = FactParser::new(&dialect)?;
        Ok(Self {
            connector,
            dialect,
            parser,
            options: ReconcileOptions::default(),
            observer: &NoObserver,
        })
    }

    /// Set run options.
    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Receive stage transitions.
    pub fn with_observer(mut self, observer: &'a dyn StageObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Current run options.
    pub fn options(&self) -> ReconcileOptions {
        self.options
    }

    /// Reconcile one target against `policy`.
    ///
    /// Never panics on device errors: every failure ends up in the report.
    pub fn run(&self, target: &TargetHandle, policy: &Policy) -> ReconcileReport {
        let label = target.to_string();
        let mut report = ReconcileReport {
            target: label.clone(),
            stage: Stage::Connecting,
            deviation: None,
            plan: None,
            outcome: Outcome::Planned,
        };

        self.enter(&label, Stage::Connecting);
        let result = match self.connector.connect(target) {
            Ok(session) => {
                let mut guard = SessionGuard::new(session, label.clone());
                let result = self.drive(&mut *guard, &label, policy, &mut report);
                if let Err(e) = guard.close() {
                    log::warn!("{label}: failed to close session: {e}");
                }
                result
            }
            Err(source) => Err(ReconcileError::Connection {
                target: label.clone(),
                source,
            }),
        };

        match result {
            Ok(outcome) => {
                report.stage = Stage::Done;
                report.outcome = outcome;
            }
            Err(err) => {
                log::info!("{err}");
                report.stage = Stage::Failed;
                report.outcome = Outcome::Failed(err);
            }
        }
        self.enter(&label, report.stage);
        report
    }

    /// Stages that need the session.
    fn drive(
        &self,
        session: &mut dyn Session,
        label: &str,
        policy: &Policy,
        report: &mut ReconcileReport,
    ) -> Result<Outcome, ReconcileError> {
        self.enter(label, Stage::Observing);
        let observed = observe(session, &self.dialect, &self.parser)
            .map_err(|failure| ReconcileError::observation(label, failure))?;

        self.enter(label, Stage::Diffing);
        let deviation = diff(&observed, policy);
        if !deviation.is_empty() {
            log::info!(
                "{label}: {} unauthorized principal(s), {} unauthorized secret(s)",
                deviation.unauthorized_principals.len(),
                deviation.unauthorized_secrets.len()
            );
        }

        self.enter(label, Stage::Planning);
        let plan = planner::plan(&deviation, policy, &self.dialect);
        report.deviation = Some(deviation);

        if self.options.dry_run {
            report.plan = Some(plan);
            return Ok(Outcome::Planned);
        }

        self.enter(label, Stage::Applying);
        let result = executor::apply(session, &plan, label, self.observer);
        report.plan = Some(plan);
        result
            .map(Outcome::Applied)
            .map_err(|failure| ReconcileError::partial_apply(label, failure))
    }

    fn enter(&self, label: &str, stage: Stage) {
        log::debug!("{label}: {stage}");
        self.observer.on_stage(label, stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devicekit::backend::mock::{MockConnector, MockDevice};
    use devicekit::{ErrorCategory, Secret};
    use std::sync::Mutex;

    const USERS: &str = "show running-config | include ^username";
    const COMMUNITIES: &str = "show running-config | include ^snmp-server community";

    fn target() -> TargetHandle {
        TargetHandle::new("edge1", "10.0.0.1", 22, "expert")
    }

    fn policy() -> Policy {
        Policy::builder("pmm_noc#")
            .authorize(["expert_auto"])
            .local_admin("expert", Secret::new("AlwaysNMotion"))
            .builtin_secrets(["ILMI"])
            .acl_reference("MGMT_ACCESS")
            .build()
            .unwrap()
    }

    fn drifted() -> MockDevice {
        MockDevice::new()
            .respond(USERS, "username expert privilege 15\nusername mallory privilege 1")
            .respond(COMMUNITIES, "snmp-server community public RO\nsnmp-server community ILMI RO")
    }

    #[derive(Default)]
    struct Stages(Mutex<Vec<Stage>>);

    impl StageObserver for Stages {
        fn on_stage(&self, _target: &str, stage: Stage) {
            self.0.lock().unwrap().push(stage);
        }
    }

    #[test]
    fn test_full_run_walks_every_stage() {
        let connector = MockConnector::new(drifted());
        let stages = Stages::default();
        let reconciler = Reconciler::new(&connector, Dialect::default())
            .unwrap()
            .with_observer(&stages);

        let report = reconciler.run(&target(), &policy());

        assert!(report.is_success());
        assert_eq!(report.apply_result().unwrap().applied, 4);
        assert_eq!(
            *stages.0.lock().unwrap(),
            [
                Stage::Connecting,
                Stage::Observing,
                Stage::Diffing,
                Stage::Planning,
                Stage::Applying,
                Stage::Done,
            ]
        );
        assert_eq!(connector.log().close_count(), 1);
    }

    #[test]
    fn test_dry_run_sends_no_changes() {
        let connector = MockConnector::new(drifted());
        let reconciler = Reconciler::new(&connector, Dialect::default())
            .unwrap()
            .with_options(ReconcileOptions { dry_run: true });

        let report = reconciler.run(&target(), &policy());

        assert!(report.is_success());
        assert!(matches!(report.outcome, Outcome::Planned));
        assert_eq!(report.plan.as_ref().unwrap().len(), 4);
        assert!(connector.log().batches().is_empty());
        assert_eq!(connector.log().close_count(), 1);
    }

    #[test]
    fn test_observation_failure_closes_once() {
        let connector = MockConnector::new(drifted().fail_read(COMMUNITIES));
        let reconciler = Reconciler::new(&connector, Dialect::default()).unwrap();

        let report = reconciler.run(&target(), &policy());

        assert_eq!(report.stage, Stage::Failed);
        assert_eq!(report.error().unwrap().stage(), Stage::Observing);
        assert!(report.deviation.is_none());
        assert_eq!(connector.log().connect_count(), 1);
        assert_eq!(connector.log().close_count(), 1);
    }

    #[test]
    fn test_connection_failure_never_closes() {
        let connector = MockConnector::new(MockDevice::new().unreachable());
        let reconciler = Reconciler::new(&connector, Dialect::default()).unwrap();

        let report = reconciler.run(&target(), &policy());

        let err = report.error().unwrap();
        assert_eq!(err.stage(), Stage::Connecting);
        assert_eq!(err.category(), ErrorCategory::Connection);
        assert_eq!(err.target(), "edge1 (10.0.0.1:22)");
        assert_eq!(connector.log().close_count(), 0);
    }

    #[test]
    fn test_partial_apply_keeps_plan_and_deviation() {
        let connector = MockConnector::new(drifted().fail_change_at(1));
        let reconciler = Reconciler::new(&connector, Dialect::default()).unwrap();

        let report = reconciler.run(&target(), &policy());

        let err = report.error().unwrap();
        assert_eq!(err.stage(), Stage::Applying);
        assert_eq!(err.applied(), 1);
        assert!(report.plan.is_some());
        assert!(report.deviation.is_some());
        assert_eq!(connector.log().close_count(), 1);
    }
}
