//! # Reconcile
//!
//! Access-compliance reconciliation for network devices.
//!
//! A run reads the live access configuration of one target, compares it to a
//! [`Policy`], and submits the commands that bring the target back into
//! compliance.
//!
//! ## Core Concepts
//!
//! - **Policy**: authorized principals, the local admin, the one compliant
//!   secret, tolerated built-in secrets, and the access list the secret is
//!   bound to
//! - **ObservedState**: principals and secrets actually configured, read fresh
//!   on every run
//! - **Deviation**: what the target has that the policy does not allow
//! - **RemediationPlan**: removals first, then unconditional enforcement
//! - **Reconciler**: the `Connecting -> ... -> Done | Failed` state machine
//!
//! ## Example
//!
//! ```no_run
//! use devicekit::backend::ssh::SshConnector;
//! use devicekit::{Secret, SessionOptions, TargetHandle};
//! use reconcile::{Dialect, Policy, Reconciler};
//!
//! let policy = Policy::builder("pmm_noc#")
//!     .authorize(["expert_auto", "admin_auto"])
//!     .local_admin("expert", Secret::new("AlwaysNMotion"))
//!     .builtin_secrets(["ILMI"])
//!     .acl_reference("MGMT_ACCESS")
//!     .build()?;
//!
//! let connector = SshConnector::new(SessionOptions::default());
//! let reconciler = Reconciler::new(&connector, Dialect::default())?;
//! let target = TargetHandle::new("edge1", "192.168.5.118", 22, "expert");
//!
//! let report = reconciler.run(&target, &policy);
//! println!("{}: {}", report.target, report.stage);
//! # Ok::<(), reconcile::SetupError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod executor;
pub mod fleet;
pub mod inspect;
pub mod parser;
pub mod planner;
pub mod policy;
pub mod reconciler;
pub mod types;

pub use context::{NoObserver, StageObserver};
pub use dialect::Dialect;
pub use diff::diff;
pub use error::{ApplyFailure, ReadFailure, ReconcileError, SetupError};
pub use executor::apply;
pub use fleet::{Run, reconcile_fleet};
pub use inspect::observe;
pub use parser::FactParser;
pub use planner::plan;
pub use policy::{LocalAdmin, Policy, PolicyBuilder};
pub use reconciler::Reconciler;
pub use types::{
    Action, ApplyResult, Deviation, ObservedState, Outcome, PlannedCommand, ReconcileOptions,
    ReconcileReport, RemediationPlan, ResourceClass, Stage,
};
