//! Error types for reconciliation.
//!
//! Every error that ends a run carries the target identity, the stage that
//! was reached, and the underlying session error. Persist failures are not
//! errors; they are recorded on [`crate::ApplyResult`].

use crate::types::Stage;
use devicekit::ErrorCategory;
use thiserror::Error;

/// Problems with inputs, detected before any target is contacted.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The policy violates an invariant
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    /// A dialect keyword could not be turned into a matcher
    #[error("invalid dialect keyword `{keyword}`: {source}")]
    InvalidKeyword {
        /// The offending keyword
        keyword: String,
        /// Regex compilation error
        #[source]
        source: regex::Error,
    },

    /// The worker pool for fleet runs could not be created
    #[error("failed to create worker pool: {0}")]
    WorkerPool(String),
}

/// A read command failed while observing a target.
#[derive(Debug, Error)]
#[error("read `{command}` failed: {source}")]
pub struct ReadFailure {
    /// The read command
    pub command: String,
    /// Session error
    #[source]
    pub source: devicekit::Error,
}

/// A change command failed while applying a plan.
#[derive(Debug, Error)]
#[error("`{failing_command}` failed after {applied} command(s) applied: {source}")]
pub struct ApplyFailure {
    /// Commands applied before the failure
    pub applied: usize,
    /// The failing command, credentials masked
    pub failing_command: String,
    /// Session error
    #[source]
    pub source: devicekit::Error,
}

/// Errors that end a reconciliation run.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Could not establish or authenticate a session
    #[error("{target}: connection failed: {source}")]
    Connection {
        /// Target label
        target: String,
        /// Session error
        #[source]
        source: devicekit::Error,
    },

    /// A read command failed; no partial state is reported
    #[error("{target}: observation failed on `{command}`: {source}")]
    Observation {
        /// Target label
        target: String,
        /// The read command
        command: String,
        /// Session error
        #[source]
        source: devicekit::Error,
    },

    /// A change command failed mid-plan
    #[error("{target}: apply stopped at `{failing_command}` after {applied} command(s): {source}")]
    PartialApply {
        /// Target label
        target: String,
        /// Commands applied before the failure
        applied: usize,
        /// The failing command, credentials masked
        failing_command: String,
        /// Session error
        #[source]
        source: devicekit::Error,
    },
}

impl ReconcileError {
    pub(crate) fn observation(target: &str, failure: ReadFailure) -> Self {
        Self::Observation {
            target: target.to_string(),
            command: failure.command,
            source: failure.source,
        }
    }

    pub(crate) fn partial_apply(target: &str, failure: ApplyFailure) -> Self {
        Self::PartialApply {
            target: target.to_string(),
            applied: failure.applied,
            failing_command: failure.failing_command,
            source: failure.source,
        }
    }

    /// The stage the run was in when it failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Connection { .. } => Stage::Connecting,
            Self::Observation { .. } => Stage::Observing,
            Self::PartialApply { .. } => Stage::Applying,
        }
    }

    /// Target label.
    pub fn target(&self) -> &str {
        match self {
            Self::Connection { target, .. }
            | Self::Observation { target, .. }
            | Self::PartialApply { target, .. } => target,
        }
    }

    /// Category of the underlying session error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { source, .. }
            | Self::Observation { source, .. }
            | Self::PartialApply { source, .. } => source.category(),
        }
    }

    /// Commands applied before the failure (zero unless applying).
    pub fn applied(&self) -> usize {
        match self {
            Self::PartialApply { applied, .. } => *applied,
            _ => 0,
        }
    }
}
