//! Run observer callbacks
//!
//! These traits let a front end follow a run (progress bars, logs) without
//! the engine depending on any presentation crate.

use crate::types::Stage;

/// Observer for reconciliation progress
///
/// Implementations are shared across worker threads during fleet runs.
pub trait StageObserver: Send + Sync {
    /// Called on every state-machine transition, including the terminal one
    fn on_stage(&self, target: &str, stage: Stage);

    /// Called after each change command is accepted
    ///
    /// # Arguments
    /// * `target` - Target label
    /// * `index` - One-based position of the command in the plan
    /// * `total` - Number of commands in the plan
    /// * `display` - The command with credentials masked
    fn on_command_applied(&self, _target: &str, _index: usize, _total: usize, _display: &str) {}
}

/// No-op observer
pub struct NoObserver;

impl StageObserver for NoObserver {
    fn on_stage(&self, _target: &str, _stage: Stage) {}
}
