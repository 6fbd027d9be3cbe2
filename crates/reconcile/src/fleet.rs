//! Fleet runner - reconciles many targets in parallel

use crate::error::SetupError;
use crate::policy::Policy;
use crate::reconciler::Reconciler;
use crate::types::ReconcileReport;
use devicekit::TargetHandle;
use rayon::prelude::*;

/// One target paired with the policy it must satisfy.
#[derive(Debug, Clone)]
pub struct Run<'p> {
    /// Target to reconcile
    pub target: TargetHandle,
    /// Policy, shared read-only with other runs
    pub policy: &'p Policy,
}

/// Reconcile every run with at most `jobs` targets in flight.
///
/// Runs are independent: one target failing never stops the others.
/// Reports come back in input order.
pub fn reconcile_fleet(
    reconciler: &Reconciler<'_>,
    runs: &[Run<'_>],
    jobs: usize,
) -> Result<Vec<ReconcileReport>, SetupError> {
    let jobs = jobs.max(1);
    log::info!("Reconciling {} target(s) with {jobs} worker(s)", runs.len());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| SetupError::WorkerPool(e.to_string()))?;

    Ok(pool.install(|| {
        runs.par_iter()
            .map(|run| reconciler.run(&run.target, run.policy))
            .collect()
    }))
}
