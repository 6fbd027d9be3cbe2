pub mod apply;
pub mod check;
pub mod policy;

use crate::Context;
use crate::config::{self, WardenConfig};
use crate::paths;
use crate::progress::FleetProgress;
use anyhow::{Context as _, Result};
use devicekit::TargetHandle;
use devicekit::backend::ssh::SshConnector;
use reconcile::{Policy, ReconcileOptions, ReconcileReport, Reconciler, Run, reconcile_fleet};
use std::collections::BTreeMap;

/// Load the config file named by the flag or the environment.
pub fn load_config(ctx: &Context) -> Result<WardenConfig> {
    let path = paths::config_file(ctx.config.as_deref())?;
    WardenConfig::load(&path)
}

/// Selected targets with their resolved credentials and policies.
pub struct Fleet {
    config: WardenConfig,
    targets: Vec<(TargetHandle, String)>,
    policies: BTreeMap<String, Policy>,
}

impl Fleet {
    /// Resolve `names` (all targets when empty). Every secret is read from
    /// the environment here, before any device is contacted.
    pub fn prepare(ctx: &Context, names: &[String]) -> Result<Self> {
        let config = load_config(ctx)?;
        let selected = config.select_targets(names)?;
        if selected.is_empty() {
            anyhow::bail!("No targets configured");
        }

        let env = config::process_env;
        let policies = config.build_policies(&selected, &env)?;
        let targets = selected
            .iter()
            .map(|t| {
                let handle = t
                    .handle(&env)
                    .with_context(|| format!("Invalid target '{}'", t.name))?;
                Ok((handle, t.policy.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config,
            targets,
            policies,
        })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Reconcile the targets at `indices` (all when `None`).
    pub fn reconcile(
        &self,
        options: ReconcileOptions,
        jobs: Option<usize>,
        indices: Option<&[usize]>,
        show_progress: bool,
    ) -> Result<Vec<ReconcileReport>> {
        let askpass = std::env::current_exe().ok();
        let connector = SshConnector::new(self.config.session_options(askpass));

        let indices: Vec<usize> =
            indices.map_or_else(|| (0..self.targets.len()).collect(), <[usize]>::to_vec);
        let runs = indices
            .iter()
            .map(|&i| self.run_for(i))
            .collect::<Result<Vec<_>>>()?;

        let progress = FleetProgress::new(runs.len(), show_progress);
        let reconciler = Reconciler::new(&connector, self.config.dialect.clone())?
            .with_options(options)
            .with_observer(&progress);

        let jobs = jobs.unwrap_or(self.config.settings.jobs);
        let reports = reconcile_fleet(&reconciler, &runs, jobs)?;
        progress.finish();
        Ok(reports)
    }

    fn run_for(&self, index: usize) -> Result<Run<'_>> {
        let (target, policy_name) = &self.targets[index];
        let policy = self
            .policies
            .get(policy_name)
            .with_context(|| format!("Policy '{policy_name}' was not built"))?;
        Ok(Run {
            target: target.clone(),
            policy,
        })
    }
}
