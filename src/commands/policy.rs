//! `warden policy` - show effective policies

use super::load_config;
use crate::Context;
use crate::config::{self, PolicyConfig, WardenConfig};
use crate::ui;
use anyhow::{Result, bail};
use reconcile::{Deviation, Policy};

pub fn run(ctx: &Context, name: Option<&str>) -> Result<()> {
    let config = load_config(ctx)?;

    let selected: Vec<(&String, &PolicyConfig)> = match name {
        Some(name) => match config.policies.get_key_value(name) {
            Some(entry) => vec![entry],
            None => bail!("Unknown policy '{name}'"),
        },
        None => config.policies.iter().collect(),
    };

    if selected.is_empty() {
        ui::warn("No policies configured");
        return Ok(());
    }

    let mut broken = 0;
    for (name, policy_config) in selected {
        ui::header(&format!("Policy: {name}"));
        match config.build_policy(name, &config::process_env) {
            Ok(policy) => show(&config, name, policy_config, &policy),
            Err(e) => {
                broken += 1;
                ui::error(&format!("{e:#}"));
            }
        }
    }

    if broken > 0 {
        bail!("{} could not be built", ui::count(broken, "policy definition"));
    }
    Ok(())
}

fn show(config: &WardenConfig, name: &str, source: &PolicyConfig, policy: &Policy) {
    ui::kv("Authorized users", &ui::list(policy.authorized_principals()));

    match (policy.local_admin(), &source.local_admin_secret_env) {
        (Some(admin), Some(var)) => ui::kv(
            "Local admin",
            &format!("{} (secret from ${var})", admin.name),
        ),
        (Some(admin), None) => ui::kv("Local admin", &admin.name),
        (None, _) => ui::kv("Local admin", "(none)"),
    }

    let community = match &source.compliant_secret_env {
        Some(var) => format!("**** (from ${var})"),
        None => "**** (inline)".to_string(),
    };
    ui::kv("Community", &community);
    ui::kv("Built-in communities", &ui::list(policy.builtin_secrets()));
    ui::kv("Access list", policy.acl_reference().unwrap_or("(none)"));

    let targets: Vec<&str> = config
        .targets
        .iter()
        .filter(|t| t.policy == name)
        .map(|t| t.name.as_str())
        .collect();
    ui::kv("Targets", &ui::list(targets));

    ui::section("Enforced on every run");
    let plan = reconcile::plan(&Deviation::default(), policy, &config.dialect);
    for line in plan.display_lines() {
        ui::dim(&line);
    }
}
