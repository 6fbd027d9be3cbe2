//! Planner - turns a deviation into ordered corrective commands
//!
//! Plan shape:
//! 1. one removal per unauthorized principal
//! 2. the local admin re-assertion (when configured)
//! 3. one removal per unauthorized secret
//! 4. the compliant secret assertion
//!
//! Enforcement is unconditional, so a compliant target still gets a
//! non-empty plan that refreshes the admin credential and the secret binding.

use crate::dialect::{Dialect, render};
use crate::policy::Policy;
use crate::types::{Action, Deviation, PlannedCommand, RemediationPlan, ResourceClass};

const MASK: &str = "****";

/// Build the remediation plan for a deviation.
pub fn plan(deviation: &Deviation, policy: &Policy, dialect: &Dialect) -> RemediationPlan {
    let mut steps = Vec::with_capacity(deviation.total() + 2);

    for principal in &deviation.unauthorized_principals {
        let command = render(&dialect.remove_principal, &[("name", principal)]);
        steps.push(step(ResourceClass::Principal, Action::Remove, command.clone(), command));
    }

    if let Some(admin) = policy.local_admin() {
        let template = &dialect.enforce_principal;
        steps.push(step(
            ResourceClass::Principal,
            Action::Enforce,
            render(template, &[("name", &admin.name), ("secret", admin.secret.expose())]),
            render(template, &[("name", &admin.name), ("secret", MASK)]),
        ));
    }

    for secret in &deviation.unauthorized_secrets {
        let command = render(&dialect.remove_secret, &[("secret", secret)]);
        steps.push(step(ResourceClass::Secret, Action::Remove, command.clone(), command));
    }

    let compliant = policy.compliant_secret().expose();
    let (command, display) = match policy.acl_reference() {
        Some(acl) => (
            render(&dialect.enforce_secret, &[("secret", compliant), ("acl", acl)]),
            render(&dialect.enforce_secret, &[("secret", MASK), ("acl", acl)]),
        ),
        None => (
            render(&dialect.enforce_secret_no_acl, &[("secret", compliant)]),
            render(&dialect.enforce_secret_no_acl, &[("secret", MASK)]),
        ),
    };
    steps.push(step(ResourceClass::Secret, Action::Enforce, command, display));

    RemediationPlan { steps }
}

fn step(class: ResourceClass, action: Action, command: String, display: String) -> PlannedCommand {
    PlannedCommand {
        class,
        action,
        command,
        display,
    }
}
