//! Differ - compares observed state against policy

use crate::policy::Policy;
use crate::types::{Deviation, ObservedState};

/// Compute what the target has that policy does not allow.
///
/// Pure set subtraction; the result depends only on set contents.
pub fn diff(observed: &ObservedState, policy: &Policy) -> Deviation {
    Deviation {
        unauthorized_principals: observed
            .principals
            .iter()
            .filter(|p| !policy.authorizes(p))
            .cloned()
            .collect(),
        unauthorized_secrets: observed
            .secrets
            .iter()
            .filter(|s| !policy.tolerates_secret(s))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devicekit::Secret;
    use std::collections::BTreeSet;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn observed(principals: &[&str], secrets: &[&str]) -> ObservedState {
        ObservedState {
            principals: set(principals),
            secrets: set(secrets),
        }
    }

    #[test]
    fn test_unauthorized_principals() {
        let policy = Policy::builder("rw-secret")
            .authorize(["alice", "bob"])
            .build()
            .unwrap();
        let deviation = diff(&observed(&["alice", "mallory"], &[]), &policy);
        assert_eq!(deviation.unauthorized_principals, set(&["mallory"]));
        assert!(deviation.unauthorized_secrets.is_empty());
    }

    #[test]
    fn test_unauthorized_secrets() {
        let policy = Policy::builder("rw-secret")
            .builtin_secrets(["ILMI"])
            .build()
            .unwrap();
        let deviation = diff(&observed(&[], &["public", "ILMI", "rw-secret"]), &policy);
        assert_eq!(deviation.unauthorized_secrets, set(&["public"]));
    }

    #[test]
    fn test_compliant_state_has_no_deviation() {
        let policy = Policy::builder("rw-secret")
            .authorize(["alice"])
            .local_admin("expert", Secret::new("pw"))
            .build()
            .unwrap();
        let deviation = diff(&observed(&["alice", "expert"], &["rw-secret"]), &policy);
        assert!(deviation.is_empty());
    }

    #[test]
    fn test_diff_is_repeatable() {
        let policy = Policy::builder("rw-secret").authorize(["a"]).build().unwrap();
        let state = observed(&["a", "b", "c"], &["x", "rw-secret"]);
        assert_eq!(diff(&state, &policy), diff(&state, &policy));
    }
}
