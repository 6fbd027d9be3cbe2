//! Desired access state for a target.
//!
//! A [`Policy`] is built once by the caller and shared read-only across
//! runs. Construction enforces the invariants the planner relies on: the
//! compliant secret is never blank, and the local admin (when configured)
//! is always an authorized principal.

use crate::error::SetupError;
use devicekit::Secret;
use std::collections::BTreeSet;

/// The distinguished local administrator whose credential is refreshed on
/// every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAdmin {
    /// Account name
    pub name: String,
    /// Credential asserted for the account
    pub secret: Secret,
}

/// Desired-state document for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    authorized_principals: BTreeSet<String>,
    local_admin: Option<LocalAdmin>,
    compliant_secret: Secret,
    builtin_secrets: BTreeSet<String>,
    acl_reference: Option<String>,
}

impl Policy {
    /// Start building a policy around the only compliant secret.
    pub fn builder(compliant_secret: impl Into<String>) -> PolicyBuilder {
        PolicyBuilder {
            authorized_principals: BTreeSet::new(),
            local_admin: None,
            compliant_secret: Secret::new(compliant_secret),
            builtin_secrets: BTreeSet::new(),
            acl_reference: None,
        }
    }

    /// Principals allowed to exist (includes the local admin).
    pub fn authorized_principals(&self) -> &BTreeSet<String> {
        &self.authorized_principals
    }

    /// The local admin, if configured.
    pub fn local_admin(&self) -> Option<&LocalAdmin> {
        self.local_admin.as_ref()
    }

    /// The only secret value considered compliant.
    pub fn compliant_secret(&self) -> &Secret {
        &self.compliant_secret
    }

    /// Secrets always tolerated (platform defaults).
    pub fn builtin_secrets(&self) -> &BTreeSet<String> {
        &self.builtin_secrets
    }

    /// Access list the compliant secret is bound to.
    pub fn acl_reference(&self) -> Option<&str> {
        self.acl_reference.as_deref()
    }

    /// Whether `principal` may exist on the target.
    pub fn authorizes(&self, principal: &str) -> bool {
        self.authorized_principals.contains(principal)
    }

    /// Whether `secret` may exist on the target.
    pub fn tolerates_secret(&self, secret: &str) -> bool {
        secret == self.compliant_secret.expose() || self.builtin_secrets.contains(secret)
    }
}

/// Builder for [`Policy`].
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    authorized_principals: BTreeSet<String>,
    local_admin: Option<LocalAdmin>,
    compliant_secret: Secret,
    builtin_secrets: BTreeSet<String>,
    acl_reference: Option<String>,
}

impl PolicyBuilder {
    /// Authorize principals.
    pub fn authorize<I, S>(mut self, principals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authorized_principals
            .extend(principals.into_iter().map(Into::into));
        self
    }

    /// Configure the local admin and its credential.
    pub fn local_admin(mut self, name: impl Into<String>, secret: Secret) -> Self {
        self.local_admin = Some(LocalAdmin {
            name: name.into(),
            secret,
        });
        self
    }

    /// Tolerate built-in secrets.
    pub fn builtin_secrets<I, S>(mut self, secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.builtin_secrets
            .extend(secrets.into_iter().map(Into::into));
        self
    }

    /// Bind the compliant secret to an access list.
    pub fn acl_reference(mut self, acl: impl Into<String>) -> Self {
        let acl = acl.into();
        self.acl_reference = (!acl.trim().is_empty()).then_some(acl);
        self
    }

    /// Validate and build.
    pub fn build(mut self) -> Result<Policy, SetupError> {
        if self.compliant_secret.is_blank() {
            return Err(SetupError::InvalidPolicy(
                "compliant secret must not be empty".to_string(),
            ));
        }

        if let Some(admin) = &self.local_admin {
            if admin.name.trim().is_empty() {
                return Err(SetupError::InvalidPolicy(
                    "local admin name must not be empty".to_string(),
                ));
            }
            if admin.secret.is_blank() {
                return Err(SetupError::InvalidPolicy(format!(
                    "local admin '{}' has an empty credential",
                    admin.name
                )));
            }
            if self.authorized_principals.insert(admin.name.clone()) {
                log::debug!("Authorizing local admin '{}'", admin.name);
            }
        }

        if self.authorized_principals.iter().any(|p| p.trim().is_empty()) {
            return Err(SetupError::InvalidPolicy(
                "authorized principals must not contain empty names".to_string(),
            ));
        }

        // Facts are read back as single tokens, so a value with whitespace
        // would never be observed as configured.
        if has_whitespace(self.compliant_secret.expose()) {
            return Err(SetupError::InvalidPolicy(
                "compliant secret must be a single word".to_string(),
            ));
        }
        if self.builtin_secrets.iter().any(|s| has_whitespace(s)) {
            return Err(SetupError::InvalidPolicy(
                "built-in secrets must be single words".to_string(),
            ));
        }
        let spaced = self
            .authorized_principals
            .iter()
            .chain(&self.acl_reference)
            .find(|value| has_whitespace(value));
        if let Some(value) = spaced {
            return Err(SetupError::InvalidPolicy(format!(
                "'{value}' contains whitespace"
            )));
        }

        Ok(Policy {
            authorized_principals: self.authorized_principals,
            local_admin: self.local_admin,
            compliant_secret: self.compliant_secret,
            builtin_secrets: self.builtin_secrets,
            acl_reference: self.acl_reference,
        })
    }
}

fn has_whitespace(value: &str) -> bool {
    value.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_admin_is_always_authorized() {
        let policy = Policy::builder("pmm_noc#")
            .authorize(["expert_auto"])
            .local_admin("expert", Secret::new("AlwaysNMotion"))
            .build()
            .unwrap();
        assert!(policy.authorizes("expert"));
        assert!(policy.authorizes("expert_auto"));
    }

    #[test]
    fn test_blank_compliant_secret_is_rejected() {
        let err = Policy::builder("  ").build().unwrap_err();
        assert!(matches!(err, SetupError::InvalidPolicy(_)));
    }

    #[test]
    fn test_blank_admin_credential_is_rejected() {
        let err = Policy::builder("rw-secret")
            .local_admin("expert", Secret::new(""))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("expert"));
    }

    #[test]
    fn test_tolerated_secrets() {
        let policy = Policy::builder("rw-secret")
            .builtin_secrets(["ILMI"])
            .build()
            .unwrap();
        assert!(policy.tolerates_secret("rw-secret"));
        assert!(policy.tolerates_secret("ILMI"));
        assert!(!policy.tolerates_secret("public"));
    }

    #[test]
    fn test_blank_acl_means_none() {
        let policy = Policy::builder("x").acl_reference("").build().unwrap();
        assert_eq!(policy.acl_reference(), None);
        let policy = Policy::builder("x").acl_reference("MGMT_ACCESS").build().unwrap();
        assert_eq!(policy.acl_reference(), Some("MGMT_ACCESS"));
    }

    #[test]
    fn test_values_with_whitespace_are_rejected() {
        let err = Policy::builder("my secret").build().unwrap_err();
        assert!(matches!(err, SetupError::InvalidPolicy(_)));
        assert!(!err.to_string().contains("my secret"));

        let err = Policy::builder("rw-secret")
            .local_admin("net admin", Secret::new("pw"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("net admin"));

        assert!(Policy::builder("rw-secret").authorize(["ops team"]).build().is_err());
        let err = Policy::builder("rw-secret")
            .builtin_secrets(["IL MI"])
            .build()
            .unwrap_err();
        assert!(!err.to_string().contains("IL MI"));
        assert!(Policy::builder("rw-secret").acl_reference("MGMT ACCESS").build().is_err());
    }
}
