//! warden configuration file
//!
//! ```toml
//! [settings]
//! jobs = 4
//!
//! [policies.default]
//! authorized_principals = ["expert_auto", "admin_auto"]
//! local_admin = "expert"
//! local_admin_secret_env = "WARDEN_ADMIN_SECRET"
//! compliant_secret_env = "WARDEN_SNMP_COMMUNITY"
//!
//! [[targets]]
//! name = "edge1"
//! address = "192.168.5.118"
//! username = "expert"
//! password_env = "XE_VAR_PASS"
//! ```
//!
//! Credentials are never stored in the file; it only names the environment
//! variables that hold them.

use anyhow::{Context, Result, bail};
use devicekit::{Credential, Secret, SessionOptions, TargetHandle};
use reconcile::{Dialect, Policy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment lookup, injectable for tests.
pub type Env<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Read a variable from the process environment.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

// ============================================================================
// Main Config Schema
// ============================================================================

/// The warden configuration structure
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Global settings
    #[serde(default)]
    pub settings: Settings,

    /// Named policies
    #[serde(default)]
    pub policies: BTreeMap<String, PolicyConfig>,

    /// Command templates and parse keywords
    #[serde(default)]
    pub dialect: Dialect,

    /// Managed devices
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    /// Targets reconciled in parallel
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// OpenSSH client to run
    #[serde(default = "default_ssh_program")]
    pub ssh_program: String,

    /// Extra arguments passed to ssh (e.g. `["-o", "KexAlgorithms=+diffie-hellman-group14-sha1"]`)
    #[serde(default)]
    pub ssh_args: Vec<String>,

    /// Command that saves the running configuration
    #[serde(default = "default_persist_command")]
    pub persist_command: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            ssh_program: default_ssh_program(),
            ssh_args: Vec::new(),
            persist_command: default_persist_command(),
        }
    }
}

fn default_jobs() -> usize {
    4
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    30
}

fn default_ssh_program() -> String {
    "ssh".to_string()
}

fn default_persist_command() -> String {
    "write memory".to_string()
}

/// Policy as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Accounts allowed to exist
    pub authorized_principals: Vec<String>,

    /// Account whose credential is re-asserted on every run
    #[serde(default)]
    pub local_admin: Option<String>,

    /// Variable holding the local admin credential
    #[serde(default)]
    pub local_admin_secret_env: Option<String>,

    /// The compliant community, inline
    #[serde(default)]
    pub compliant_secret: Option<String>,

    /// Variable holding the compliant community
    #[serde(default)]
    pub compliant_secret_env: Option<String>,

    /// Communities always tolerated
    #[serde(default = "default_builtin_secrets")]
    pub builtin_secrets: Vec<String>,

    /// Access list bound to the compliant community (empty for none)
    #[serde(default = "default_acl_reference")]
    pub acl_reference: String,
}

fn default_builtin_secrets() -> Vec<String> {
    vec!["ILMI".to_string()]
}

fn default_acl_reference() -> String {
    "MGMT_ACCESS".to_string()
}

/// One managed device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub username: String,

    /// Variable holding the login password
    #[serde(default)]
    pub password_env: Option<String>,

    /// Private key file (`~` is expanded)
    #[serde(default)]
    pub identity_file: Option<String>,

    /// Policy name
    #[serde(default = "default_policy")]
    pub policy: String,
}

fn default_port() -> u16 {
    22
}

fn default_policy() -> String {
    "default".to_string()
}

impl WardenConfig {
    /// Load and validate the config file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!(
                "Config file not found: {}\n\
                 Create it with a [policies.default] section and at least one [[targets]] entry,\n\
                 or point {} at an existing file.",
                path.display(),
                crate::paths::ENV_CONFIG
            );
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        log::debug!(
            "Loaded {} target(s) and {} policy(ies) from {}",
            config.targets.len(),
            config.policies.len(),
            path.display()
        );
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid TOML format")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.settings.jobs == 0 {
            bail!("settings.jobs must be at least 1");
        }
        if self.settings.connect_timeout_secs == 0 || self.settings.read_timeout_secs == 0 {
            bail!("settings timeouts must be greater than zero");
        }

        for (name, policy) in &self.policies {
            policy
                .validate()
                .with_context(|| format!("Invalid policy '{name}'"))?;
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            if !seen.insert(target.name.as_str()) {
                bail!("Duplicate target name '{}'", target.name);
            }
            target
                .validate()
                .with_context(|| format!("Invalid target '{}'", target.name))?;
            if !self.policies.contains_key(&target.policy) {
                bail!(
                    "Target '{}' uses unknown policy '{}'",
                    target.name,
                    target.policy
                );
            }
        }

        Ok(())
    }

    /// Targets named on the command line, or all of them.
    pub fn select_targets(&self, names: &[String]) -> Result<Vec<&TargetConfig>> {
        if names.is_empty() {
            return Ok(self.targets.iter().collect());
        }
        names
            .iter()
            .map(|name| {
                self.targets
                    .iter()
                    .find(|t| &t.name == name)
                    .with_context(|| format!("Unknown target '{name}'"))
            })
            .collect()
    }

    /// Build the named policy, reading its secrets from `env`.
    pub fn build_policy(&self, name: &str, env: Env<'_>) -> Result<Policy> {
        let config = self
            .policies
            .get(name)
            .with_context(|| format!("Unknown policy '{name}'"))?;
        config
            .build(env)
            .with_context(|| format!("Cannot build policy '{name}'"))
    }

    /// Build every policy used by `targets`, once each.
    pub fn build_policies(
        &self,
        targets: &[&TargetConfig],
        env: Env<'_>,
    ) -> Result<BTreeMap<String, Policy>> {
        let mut policies = BTreeMap::new();
        for target in targets {
            if !policies.contains_key(&target.policy) {
                let policy = self.build_policy(&target.policy, env)?;
                policies.insert(target.policy.clone(), policy);
            }
        }
        Ok(policies)
    }

    /// Session options for every connection.
    pub fn session_options(&self, askpass_program: Option<PathBuf>) -> SessionOptions {
        SessionOptions {
            ssh_program: self.settings.ssh_program.clone(),
            ssh_args: self.settings.ssh_args.clone(),
            connect_timeout: Duration::from_secs(self.settings.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.settings.read_timeout_secs),
            persist_command: self.settings.persist_command.clone(),
            askpass_program,
            ..SessionOptions::default()
        }
    }
}

impl PolicyConfig {
    fn validate(&self) -> Result<()> {
        match (&self.compliant_secret, &self.compliant_secret_env) {
            (Some(_), Some(_)) => {
                bail!("set either compliant_secret or compliant_secret_env, not both")
            }
            (None, None) => bail!("compliant_secret or compliant_secret_env is required"),
            _ => {}
        }
        if self.local_admin.is_some() && self.local_admin_secret_env.is_none() {
            bail!("local_admin requires local_admin_secret_env");
        }
        if self.local_admin.is_none() && self.local_admin_secret_env.is_some() {
            log::warn!("local_admin_secret_env is set without local_admin; it will be ignored");
        }
        Ok(())
    }

    /// Resolve secrets and build the engine policy.
    pub fn build(&self, env: Env<'_>) -> Result<Policy> {
        let compliant = match (&self.compliant_secret, &self.compliant_secret_env) {
            (Some(value), _) => value.clone(),
            (None, Some(var)) => require_env(env, var)?,
            (None, None) => bail!("compliant_secret or compliant_secret_env is required"),
        };

        let mut builder = Policy::builder(compliant)
            .authorize(self.authorized_principals.iter().cloned())
            .builtin_secrets(self.builtin_secrets.iter().cloned())
            .acl_reference(self.acl_reference.clone());

        if let Some(admin) = &self.local_admin {
            let var = self
                .local_admin_secret_env
                .as_deref()
                .context("local_admin requires local_admin_secret_env")?;
            builder = builder.local_admin(admin.clone(), Secret::new(require_env(env, var)?));
        }

        Ok(builder.build()?)
    }
}

impl TargetConfig {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("name must not be empty");
        }
        if self.address.trim().is_empty() {
            bail!("address must not be empty");
        }
        if self.username.trim().is_empty() {
            bail!("username must not be empty");
        }
        if self.port == 0 {
            bail!("port must not be 0");
        }
        if self.password_env.is_some() && self.identity_file.is_some() {
            bail!("set either password_env or identity_file, not both");
        }
        Ok(())
    }

    /// Build a handle, reading the password from `env` when configured.
    pub fn handle(&self, env: Env<'_>) -> Result<TargetHandle> {
        let credential = if let Some(var) = &self.password_env {
            Credential::Password(Secret::new(require_env(env, var)?))
        } else if let Some(path) = &self.identity_file {
            Credential::IdentityFile(crate::paths::expand(path))
        } else {
            Credential::Agent
        };

        Ok(
            TargetHandle::new(&self.name, &self.address, self.port, &self.username)
                .with_credential(credential),
        )
    }
}

fn require_env(env: Env<'_>, var: &str) -> Result<String> {
    match env(var) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => bail!("Environment variable {var} is not set"),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const SAMPLE: &str = r#"
[settings]
jobs = 8

[policies.default]
authorized_principals = ["expert_auto", "admin_auto"]
local_admin = "expert"
local_admin_secret_env = "ADMIN_PW"
compliant_secret_env = "COMMUNITY"

[policies.lab]
authorized_principals = ["lab"]
compliant_secret = "lab-ro"
acl_reference = ""
builtin_secrets = []

[dialect]
enforce_secret = "snmp-server community {secret} RO view MGMT {acl}"

[[targets]]
name = "edge1"
address = "192.168.5.118"
username = "expert"
password_env = "XE_VAR_PASS"

[[targets]]
name = "lab1"
address = "10.9.0.1"
port = 2222
username = "lab"
identity_file = "/keys/lab"
policy = "lab"
"#;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_sample() {
        let config = WardenConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.settings.jobs, 8);
        assert_eq!(config.settings.read_timeout_secs, 30);
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[0].port, 22);
        assert_eq!(config.targets[0].policy, "default");
        assert_eq!(config.policies["default"].builtin_secrets, ["ILMI"]);
        assert_eq!(config.policies["default"].acl_reference, "MGMT_ACCESS");
    }

    #[test]
    fn test_dialect_override_keeps_other_defaults() {
        let config = WardenConfig::parse(SAMPLE).unwrap();
        assert_eq!(
            config.dialect.enforce_secret,
            "snmp-server community {secret} RO view MGMT {acl}"
        );
        assert_eq!(config.dialect.remove_principal, "no username {name}");
    }

    #[test]
    fn test_build_policy_from_env() {
        let config = WardenConfig::parse(SAMPLE).unwrap();
        let env = env_of(&[("ADMIN_PW", "AlwaysNMotion"), ("COMMUNITY", "pmm_noc#")]);
        let policy = config.build_policy("default", &env).unwrap();
        assert!(policy.authorizes("expert"));
        assert!(policy.authorizes("admin_auto"));
        assert_eq!(policy.compliant_secret().expose(), "pmm_noc#");
        assert_eq!(policy.acl_reference(), Some("MGMT_ACCESS"));
    }

    #[test]
    fn test_missing_secret_env_is_an_error() {
        let config = WardenConfig::parse(SAMPLE).unwrap();
        let env = env_of(&[("ADMIN_PW", "AlwaysNMotion")]);
        let err = config.build_policy("default", &env).unwrap_err();
        assert!(format!("{err:#}").contains("COMMUNITY"));
    }

    #[test]
    fn test_inline_secret_without_acl() {
        let config = WardenConfig::parse(SAMPLE).unwrap();
        let policy = config.build_policy("lab", &env_of(&[])).unwrap();
        assert_eq!(policy.acl_reference(), None);
        assert!(policy.builtin_secrets().is_empty());
        assert!(policy.local_admin().is_none());
    }

    #[test]
    fn test_target_handles() {
        let config = WardenConfig::parse(SAMPLE).unwrap();
        let env = env_of(&[("XE_VAR_PASS", "pw")]);

        let edge = config.targets[0].handle(&env).unwrap();
        assert!(matches!(edge.credential(), Credential::Password(_)));
        assert_eq!(edge.to_string(), "edge1 (192.168.5.118:22)");

        let lab = config.targets[1].handle(&env).unwrap();
        assert_eq!(
            lab.credential(),
            &Credential::IdentityFile(PathBuf::from("/keys/lab"))
        );
        assert_eq!(lab.port(), 2222);

        assert!(config.targets[0].handle(&env_of(&[])).is_err());
    }

    #[test]
    fn test_select_targets() {
        let config = WardenConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.select_targets(&[]).unwrap().len(), 2);
        let picked = config.select_targets(&["lab1".to_string()]).unwrap();
        assert_eq!(picked[0].name, "lab1");
        assert!(config.select_targets(&["nope".to_string()]).is_err());
    }

    #[test]
    fn test_build_policies_once_per_name() {
        let config = WardenConfig::parse(SAMPLE).unwrap();
        let env = env_of(&[("ADMIN_PW", "a"), ("COMMUNITY", "c")]);
        let targets = config.select_targets(&[]).unwrap();
        let policies = config.build_policies(&targets, &env).unwrap();
        assert_eq!(policies.len(), 2);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let toml = r#"
[policies.default]
authorized_principals = []
compliant_secret = "x"

[[targets]]
name = "a"
address = "10.0.0.1"
username = "u"
policy = "missing"
"#;
        let err = WardenConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("unknown policy 'missing'"));
    }

    #[test]
    fn test_duplicate_targets_rejected() {
        let toml = r#"
[policies.default]
authorized_principals = []
compliant_secret = "x"

[[targets]]
name = "a"
address = "10.0.0.1"
username = "u"

[[targets]]
name = "a"
address = "10.0.0.2"
username = "u"
"#;
        assert!(WardenConfig::parse(toml).is_err());
    }

    #[test]
    fn test_admin_without_secret_env_rejected() {
        let toml = r#"
[policies.default]
authorized_principals = []
local_admin = "expert"
compliant_secret = "x"
"#;
        let err = WardenConfig::parse(toml).unwrap_err();
        assert!(format!("{err:#}").contains("local_admin_secret_env"));
    }

    #[test]
    fn test_both_secret_sources_rejected() {
        let toml = r#"
[policies.default]
authorized_principals = []
compliant_secret = "x"
compliant_secret_env = "X"
"#;
        assert!(WardenConfig::parse(toml).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = WardenConfig::load(file.path()).unwrap();
        assert_eq!(config.targets.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = WardenConfig::load(&dir.path().join("config.toml")).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_session_options_from_settings() {
        let config = WardenConfig::parse(SAMPLE).unwrap();
        let options = config.session_options(Some(PathBuf::from("/usr/bin/warden")));
        assert_eq!(options.read_timeout, Duration::from_secs(30));
        assert_eq!(options.persist_command, "write memory");
        assert_eq!(options.askpass_program, Some(PathBuf::from("/usr/bin/warden")));
    }
}
