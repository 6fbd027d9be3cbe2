//! Core types for device sessions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A structured record produced by a parsing backend (one row of a table).
pub type Record = BTreeMap<String, String>;

/// A secret value that never appears in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value. Only call this where the value must be sent.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

/// How a session authenticates to the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Default identities and the running ssh-agent
    Agent,
    /// A private key file
    IdentityFile(PathBuf),
    /// A password, supplied to ssh through askpass
    Password(Secret),
}

/// Identifies one managed device.
///
/// Immutable once constructed; the caller owns it for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetHandle {
    name: String,
    address: String,
    port: u16,
    username: String,
    credential: Credential,
}

impl TargetHandle {
    /// Create a handle authenticating with the default identities.
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        username: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
            username: username.into(),
            credential: Credential::Agent,
        }
    }

    /// Set the credential.
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }

    /// Inventory name of the target.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host name or IP address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// SSH port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Login user.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Credential reference.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }
}

impl fmt::Display for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.address, self.port)
    }
}

/// Options shared by every session a connector opens.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// OpenSSH client executable
    pub ssh_program: String,
    /// Extra `-o` style arguments passed verbatim to ssh
    pub ssh_args: Vec<String>,
    /// Deadline for the login prompt
    pub connect_timeout: Duration,
    /// Deadline for each read command
    pub read_timeout: Duration,
    /// Sent when the device asks for confirmation
    pub confirm_response: String,
    /// Commands run once after login (paging off, etc.)
    pub setup_commands: Vec<String>,
    /// Command used by `persist`
    pub persist_command: String,
    /// Program ssh runs to obtain a password (usually the current executable)
    pub askpass_program: Option<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            ssh_program: "ssh".to_string(),
            ssh_args: Vec::new(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            confirm_response: "\n".to_string(),
            setup_commands: vec![
                "terminal length 0".to_string(),
                "terminal width 0".to_string(),
            ],
            persist_command: "write memory".to_string(),
            askpass_program: None,
        }
    }
}

/// Outcome of a successful change batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeOutcome {
    /// Number of commands applied
    pub applied: usize,
    /// Device output collected while applying
    pub output: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("AlwaysNMotion");
        assert_eq!(format!("{secret:?}"), "Secret(****)");
        assert_eq!(secret.expose(), "AlwaysNMotion");
    }

    #[test]
    fn test_credential_debug_hides_password() {
        let cred = Credential::Password(Secret::new("hunter2"));
        assert!(!format!("{cred:?}").contains("hunter2"));
    }

    #[test]
    fn test_target_display() {
        let target = TargetHandle::new("edge1", "192.168.5.118", 22, "expert");
        assert_eq!(target.to_string(), "edge1 (192.168.5.118:22)");
        assert_eq!(target.credential(), &Credential::Agent);
    }
}
