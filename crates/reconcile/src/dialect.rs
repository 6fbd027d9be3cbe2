//! Command templates and parse keywords for a device platform.
//!
//! Templates use `{name}`, `{secret}` and `{acl}` placeholders. The default
//! dialect targets Cisco IOS-XE.

use serde::{Deserialize, Serialize};

/// Platform-specific commands used by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dialect {
    /// Read command listing configured principals
    pub principal_listing: String,
    /// Read command listing configured secrets
    pub secret_listing: String,
    /// Keyword that starts a principal declaration line
    pub principal_keyword: String,
    /// Keyword that starts a secret declaration line
    pub secret_keyword: String,
    /// Accepted field names for the secret in structured records, in
    /// preference order
    pub secret_fields: Vec<String>,
    /// Remove a principal (`{name}`)
    pub remove_principal: String,
    /// (Re)assert the local admin (`{name}`, `{secret}`)
    pub enforce_principal: String,
    /// Remove a secret (`{secret}`)
    pub remove_secret: String,
    /// Assert the compliant secret bound to an access list (`{secret}`, `{acl}`)
    pub enforce_secret: String,
    /// Assert the compliant secret without an access list (`{secret}`)
    pub enforce_secret_no_acl: String,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            principal_listing: "show running-config | include ^username".to_string(),
            secret_listing: "show running-config | include ^snmp-server community".to_string(),
            principal_keyword: "username".to_string(),
            secret_keyword: "snmp-server community".to_string(),
            secret_fields: vec![
                "community".to_string(),
                "snmp_community".to_string(),
                "community_string".to_string(),
            ],
            remove_principal: "no username {name}".to_string(),
            enforce_principal: "username {name} privilege 15 secret {secret}".to_string(),
            remove_secret: "no snmp-server community {secret}".to_string(),
            enforce_secret: "snmp-server community {secret} RO {acl}".to_string(),
            enforce_secret_no_acl: "snmp-server community {secret} RO".to_string(),
        }
    }
}

/// Substitute `{key}` placeholders in a template.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}
