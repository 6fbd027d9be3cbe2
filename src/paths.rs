//! Config file location
//!
//! # Path Resolution Priority
//!
//! 1. `--config` flag
//! 2. `WARDEN_CONFIG` environment variable
//! 3. `XDG_CONFIG_HOME/warden/config.toml` (if set)
//! 4. `~/.config/warden/config.toml`
//!
//! `~` and `$VARS` are expanded in every explicit path.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config file override
pub const ENV_CONFIG: &str = "WARDEN_CONFIG";

const APP_DIR: &str = "warden";
const CONFIG_FILE: &str = "config.toml";

/// Resolve the config file path from the process environment.
pub fn config_file(flag: Option<&Path>) -> Result<PathBuf> {
    resolve_config_file(flag, &|key| std::env::var(key).ok())
}

/// Resolve the config file path with an injected environment lookup.
pub fn resolve_config_file(
    flag: Option<&Path>,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<PathBuf> {
    // 1. Explicit flag
    if let Some(path) = flag {
        let path = expand(&path.to_string_lossy());
        log::debug!("Using config from --config: {}", path.display());
        return Ok(path);
    }

    // 2. Environment variable override
    if let Some(path) = env(ENV_CONFIG).filter(|v| !v.is_empty()) {
        let path = expand(&path);
        log::debug!("Using config from {ENV_CONFIG}: {}", path.display());
        return Ok(path);
    }

    // 3. XDG_CONFIG_HOME
    if let Some(xdg_config) = env("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        let path = PathBuf::from(xdg_config).join(APP_DIR).join(CONFIG_FILE);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    // 4. Default: ~/.config/warden/config.toml
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join(APP_DIR).join(CONFIG_FILE);
    log::debug!("Using default config: {}", path.display());
    Ok(path)
}

/// Expand `~` and environment variables in a path.
///
/// Falls back to tilde-only expansion when a variable is undefined.
pub fn expand(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}
