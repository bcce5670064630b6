//! Loads `hardhost.yaml` and the public key it references.

use std::path::{Path, PathBuf};

use crate::domain::config::HardhostConfig;
use crate::domain::error::{ConfigError, ProvisionError};
use crate::domain::hardening::HardeningStep;
use crate::domain::ssh::validate_public_key;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "HARDHOST_CONFIG";
/// Environment variable carrying the API token.
pub const TOKEN_ENV: &str = "DIGITALOCEAN_TOKEN";
pub const DEFAULT_CONFIG_FILE: &str = "hardhost.yaml";

/// A validated configuration plus the files it points at.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub config: HardhostConfig,
    /// Admin public key; `None` when user management is skipped.
    pub public_key: Option<String>,
}

/// `--config`, else `HARDHOST_CONFIG`, else `./hardhost.yaml`.
#[must_use]
pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(val) = std::env::var(CONFIG_ENV) {
        if !val.is_empty() {
            return PathBuf::from(val);
        }
    }
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Read, parse, and validate the configuration at `path`.
///
/// `token` overrides `provider.api_token` when given. Every problem found is
/// reported at once.
///
/// # Errors
///
/// Returns [`ProvisionError::ConfigInvalid`] listing all findings.
pub fn load(path: &Path, token: Option<String>) -> Result<LoadedConfig, ProvisionError> {
    let content = std::fs::read_to_string(path).map_err(|e| single(invalid(
        "config",
        &path.display().to_string(),
        &format!("cannot read: {e}"),
    )))?;
    let mut config: HardhostConfig = serde_yaml::from_str(&content).map_err(|e| {
        single(invalid(
            "config",
            &path.display().to_string(),
            &format!("cannot parse: {e}"),
        ))
    })?;

    if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
        config.provider.api_token = Some(token);
    }
    config.host.public_key_file = config.host.public_key_file.as_deref().map(expand_home);
    config.host.identity_file = config.host.identity_file.as_deref().map(expand_home);

    let mut findings = config.findings();

    let mut public_key = None;
    let needs_key = !config.hardening.skip.contains(&HardeningStep::UserManagement);
    if let (true, Some(key_path)) = (needs_key, &config.host.public_key_file) {
        match read_public_key(key_path) {
            Ok(key) => public_key = Some(key),
            Err(finding) => findings.push(finding),
        }
    }
    if let Some(identity) = &config.host.identity_file {
        if !identity.is_file() {
            findings.push(invalid(
                "host.identity_file",
                &identity.display().to_string(),
                "file does not exist",
            ));
        }
    }

    if !findings.is_empty() {
        return Err(ProvisionError::ConfigInvalid { findings });
    }
    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(LoadedConfig {
        path: path.to_path_buf(),
        config,
        public_key,
    })
}

fn read_public_key(path: &Path) -> Result<String, ConfigError> {
    let shown = path.display().to_string();
    let key = std::fs::read_to_string(path)
        .map_err(|e| invalid("host.public_key_file", &shown, &format!("cannot read: {e}")))?;
    validate_public_key(&key)
        .map_err(|e| invalid("host.public_key_file", &shown, &format!("{e:#}")))?;
    Ok(key.trim().to_string())
}

/// Expand a leading `~/` to the user's home directory.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn single(finding: ConfigError) -> ProvisionError {
    ProvisionError::ConfigInvalid {
        findings: vec![finding],
    }
}
