//! Domain types and validators for the hardhost configuration file.
//!
//! Pure functions only: no I/O, no async, no filesystem access. Reading the
//! file and the public key it points at is the infra loader's job.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::hardening::{HardeningPlan, HardeningStep};
use crate::domain::host::{HostRequest, KeyRef};

// ── Constants ────────────────────────────────────────────────────────────────

/// Port the SSH daemon listens on before hardening.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default result artifact path, relative to the working directory.
pub const DEFAULT_RESULT_FILE: &str = "serverinfo.txt";

static HOST_NAME_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9.-]{0,252}[A-Za-z0-9])?$").ok());

static USERNAME_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_-]{0,31}$").ok());

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration, usually `hardhost.yaml`.
///
/// Every field deserializes with a default so that missing settings surface as
/// validation findings rather than a parse error.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HardhostConfig {
    pub provider: ProviderConfig,
    pub host: HostConfig,
    pub timing: TimingConfig,
    pub output: OutputConfig,
    pub hardening: HardeningConfig,
}

/// Cloud provider credentials and the droplet to create.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProviderConfig {
    /// API token. May be supplied through `DIGITALOCEAN_TOKEN` instead.
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    pub name: String,
    pub region: String,
    pub image: String,
    pub size: String,
    pub backups: bool,
}

/// Settings applied to the host during hardening.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HostConfig {
    pub admin_username: String,
    /// Port the SSH daemon is moved to. Stays on 22 when unset.
    pub ssh_port: Option<u16>,
    /// Public key installed for the admin account.
    pub public_key_file: Option<PathBuf>,
    /// Private key used for the initial root session. Defaults to the ssh client's.
    pub identity_file: Option<PathBuf>,
}

/// Waits and budgets. All values are seconds unless noted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait after the create request before querying any action.
    pub settle_delay_secs: u64,
    pub poll_interval_secs: u64,
    /// Status reads allowed per action before giving up.
    pub max_poll_attempts: u32,
    /// Session open attempts before the host counts as unreachable.
    pub probe_attempts: u32,
    /// First wait between session attempts; doubles each time.
    pub probe_backoff_secs: u64,
    pub connect_timeout_secs: u64,
    /// Upper bound for a single remote command.
    pub command_timeout_secs: u64,
    pub http_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_delay_secs: 30,
            poll_interval_secs: 3,
            max_poll_attempts: 200,
            probe_attempts: 6,
            probe_backoff_secs: 5,
            connect_timeout_secs: 10,
            command_timeout_secs: 1800,
            http_timeout_secs: 30,
        }
    }
}

impl TimingConfig {
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub fn probe_backoff(&self) -> Duration {
        Duration::from_secs(self.probe_backoff_secs)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Where the result artifact goes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub result_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            result_file: PathBuf::from(DEFAULT_RESULT_FILE),
        }
    }
}

/// Steps to leave out of the run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HardeningConfig {
    pub skip: Vec<HardeningStep>,
}

impl HardhostConfig {
    /// SSH port after hardening, falling back to the daemon default.
    #[must_use]
    pub fn ssh_port(&self) -> u16 {
        self.host.ssh_port.unwrap_or(DEFAULT_SSH_PORT)
    }

    /// Build the provider request; `keys` are the account keys to attach.
    #[must_use]
    pub fn host_request(&self, keys: Vec<KeyRef>) -> HostRequest {
        HostRequest {
            name: self.provider.name.clone(),
            region: self.provider.region.clone(),
            image: self.provider.image.clone(),
            size: self.provider.size.clone(),
            ssh_keys: keys,
            backups: self.provider.backups,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the skip list would leave an unsafe plan.
    pub fn hardening_plan(&self) -> Result<HardeningPlan, ConfigError> {
        HardeningPlan::without(&self.hardening.skip)
    }

    /// Every problem with this configuration. Empty means valid.
    #[must_use]
    pub fn findings(&self) -> Vec<ConfigError> {
        let mut findings = Vec::new();

        match self.provider.api_token.as_deref().map(str::trim) {
            None | Some("") => findings.push(missing("provider.api_token")),
            Some(_) => {}
        }
        for (key, value) in [
            ("provider.name", &self.provider.name),
            ("provider.region", &self.provider.region),
            ("provider.image", &self.provider.image),
            ("provider.size", &self.provider.size),
        ] {
            if value.trim().is_empty() {
                findings.push(missing(key));
            }
        }
        if !self.provider.name.is_empty() && !matches_re(&HOST_NAME_RE, &self.provider.name) {
            findings.push(invalid(
                "provider.name",
                &self.provider.name,
                "must be a valid hostname (letters, digits, '.', '-')",
            ));
        }

        let user = &self.host.admin_username;
        if user.is_empty() {
            findings.push(missing("host.admin_username"));
        } else if user == "root" {
            findings.push(invalid(
                "host.admin_username",
                user,
                "must not be root; root login is disabled by hardening",
            ));
        } else if !matches_re(&USERNAME_RE, user) {
            findings.push(invalid(
                "host.admin_username",
                user,
                "must match ^[a-z_][a-z0-9_-]{0,31}$",
            ));
        }
        if self.host.ssh_port == Some(0) {
            findings.push(invalid(
                "host.ssh_port",
                "0",
                "must be between 1 and 65535",
            ));
        }
        let plan = self.hardening_plan();
        let needs_key = plan
            .as_ref()
            .map_or(true, |p| p.steps().contains(&HardeningStep::UserManagement));
        if needs_key && self.host.public_key_file.is_none() {
            findings.push(missing("host.public_key_file"));
        }
        if let Err(e) = plan {
            findings.push(e);
        }

        if self.timing.poll_interval_secs == 0 {
            findings.push(invalid("timing.poll_interval_secs", "0", "must be at least 1"));
        }
        for (key, value) in [
            ("timing.max_poll_attempts", self.timing.max_poll_attempts),
            ("timing.probe_attempts", self.timing.probe_attempts),
        ] {
            if value == 0 {
                findings.push(invalid(key, "0", "must be at least 1"));
            }
        }
        if self.timing.command_timeout_secs == 0 {
            findings.push(invalid("timing.command_timeout_secs", "0", "must be at least 1"));
        }
        if self.output.result_file.as_os_str().is_empty() {
            findings.push(missing("output.result_file"));
        }

        findings
    }
}

fn matches_re(re: &LazyLock<Option<Regex>>, value: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(value))
}

fn missing(key: &str) -> ConfigError {
    ConfigError::Missing {
        key: key.to_string(),
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
