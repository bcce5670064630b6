//! The fixed hardening step order and the plans derived from it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

/// One unit of remote configuration change.
///
/// The declaration order is the execution order. Step 3 disables root and
/// password logins, so it relies on step 2 having installed the admin's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HardeningStep {
    SystemUpdate,
    UserManagement,
    SshDaemon,
    Firewall,
    UnattendedUpgrades,
}

impl HardeningStep {
    /// Every step, in the only order they may run.
    pub const SEQUENCE: [Self; 5] = [
        Self::SystemUpdate,
        Self::UserManagement,
        Self::SshDaemon,
        Self::Firewall,
        Self::UnattendedUpgrades,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::SystemUpdate => "system-update",
            Self::UserManagement => "user-management",
            Self::SshDaemon => "ssh-daemon",
            Self::Firewall => "firewall",
            Self::UnattendedUpgrades => "unattended-upgrades",
        }
    }

    /// 1-based position in [`Self::SEQUENCE`].
    #[must_use]
    pub fn number(self) -> usize {
        self as usize + 1
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::SystemUpdate => "updating system packages",
            Self::UserManagement => "creating admin account and rotating root password",
            Self::SshDaemon => "hardening SSH daemon",
            Self::Firewall => "configuring firewall",
            Self::UnattendedUpgrades => "enabling unattended security updates",
        }
    }
}

impl fmt::Display for HardeningStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HardeningStep {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::SEQUENCE
            .into_iter()
            .find(|step| step.name() == s)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "hardening.skip".to_string(),
                value: s.to_string(),
                reason: format!(
                    "unknown step; valid steps: {}",
                    Self::SEQUENCE.map(Self::name).join(", ")
                ),
            })
    }
}

/// The steps a run will execute, always in canonical order.
///
/// Only constructible from [`HardeningStep::SEQUENCE`] minus a skip list, so a
/// reordered plan cannot exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardeningPlan {
    steps: Vec<HardeningStep>,
}

impl Default for HardeningPlan {
    fn default() -> Self {
        Self {
            steps: HardeningStep::SEQUENCE.to_vec(),
        }
    }
}

impl HardeningPlan {
    /// Build a plan that leaves out `skip`.
    ///
    /// # Errors
    ///
    /// Rejects a plan that hardens the SSH daemon without first creating the
    /// admin account, since it would lock every login out of the host.
    pub fn without(skip: &[HardeningStep]) -> Result<Self, ConfigError> {
        let steps: Vec<HardeningStep> = HardeningStep::SEQUENCE
            .into_iter()
            .filter(|step| !skip.contains(step))
            .collect();
        if steps.contains(&HardeningStep::SshDaemon)
            && !steps.contains(&HardeningStep::UserManagement)
        {
            return Err(ConfigError::InvalidValue {
                key: "hardening.skip".to_string(),
                value: HardeningStep::UserManagement.name().to_string(),
                reason: "ssh-daemon disables root login and needs user-management to run first"
                    .to_string(),
            });
        }
        Ok(Self { steps })
    }

    #[must_use]
    pub fn steps(&self) -> &[HardeningStep] {
        &self.steps
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
