//! Host and provider-action value types.
//!
//! Pure data only. The provider adapter translates its wire format into these.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque provider-side host identifier (a droplet id for DigitalOcean).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostId(pub String);

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque provider-side action identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub String);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric id of an SSH key registered with the provider account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyRef(pub u64);

/// Everything the provider needs to create one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRequest {
    pub name: String,
    pub region: String,
    pub image: String,
    pub size: String,
    pub ssh_keys: Vec<KeyRef>,
    pub backups: bool,
}

/// Returned by the provider once a create request is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostHandle {
    pub id: HostId,
    /// Actions that must reach `completed` before the host is usable.
    pub pending_actions: Vec<ActionId>,
}

/// Provider-reported state of an asynchronous action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionStatus {
    InProgress,
    Completed,
    Errored,
}

impl ActionStatus {
    /// Parse the provider's status string. Unknown values count as still running.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "completed" => Self::Completed,
            "errored" => Self::Errored,
            _ => Self::InProgress,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// Resolved public address of the created host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostAddress(pub String);

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
