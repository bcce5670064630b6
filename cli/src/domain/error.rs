//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::fmt;

use thiserror::Error;

use crate::domain::host::{ActionId, HostId};
use crate::domain::result::ResultAccumulator;
use crate::domain::state::ProvisionState;

// ── Error kinds ───────────────────────────────────────────────────────────────

/// Operator-facing classification of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConfigInvalid,
    ProviderRequestFailed,
    ProviderActionFailed,
    SessionUnreachable,
    StepFailed,
    Interrupted,
}

impl ErrorKind {
    /// Stable upper-case code printed next to every failure.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::ProviderRequestFailed => "PROVIDER_REQUEST_FAILED",
            Self::ProviderActionFailed => "PROVIDER_ACTION_FAILED",
            Self::SessionUnreachable => "SESSION_UNREACHABLE",
            Self::StepFailed => "STEP_FAILED",
            Self::Interrupted => "INTERRUPTED",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// A single problem found while validating the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing setting: {key}")]
    Missing { key: String },

    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

// ── Provisioning errors ───────────────────────────────────────────────────────

/// Fatal errors that end a provisioning run.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("configuration is invalid:\n{}", format_findings(.findings))]
    ConfigInvalid { findings: Vec<ConfigError> },

    #[error("provider rejected the request: {reason}")]
    ProviderRequestFailed { reason: String },

    #[error(
        "provisioning of host {host} failed: {reason}\n\
         The host may exist in a partially created state. Inspect or delete it manually."
    )]
    ProviderActionFailed {
        host: HostId,
        /// The action that failed, when the failure is tied to one.
        action: Option<ActionId>,
        reason: String,
    },

    #[error(
        "could not open a session to {address} after {attempts} attempt(s): {reason}\n\
         Retry with a longer settle delay or check the host manually."
    )]
    SessionUnreachable {
        address: String,
        attempts: u32,
        reason: String,
    },

    #[error("step {number} ({step}) failed running `{command}`:\n{output}")]
    StepFailed {
        number: usize,
        step: &'static str,
        command: String,
        output: String,
    },

    #[error("run interrupted before completion")]
    Interrupted,
}

impl ProvisionError {
    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigInvalid { .. } => ErrorKind::ConfigInvalid,
            Self::ProviderRequestFailed { .. } => ErrorKind::ProviderRequestFailed,
            Self::ProviderActionFailed { .. } => ErrorKind::ProviderActionFailed,
            Self::SessionUnreachable { .. } => ErrorKind::SessionUnreachable,
            Self::StepFailed { .. } => ErrorKind::StepFailed,
            Self::Interrupted => ErrorKind::Interrupted,
        }
    }
}

fn format_findings(findings: &[ConfigError]) -> String {
    findings
        .iter()
        .map(|f| format!("  - {f}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Failed run ────────────────────────────────────────────────────────────────

/// A run that ended in `FAILED`, with everything gathered before the failure.
///
/// `progress` still holds generated credentials when the failure happened after
/// user management, so callers can persist them.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ProvisionFailure {
    #[source]
    pub error: ProvisionError,
    /// State the orchestrator was in when the error occurred.
    pub failed_in: ProvisionState,
    /// Every state entered during the run, in order, ending with `Failed`.
    pub history: Vec<ProvisionState>,
    pub progress: ResultAccumulator,
}

impl ProvisionFailure {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}
