//! Step audit trail, the per-run accumulator, and the final result record.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::domain::credential::GeneratedCredential;
use crate::domain::hardening::HardeningStep;
use crate::domain::host::{HostAddress, HostId};

/// Outcome of one hardening step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Failure { reason: String },
}

/// One entry of the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub step: HardeningStep,
    pub outcome: StepOutcome,
}

impl StepResult {
    #[must_use]
    pub fn success(step: HardeningStep) -> Self {
        Self {
            step,
            outcome: StepOutcome::Success,
        }
    }

    #[must_use]
    pub fn failure(step: HardeningStep, reason: impl Into<String>) -> Self {
        Self {
            step,
            outcome: StepOutcome::Failure {
                reason: reason.into(),
            },
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == StepOutcome::Success
    }
}

/// Values collected while a run progresses.
///
/// Threaded through the orchestrator and handed to each step explicitly.
#[derive(Debug, Clone, Default)]
pub struct ResultAccumulator {
    pub host_id: Option<HostId>,
    pub address: Option<HostAddress>,
    pub ssh_port: u16,
    pub root_credential: Option<GeneratedCredential>,
    pub admin_credential: Option<GeneratedCredential>,
    pub steps: Vec<StepResult>,
}

impl ResultAccumulator {
    #[must_use]
    pub fn new(ssh_port: u16) -> Self {
        Self {
            ssh_port,
            ..Self::default()
        }
    }

    pub fn record(&mut self, result: StepResult) {
        self.steps.push(result);
    }

    /// Whether anything here is worth persisting for the operator.
    #[must_use]
    pub fn holds_credentials(&self) -> bool {
        self.root_credential.is_some() || self.admin_credential.is_some()
    }

    /// Freeze into the final record for the host the run created.
    #[must_use]
    pub fn finish(
        self,
        host_id: HostId,
        address: HostAddress,
        completed_at: DateTime<Utc>,
    ) -> ProvisioningResult {
        ProvisioningResult {
            host_id,
            address,
            ssh_port: self.ssh_port,
            root_credential: self.root_credential,
            admin_credential: self.admin_credential,
            steps: self.steps,
            completed_at,
        }
    }
}

/// Final artifact of a successful run.
#[derive(Debug, Clone)]
pub struct ProvisioningResult {
    pub host_id: HostId,
    pub address: HostAddress,
    pub ssh_port: u16,
    /// `None` only when user management was skipped.
    pub root_credential: Option<GeneratedCredential>,
    pub admin_credential: Option<GeneratedCredential>,
    pub steps: Vec<StepResult>,
    pub completed_at: DateTime<Utc>,
}

impl ProvisioningResult {
    /// `ssh -p <port> <user>@<address>` for the account the operator should use.
    #[must_use]
    pub fn connect_hint(&self) -> String {
        let user = self
            .admin_credential
            .as_ref()
            .map_or("root", |c| c.account.as_str());
        format!("ssh -p {} {user}@{}", self.ssh_port, self.address)
    }
}

/// Render the plain-text result artifact.
///
/// Contains plaintext secrets; writers must restrict access to the file.
#[must_use]
pub fn render_artifact(result: &ProvisioningResult) -> String {
    let mut out = String::new();
    push_common(
        &mut out,
        Some(&result.host_id),
        Some(&result.address),
        result.ssh_port,
        result.root_credential.as_ref(),
        result.admin_credential.as_ref(),
    );
    push_steps(&mut out, &result.steps);
    let _ = writeln!(out, "Status: DONE");
    let _ = writeln!(out, "Completed: {}", result.completed_at.to_rfc3339());
    let _ = writeln!(out, "Connect: {}", result.connect_hint());
    out
}

/// Render what a failed run managed to gather, so secrets already applied to
/// the host are not lost.
#[must_use]
pub fn render_partial_artifact(
    progress: &ResultAccumulator,
    failure: &str,
    at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    push_common(
        &mut out,
        progress.host_id.as_ref(),
        progress.address.as_ref(),
        progress.ssh_port,
        progress.root_credential.as_ref(),
        progress.admin_credential.as_ref(),
    );
    push_steps(&mut out, &progress.steps);
    let _ = writeln!(out, "Status: FAILED ({failure})");
    let _ = writeln!(out, "Recorded: {}", at.to_rfc3339());
    out
}

fn push_common(
    out: &mut String,
    host_id: Option<&HostId>,
    address: Option<&HostAddress>,
    ssh_port: u16,
    root: Option<&GeneratedCredential>,
    admin: Option<&GeneratedCredential>,
) {
    if let Some(id) = host_id {
        let _ = writeln!(out, "Host ID: {id}");
    }
    if let Some(addr) = address {
        let _ = writeln!(out, "IP: {addr}");
    }
    let _ = writeln!(out, "SSH Port: {ssh_port}");
    for cred in [root, admin].into_iter().flatten() {
        let _ = writeln!(out, "{}: {}", cred.account, cred.secret());
    }
}

fn push_steps(out: &mut String, steps: &[StepResult]) {
    if steps.is_empty() {
        return;
    }
    let _ = writeln!(out, "Steps:");
    for result in steps {
        match &result.outcome {
            StepOutcome::Success => {
                let _ = writeln!(out, "  {}. {}: ok", result.step.number(), result.step);
            }
            StepOutcome::Failure { reason } => {
                let _ = writeln!(
                    out,
                    "  {}. {}: FAILED ({})",
                    result.step.number(),
                    result.step,
                    reason.lines().next().unwrap_or_default()
                );
            }
        }
    }
}
