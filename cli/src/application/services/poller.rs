//! Application service — wait for the provider to finish creating a host.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::time::Duration;

use crate::application::ports::{HostProvider, ProgressReporter};
use crate::domain::config::TimingConfig;
use crate::domain::error::ProvisionError;
use crate::domain::host::{ActionId, ActionStatus, HostAddress, HostHandle, HostId};

/// How often and how many times an action's status is re-read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Status reads allowed per action.
    pub max_attempts: u32,
}

impl From<&TimingConfig> for PollPolicy {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            interval: timing.poll_interval(),
            max_attempts: timing.max_poll_attempts,
        }
    }
}

/// Block until every pending action on `handle` is completed, then read the
/// host record once for its address.
///
/// Actions are polled one after another. An `errored` status ends the wait
/// immediately, as does running out of `policy.max_attempts` reads. A read
/// that fails counts against the same budget and is retried.
///
/// # Errors
///
/// Returns [`ProvisionError::ProviderActionFailed`] carrying the host id when
/// an action errors or never completes within the budget, or the host record
/// cannot be read or has no public address once all actions are done.
pub async fn wait_for_host(
    provider: &impl HostProvider,
    handle: &HostHandle,
    policy: &PollPolicy,
    reporter: &impl ProgressReporter,
) -> Result<HostAddress, ProvisionError> {
    for action in &handle.pending_actions {
        wait_for_action(provider, &handle.id, action, policy, reporter).await?;
    }

    match provider.host_address(&handle.id).await {
        Ok(Some(address)) => {
            tracing::info!(host = %handle.id, %address, "host address resolved");
            Ok(address)
        }
        Ok(None) => Err(action_failed(
            &handle.id,
            None,
            "host reports no public IPv4 address after creation completed".to_string(),
        )),
        Err(e) => Err(action_failed(
            &handle.id,
            None,
            format!("could not read host record: {e:#}"),
        )),
    }
}

async fn wait_for_action(
    provider: &impl HostProvider,
    host: &HostId,
    action: &ActionId,
    policy: &PollPolicy,
    reporter: &impl ProgressReporter,
) -> Result<(), ProvisionError> {
    let mut last_error = None;
    for attempt in 1..=policy.max_attempts {
        match provider.action_status(action).await {
            Ok(ActionStatus::Completed) => return Ok(()),
            Ok(ActionStatus::Errored) => {
                return Err(action_failed(
                    host,
                    Some(action),
                    format!("action {action} reported errored"),
                ));
            }
            Ok(ActionStatus::InProgress) => {
                tracing::debug!(%host, %action, attempt, "action in progress");
                reporter.waiting(&format!(
                    "Building host {host} (check {attempt}/{})",
                    policy.max_attempts
                ));
            }
            // A failed read says nothing about the action; it costs one check.
            Err(e) => {
                let error = format!("{e:#}");
                tracing::warn!(%host, %action, attempt, %error, "action status read failed");
                reporter.warn(&format!(
                    "Could not read status of action {action} (check {attempt}/{}): {error}",
                    policy.max_attempts
                ));
                last_error = Some(error);
            }
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    let mut reason = format!(
        "action {action} did not complete after {} status checks",
        policy.max_attempts
    );
    if let Some(error) = last_error {
        reason.push_str(&format!("; last read error: {error}"));
    }
    Err(action_failed(host, Some(action), reason))
}

fn action_failed(host: &HostId, action: Option<&ActionId>, reason: String) -> ProvisionError {
    ProvisionError::ProviderActionFailed {
        host: host.clone(),
        action: action.cloned(),
        reason,
    }
}
