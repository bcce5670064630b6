//! Application service — open the first session on a freshly created host.
//!
//! The host's SSH daemon usually lags behind the provider reporting the create
//! action as completed, so the first connection is retried with backoff.

use std::time::Duration;

use crate::application::ports::{Login, ProgressReporter, SessionConnector};
use crate::domain::config::TimingConfig;
use crate::domain::error::ProvisionError;
use crate::domain::host::HostAddress;

/// Ceiling for a single wait between connection attempts.
pub const MAX_PROBE_BACKOFF: Duration = Duration::from_secs(60);

/// Bounded exponential backoff for session attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
}

impl From<&TimingConfig> for ProbePolicy {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            attempts: timing.probe_attempts,
            initial_backoff: timing.probe_backoff(),
        }
    }
}

impl ProbePolicy {
    /// Wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(MAX_PROBE_BACKOFF)
    }
}

/// Try to connect until it works or the attempt budget runs out.
///
/// # Errors
///
/// Returns [`ProvisionError::SessionUnreachable`] with the last transport
/// error once every attempt has failed.
pub async fn open_session<C: SessionConnector>(
    connector: &C,
    address: &HostAddress,
    login: &Login,
    policy: &ProbePolicy,
    reporter: &impl ProgressReporter,
) -> Result<C::Session, ProvisionError> {
    let mut last_error = String::from("no connection attempt was made");

    for attempt in 1..=policy.attempts {
        match connector.connect(address, login).await {
            Ok(session) => {
                tracing::info!(%address, attempt, "session opened");
                return Ok(session);
            }
            Err(e) => {
                last_error = format!("{e:#}");
                tracing::debug!(%address, attempt, error = %last_error, "session attempt failed");
                if attempt < policy.attempts {
                    let delay = policy.delay_after(attempt);
                    reporter.waiting(&format!(
                        "Waiting for SSH on {address} (attempt {attempt}/{}, retrying in {}s)",
                        policy.attempts,
                        delay.as_secs()
                    ));
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(ProvisionError::SessionUnreachable {
        address: address.to_string(),
        attempts: policy.attempts,
        reason: last_error,
    })
}
