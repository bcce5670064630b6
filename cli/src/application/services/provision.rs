//! Application service — the provisioning orchestrator.
//!
//! Drives one run through `REQUESTED → ACTION_PENDING → ADDRESS_RESOLVED →
//! HARDENING → DONE`, or into `FAILED` from whichever state an error hits.
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::Utc;

use crate::application::ports::{
    HostProvider, Login, ProgressReporter, RemoteSession, SessionConnector,
};
use crate::application::services::hardening::{HardeningSettings, run_sequence};
use crate::application::services::poller::{PollPolicy, wait_for_host};
use crate::application::services::readiness::{ProbePolicy, open_session};
use crate::domain::config::HardhostConfig;
use crate::domain::error::{ProvisionError, ProvisionFailure};
use crate::domain::hardening::HardeningPlan;
use crate::domain::host::{HostAddress, HostId, HostRequest};
use crate::domain::result::{ProvisioningResult, ResultAccumulator};
use crate::domain::state::{Lifecycle, ProvisionState};

/// Everything one run needs, resolved from configuration up front.
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    /// Create request; account keys are filled in at run time.
    pub request: HostRequest,
    pub plan: HardeningPlan,
    pub settings: HardeningSettings,
    pub settle_delay: Duration,
    pub poll: PollPolicy,
    pub probe: ProbePolicy,
}

impl ProvisionOptions {
    /// Resolve options from a configuration and the loaded public key.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ConfigInvalid`] when the configuration has
    /// any validation finding.
    pub fn from_config(
        config: &HardhostConfig,
        public_key: Option<String>,
    ) -> Result<Self, ProvisionError> {
        let findings = config.findings();
        if !findings.is_empty() {
            return Err(ProvisionError::ConfigInvalid { findings });
        }
        let plan = config
            .hardening_plan()
            .map_err(|e| ProvisionError::ConfigInvalid { findings: vec![e] })?;
        Ok(Self {
            request: config.host_request(Vec::new()),
            plan,
            settings: HardeningSettings {
                admin_username: config.host.admin_username.clone(),
                ssh_port: config.ssh_port(),
                public_key,
            },
            settle_delay: config.timing.settle_delay(),
            poll: PollPolicy::from(&config.timing),
            probe: ProbePolicy::from(&config.timing),
        })
    }
}

/// Per-run state threaded through every phase.
struct Run {
    lifecycle: Lifecycle,
    progress: ResultAccumulator,
}

/// Provision and harden one host.
///
/// `interrupt` resolves when the operator cancels; the run then fails with
/// [`ProvisionError::Interrupted`] and never reports `DONE`.
///
/// # Errors
///
/// Returns a [`ProvisionFailure`] carrying the error, the state it happened in,
/// the state history, and everything collected before the failure.
pub async fn provision<C: SessionConnector>(
    provider: &impl HostProvider,
    connector: &C,
    reporter: &impl ProgressReporter,
    opts: &ProvisionOptions,
    interrupt: impl Future<Output = ()>,
) -> Result<ProvisioningResult, ProvisionFailure> {
    let mut run = Run {
        lifecycle: Lifecycle::new(),
        progress: ResultAccumulator::new(opts.settings.ssh_port),
    };

    tokio::pin!(interrupt);
    let outcome = drive(provider, connector, reporter, opts, &mut run, interrupt).await;

    match outcome {
        Ok((host_id, address)) => {
            run.lifecycle.advance(ProvisionState::Done);
            tracing::info!(host = %host_id, %address, "provisioning complete");
            Ok(run.progress.finish(host_id, address, Utc::now()))
        }
        Err(error) => {
            let failed_in = run.lifecycle.current();
            run.lifecycle.advance(ProvisionState::Failed);
            tracing::error!(state = %failed_in, kind = %error.kind(), "provisioning failed");
            Err(ProvisionFailure {
                error,
                failed_in,
                history: run.lifecycle.into_history(),
                progress: run.progress,
            })
        }
    }
}

/// Run every phase, racing each against `interrupt`.
///
/// Hardening is raced on its own so the session gets closed on every exit
/// from the sequence, cancellation included.
async fn drive<C: SessionConnector>(
    provider: &impl HostProvider,
    connector: &C,
    reporter: &impl ProgressReporter,
    opts: &ProvisionOptions,
    run: &mut Run,
    mut interrupt: Pin<&mut impl Future<Output = ()>>,
) -> Result<(HostId, HostAddress), ProvisionError> {
    // Cancellation wins when both are ready.
    let reached = tokio::select! {
        biased;
        () = &mut interrupt => Err(ProvisionError::Interrupted),
        reached = reach_host(provider, connector, reporter, opts, run) => reached,
    };
    let (host_id, address, session) = reached?;
    run.lifecycle.advance(ProvisionState::Hardening);

    // HARDENING
    let hardened = tokio::select! {
        biased;
        () = &mut interrupt => Err(ProvisionError::Interrupted),
        hardened = run_sequence(
            &session,
            &opts.plan,
            &opts.settings,
            &mut run.progress,
            reporter,
        ) => hardened,
    };
    if let Err(e) = session.close().await {
        tracing::warn!(error = %format!("{e:#}"), "closing session failed");
    }
    hardened?;

    Ok((host_id, address))
}

/// Create the host, wait for its address and open a root session on it.
async fn reach_host<C: SessionConnector>(
    provider: &impl HostProvider,
    connector: &C,
    reporter: &impl ProgressReporter,
    opts: &ProvisionOptions,
    run: &mut Run,
) -> Result<(HostId, HostAddress, C::Session), ProvisionError> {
    // REQUESTED
    reporter.step("Fetching account SSH keys...");
    let keys = provider
        .list_ssh_keys()
        .await
        .map_err(|e| ProvisionError::ProviderRequestFailed {
            reason: format!("could not list account SSH keys: {e:#}"),
        })?;
    tracing::debug!(count = keys.len(), "account keys attached to the create request");

    let request = HostRequest {
        ssh_keys: keys,
        ..opts.request.clone()
    };
    reporter.step(&format!(
        "Creating host {} ({}, {}, {})...",
        request.name, request.region, request.size, request.image
    ));
    let handle = provider
        .create_host(&request)
        .await
        .map_err(|e| ProvisionError::ProviderRequestFailed {
            reason: format!("{e:#}"),
        })?;
    run.progress.host_id = Some(handle.id.clone());
    run.lifecycle.advance(ProvisionState::ActionPending);
    reporter.success(&format!("Create request accepted (host {})", handle.id));

    // ACTION_PENDING
    if !opts.settle_delay.is_zero() {
        reporter.waiting(&format!(
            "Giving host {} {}s to settle...",
            handle.id,
            opts.settle_delay.as_secs()
        ));
        tokio::time::sleep(opts.settle_delay).await;
    }
    let address = wait_for_host(provider, &handle, &opts.poll, reporter).await?;
    run.progress.address = Some(address.clone());
    run.lifecycle.advance(ProvisionState::AddressResolved);
    reporter.success(&format!("Host {} is up at {address}", handle.id));

    // ADDRESS_RESOLVED
    let session = open_session(connector, &address, &Login::root(), &opts.probe, reporter).await?;
    Ok((handle.id, address, session))
}
