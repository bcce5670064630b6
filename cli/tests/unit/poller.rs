//! Unit tests for the action poller.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use hardhost_cli::application::services::poller::{PollPolicy, wait_for_host};
use hardhost_cli::domain::error::ProvisionError;
use hardhost_cli::domain::host::{ActionStatus, HostAddress};

use crate::helpers::{ADDRESS, FakeProvider, HOST_ID, RecordingReporter};

const FAST: PollPolicy = PollPolicy {
    interval: Duration::ZERO,
    max_attempts: 4,
};

#[tokio::test]
async fn completed_action_resolves_address() {
    let provider = FakeProvider::new(&[
        ActionStatus::InProgress,
        ActionStatus::InProgress,
        ActionStatus::Completed,
    ]);
    let reporter = RecordingReporter::default();

    let address = wait_for_host(&provider, &FakeProvider::handle(), &FAST, &reporter)
        .await
        .expect("host should resolve");

    assert_eq!(address, HostAddress(ADDRESS.to_string()));
    assert_eq!(provider.status_reads.get(), 3);
    assert_eq!(provider.host_reads.get(), 1, "address is read exactly once");
    assert_eq!(reporter.count("waiting:"), 2);
}

#[tokio::test]
async fn errored_action_fails_fast_with_host_id() {
    let provider = FakeProvider::new(&[ActionStatus::InProgress, ActionStatus::Errored]);
    let reporter = RecordingReporter::default();

    let err = wait_for_host(&provider, &FakeProvider::handle(), &FAST, &reporter)
        .await
        .unwrap_err();

    match err {
        ProvisionError::ProviderActionFailed { host, action, .. } => {
            assert_eq!(host.0, HOST_ID);
            assert!(action.is_some());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(provider.status_reads.get(), 2, "no reads after errored");
    assert_eq!(provider.host_reads.get(), 0);
}

#[tokio::test]
async fn never_completing_action_exhausts_budget() {
    let provider = FakeProvider::new(&[ActionStatus::InProgress; 10]);
    let reporter = RecordingReporter::default();

    let err = wait_for_host(&provider, &FakeProvider::handle(), &FAST, &reporter)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::ProviderActionFailed { .. }));
    assert!(err.to_string().contains("did not complete after 4"));
    assert_eq!(provider.status_reads.get(), FAST.max_attempts);
}

#[tokio::test]
async fn missing_public_address_is_an_action_failure() {
    let mut provider = FakeProvider::new(&[ActionStatus::Completed]);
    provider.address = None;
    let reporter = RecordingReporter::default();

    let err = wait_for_host(&provider, &FakeProvider::handle(), &FAST, &reporter)
        .await
        .unwrap_err();

    match err {
        ProvisionError::ProviderActionFailed { action, reason, .. } => {
            assert!(action.is_none());
            assert!(reason.contains("no public IPv4"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn failed_status_read_is_retried() {
    let provider = FakeProvider::new(&[ActionStatus::Completed]);
    provider.failing_reads.set(1);
    let reporter = RecordingReporter::default();

    let address = wait_for_host(&provider, &FakeProvider::handle(), &FAST, &reporter)
        .await
        .expect("one failed read should not end the wait");

    assert_eq!(address, HostAddress(ADDRESS.to_string()));
    assert_eq!(provider.status_reads.get(), 2);
    assert_eq!(provider.host_reads.get(), 1);
    assert_eq!(reporter.count("warn:"), 1);
}

#[tokio::test]
async fn failed_reads_exhaust_budget_with_last_error() {
    let provider = FakeProvider::new(&[]);
    provider.failing_reads.set(10);
    let reporter = RecordingReporter::default();

    let err = wait_for_host(&provider, &FakeProvider::handle(), &FAST, &reporter)
        .await
        .unwrap_err();

    match err {
        ProvisionError::ProviderActionFailed { host, reason, .. } => {
            assert_eq!(host.0, HOST_ID);
            assert!(reason.contains("did not complete after 4"), "got: {reason}");
            assert!(reason.contains("503"), "got: {reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(provider.status_reads.get(), FAST.max_attempts);
    assert_eq!(provider.host_reads.get(), 0);
}

#[tokio::test]
async fn every_pending_action_is_awaited_in_turn() {
    let provider = FakeProvider::new(&[
        ActionStatus::InProgress,
        ActionStatus::Completed,
        ActionStatus::InProgress,
        ActionStatus::Completed,
    ]);
    let handle = FakeProvider::handle_with_actions(&["101", "102"]);
    let reporter = RecordingReporter::default();

    let address = wait_for_host(&provider, &handle, &FAST, &reporter)
        .await
        .expect("both actions complete");

    assert_eq!(address, HostAddress(ADDRESS.to_string()));
    assert_eq!(provider.status_reads.get(), 4);
    assert_eq!(provider.host_reads.get(), 1);
}

#[tokio::test]
async fn second_action_errored_after_first_completed() {
    let provider = FakeProvider::new(&[ActionStatus::Completed, ActionStatus::Errored]);
    let handle = FakeProvider::handle_with_actions(&["101", "102"]);
    let reporter = RecordingReporter::default();

    let err = wait_for_host(&provider, &handle, &FAST, &reporter)
        .await
        .unwrap_err();

    match err {
        ProvisionError::ProviderActionFailed { action, reason, .. } => {
            assert_eq!(action.map(|a| a.0).as_deref(), Some("102"));
            assert!(reason.contains("102"), "got: {reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(provider.status_reads.get(), 2);
    assert_eq!(provider.host_reads.get(), 0, "no address read after a failed action");
}
