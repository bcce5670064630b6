//! Unit tests for the hardening step sequence.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use hardhost_cli::application::ports::{Login, RemoteSession, SessionConnector};
use hardhost_cli::application::services::hardening::run_sequence;
use hardhost_cli::domain::error::ProvisionError;
use hardhost_cli::domain::hardening::{HardeningPlan, HardeningStep};
use hardhost_cli::domain::host::HostAddress;
use hardhost_cli::domain::result::{ResultAccumulator, StepOutcome};

use crate::helpers::{ADDRESS, FakeConnector, PUBLIC_KEY, RecordingReporter, options};

async fn harden(
    connector: &FakeConnector,
    plan: &HardeningPlan,
    port: u16,
) -> (Result<(), ProvisionError>, ResultAccumulator) {
    let session = connector
        .connect(&HostAddress(ADDRESS.to_string()), &Login::root())
        .await
        .unwrap();
    let opts = options("deploy", port);
    let mut progress = ResultAccumulator::new(port);
    let outcome = run_sequence(
        &session,
        plan,
        &opts.settings,
        &mut progress,
        &RecordingReporter::default(),
    )
    .await;
    session.close().await.unwrap();
    (outcome, progress)
}

fn position(commands: &[String], needle: &str) -> usize {
    commands
        .iter()
        .position(|c| c.contains(needle))
        .unwrap_or_else(|| panic!("no command containing {needle:?}"))
}

#[tokio::test]
async fn steps_run_in_fixed_order() {
    let connector = FakeConnector::new();
    let (outcome, progress) = harden(&connector, &HardeningPlan::default(), 2222).await;

    outcome.expect("sequence should succeed");
    let recorded: Vec<_> = progress.steps.iter().map(|s| s.step).collect();
    assert_eq!(recorded, HardeningStep::SEQUENCE);

    let commands = connector.commands();
    let update = position(&commands, "apt-get upgrade");
    let adduser = position(&commands, "adduser --disabled-password");
    let sshd = position(&commands, "sshd -t");
    let ufw = position(&commands, "ufw allow 2222/tcp");
    let unattended = position(&commands, "install unattended-upgrades");
    assert!(update < adduser && adduser < sshd && sshd < ufw && ufw < unattended);
}

#[tokio::test]
async fn secrets_and_key_travel_on_stdin_only() {
    let connector = FakeConnector::new();
    let (outcome, progress) = harden(&connector, &HardeningPlan::default(), 22).await;
    outcome.unwrap();

    let root = progress.root_credential.expect("root secret recorded");
    let admin = progress.admin_credential.expect("admin secret recorded");
    assert_eq!(admin.account, "deploy");
    assert_ne!(root.secret(), admin.secret());

    let inputs = connector.inputs();
    assert!(inputs.contains(&format!("root:{}\n", root.secret())));
    assert!(inputs.contains(&format!("deploy:{}\n", admin.secret())));
    assert!(inputs.contains(&format!("{PUBLIC_KEY}\n")));
    for command in connector.commands() {
        assert!(!command.contains(root.secret()));
        assert!(!command.contains(admin.secret()));
    }
}

#[tokio::test]
async fn default_port_only_uncomments_port_line() {
    let connector = FakeConnector::new();
    let (outcome, _) = harden(&connector, &HardeningPlan::default(), 22).await;
    outcome.unwrap();

    let commands = connector.commands();
    assert!(!commands.iter().any(|c| c.contains("Port 2222")));
    assert!(connector.ran("ufw allow 22/tcp"));
    assert!(connector.ran("PermitRootLogin no"));
    assert!(connector.ran("PasswordAuthentication no"));
}

#[tokio::test]
async fn moved_port_is_ensured_and_verified_before_restart() {
    let connector = FakeConnector::new();
    let (outcome, _) = harden(&connector, &HardeningPlan::default(), 2222).await;
    outcome.unwrap();

    let commands = connector.commands();
    let ensured = position(&commands, "grep -qxF -- 'Port 2222' /etc/ssh/sshd_config");
    let verified = position(&commands, "sshd -T | grep -qx 'port 2222'");
    let socket = position(&commands, "systemctl restart ssh.socket");
    let restart = position(&commands, "service ssh restart");
    assert!(ensured < verified && verified < socket && socket < restart);
}

#[tokio::test]
async fn port_not_taking_effect_fails_before_restart() {
    let connector = FakeConnector::failing_on("sshd -T");
    let (outcome, progress) = harden(&connector, &HardeningPlan::default(), 2222).await;

    match outcome.unwrap_err() {
        ProvisionError::StepFailed {
            number, command, ..
        } => {
            assert_eq!(number, 3);
            assert!(command.contains("port 2222"), "got: {command}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(progress.steps.len(), 3);
    assert!(!connector.ran("service ssh restart"));
    assert!(!connector.ran("ufw"));
}

#[tokio::test]
async fn first_failure_halts_the_sequence() {
    let connector = FakeConnector::failing_on("ufw --force enable");
    let (outcome, progress) = harden(&connector, &HardeningPlan::default(), 2222).await;

    match outcome.unwrap_err() {
        ProvisionError::StepFailed {
            number,
            command,
            output,
            ..
        } => {
            assert_eq!(number, 4);
            assert_eq!(command, "ufw --force enable");
            assert_eq!(output, "simulated failure");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(progress.steps.len(), 4);
    assert!(matches!(
        progress.steps[3].outcome,
        StepOutcome::Failure { .. }
    ));
    assert!(!connector.ran("unattended-upgrades"));
}

#[tokio::test]
async fn skipped_steps_issue_no_commands() {
    let connector = FakeConnector::new();
    let plan = HardeningPlan::without(&[HardeningStep::SystemUpdate, HardeningStep::Firewall])
        .unwrap();
    let (outcome, progress) = harden(&connector, &plan, 22).await;

    outcome.unwrap();
    assert_eq!(progress.steps.len(), 3);
    assert!(!connector.ran("apt-get upgrade"));
    assert!(!connector.ran("ufw"));
}

#[tokio::test]
async fn missing_public_key_fails_user_management_before_any_change() {
    let connector = FakeConnector::new();
    let session = connector
        .connect(&HostAddress(ADDRESS.to_string()), &Login::root())
        .await
        .unwrap();
    let mut opts = options("deploy", 22);
    opts.settings.public_key = None;
    let plan = HardeningPlan::without(&[HardeningStep::SystemUpdate]).unwrap();
    let mut progress = ResultAccumulator::new(22);

    let err = run_sequence(
        &session,
        &plan,
        &opts.settings,
        &mut progress,
        &RecordingReporter::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ProvisionError::StepFailed { number: 2, .. }));
    assert!(connector.commands().is_empty());
    assert!(progress.root_credential.is_none());
}
