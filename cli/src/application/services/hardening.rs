//! Application service — apply the hardening steps over one remote session.
//!
//! Steps run strictly in plan order and the first failure stops the sequence.
//! Nothing is rolled back: a host that fails at step 4 keeps the changes made
//! by steps 1 to 3. Running the sequence twice against the same host is not
//! supported; the second run fails at user management because the admin
//! account already exists.

use std::process::Output;

use anyhow::Result;

use crate::application::ports::{ProgressReporter, RemoteSession};
use crate::domain::credential::GeneratedCredential;
use crate::domain::error::ProvisionError;
use crate::domain::hardening::{HardeningPlan, HardeningStep};
use crate::domain::remote::shell_quote;
use crate::domain::result::{ResultAccumulator, StepResult};

const SSHD_CONFIG: &str = "/etc/ssh/sshd_config";
const APT_PERIODIC: &str = "/etc/apt/apt.conf.d/10periodic";
const UNATTENDED_UPGRADE_LINE: &str = r#"APT::Periodic::Unattended-Upgrade "1";"#;
const APT_ENV: &str = "DEBIAN_FRONTEND=noninteractive";
const SOCKET_RELOAD: &str = "if systemctl is-enabled --quiet ssh.socket 2>/dev/null; \
     then systemctl daemon-reload && systemctl restart ssh.socket; fi";

/// Host-specific inputs the steps need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardeningSettings {
    pub admin_username: String,
    /// Port the SSH daemon ends up on.
    pub ssh_port: u16,
    /// Contents of the operator's public key file.
    pub public_key: Option<String>,
}

/// Run every step of `plan`, recording each outcome in `progress`.
///
/// A step that fails is recorded as a failure; later steps are never started
/// and leave no entry.
///
/// # Errors
///
/// Returns [`ProvisionError::StepFailed`] for the first step whose remote
/// command exits non-zero or cannot be run.
pub async fn run_sequence(
    session: &impl RemoteSession,
    plan: &HardeningPlan,
    settings: &HardeningSettings,
    progress: &mut ResultAccumulator,
    reporter: &impl ProgressReporter,
) -> Result<(), ProvisionError> {
    let total = HardeningStep::SEQUENCE.len();
    for &step in plan.steps() {
        reporter.step(&format!(
            "[{}/{total}] {}...",
            step.number(),
            capitalize(step.description())
        ));
        tracing::info!(step = %step, "hardening step started");

        match run_step(session, step, settings, progress).await {
            Ok(()) => {
                progress.record(StepResult::success(step));
                reporter.success(&format!("{step} done"));
            }
            Err(err) => {
                let reason = match &err {
                    ProvisionError::StepFailed { output, .. } => output.clone(),
                    other => other.to_string(),
                };
                progress.record(StepResult::failure(step, reason));
                tracing::warn!(step = %step, "hardening step failed; halting sequence");
                return Err(err);
            }
        }
    }
    Ok(())
}

/// Run a single step.
///
/// # Errors
///
/// Returns [`ProvisionError::StepFailed`] naming the command that failed.
pub async fn run_step(
    session: &impl RemoteSession,
    step: HardeningStep,
    settings: &HardeningSettings,
    progress: &mut ResultAccumulator,
) -> Result<(), ProvisionError> {
    match step {
        HardeningStep::SystemUpdate => system_update(session).await,
        HardeningStep::UserManagement => user_management(session, settings, progress).await,
        HardeningStep::SshDaemon => ssh_daemon(session, settings.ssh_port).await,
        HardeningStep::Firewall => firewall(session, settings.ssh_port).await,
        HardeningStep::UnattendedUpgrades => unattended_upgrades(session).await,
    }
}

async fn system_update(session: &impl RemoteSession) -> Result<(), ProvisionError> {
    let step = HardeningStep::SystemUpdate;
    let cmd = format!("apt-get update && {APT_ENV} apt-get upgrade -y");
    check(step, &cmd, session.run(&cmd).await)
}

async fn user_management(
    session: &impl RemoteSession,
    settings: &HardeningSettings,
    progress: &mut ResultAccumulator,
) -> Result<(), ProvisionError> {
    let step = HardeningStep::UserManagement;
    let Some(public_key) = settings.public_key.as_deref() else {
        return Err(ProvisionError::StepFailed {
            number: step.number(),
            step: step.name(),
            command: "install authorized_keys".to_string(),
            output: "no public key was loaded for the admin account".to_string(),
        });
    };
    let user = shell_quote(&settings.admin_username);
    let home = format!("/home/{}", settings.admin_username);
    let ssh_dir = shell_quote(&format!("{home}/.ssh"));
    let authorized_keys = shell_quote(&format!("{home}/.ssh/authorized_keys"));

    let root = GeneratedCredential::for_account("root");
    set_password(session, step, &root).await?;
    progress.root_credential = Some(root);

    let cmd = format!("adduser --disabled-password --gecos '' {user}");
    check(step, &cmd, session.run(&cmd).await)?;
    let cmd = format!("adduser {user} sudo");
    check(step, &cmd, session.run(&cmd).await)?;

    let admin = GeneratedCredential::for_account(settings.admin_username.clone());
    set_password(session, step, &admin).await?;
    progress.admin_credential = Some(admin);

    let cmd = format!("install -d -m 700 -o {user} -g {user} {ssh_dir}");
    check(step, &cmd, session.run(&cmd).await)?;
    let cmd = format!("cat > {authorized_keys}");
    let key_line = format!("{}\n", public_key.trim());
    check(
        step,
        &cmd,
        session.run_with_input(&cmd, key_line.as_bytes()).await,
    )?;
    let cmd = format!("chown {user}:{user} {authorized_keys} && chmod 600 {authorized_keys}");
    check(step, &cmd, session.run(&cmd).await)
}

async fn set_password(
    session: &impl RemoteSession,
    step: HardeningStep,
    credential: &GeneratedCredential,
) -> Result<(), ProvisionError> {
    // The secret travels on stdin; the label is what error messages show.
    let label = format!("chpasswd ({})", credential.account);
    let line = credential.chpasswd_line();
    check(
        step,
        &label,
        session.run_with_input("chpasswd", line.as_bytes()).await,
    )
}

async fn ssh_daemon(session: &impl RemoteSession, port: u16) -> Result<(), ProvisionError> {
    let step = HardeningStep::SshDaemon;
    let port_line = format!("Port {port}");
    let mut edits: Vec<(&str, &str)> = vec![("#Port 22", "Port 22")];
    if port != 22 {
        edits.push(("Port 22", port_line.as_str()));
    }
    edits.extend([
        ("#PasswordAuthentication yes", "PasswordAuthentication no"),
        ("PasswordAuthentication yes", "PasswordAuthentication no"),
        ("PermitRootLogin yes", "PermitRootLogin no"),
        ("PermitRootLogin prohibit-password", "PermitRootLogin no"),
    ]);

    for (find, replace) in edits {
        let label = format!("edit {SSHD_CONFIG}: {find} -> {replace}");
        check(
            step,
            &label,
            session.edit_file(SSHD_CONFIG, find, replace).await,
        )?;
    }

    // sed succeeds without a match, so images with no Port line get one.
    if port != 22 {
        let label = format!("append to {SSHD_CONFIG}: {port_line}");
        check(
            step,
            &label,
            session.append_line(SSHD_CONFIG, &port_line).await,
        )?;
    }

    // A broken config would keep the daemon from coming back after restart.
    let cmd = "sshd -t";
    check(step, cmd, session.run(cmd).await)?;
    let cmd = format!("sshd -T | grep -qx 'port {port}'");
    check(step, &cmd, session.run(&cmd).await)?;
    // Socket-activated images take the listen port from ssh.socket, which
    // the systemd generator rebuilds from sshd_config on reload.
    let cmd = SOCKET_RELOAD;
    check(step, cmd, session.run(cmd).await)?;
    let cmd = "service ssh restart";
    check(step, cmd, session.run(cmd).await)
}

async fn firewall(session: &impl RemoteSession, port: u16) -> Result<(), ProvisionError> {
    let step = HardeningStep::Firewall;
    let cmd = format!("ufw allow {port}/tcp");
    check(step, &cmd, session.run(&cmd).await)?;
    let cmd = "ufw --force enable";
    check(step, cmd, session.run(cmd).await)
}

async fn unattended_upgrades(session: &impl RemoteSession) -> Result<(), ProvisionError> {
    let step = HardeningStep::UnattendedUpgrades;
    let cmd = format!("{APT_ENV} apt-get -yq install unattended-upgrades");
    check(step, &cmd, session.run(&cmd).await)?;
    let label = format!("append to {APT_PERIODIC}");
    check(
        step,
        &label,
        session
            .append_line(APT_PERIODIC, UNATTENDED_UPGRADE_LINE)
            .await,
    )
}

/// Turn a remote command's result into a step outcome.
fn check(step: HardeningStep, command: &str, result: Result<Output>) -> Result<(), ProvisionError> {
    let failed = |output: String| ProvisionError::StepFailed {
        number: step.number(),
        step: step.name(),
        command: command.to_string(),
        output,
    };
    let output = result.map_err(|e| failed(format!("{e:#}")))?;
    if output.status.success() {
        return Ok(());
    }
    let mut text = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(stdout);
    }
    if text.is_empty() {
        text = match output.status.code() {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        };
    }
    Err(failed(text))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
