//! OpenSSH implementation of the session ports.
//!
//! Each session owns a multiplexing master connection (`ControlMaster`) whose
//! socket lives in a private temp directory. Commands ride on that master, so
//! the session survives the SSH daemon being restarted or moved to a new port
//! mid-run: established connections are not dropped by a daemon restart.
//!
//! Host keys go to a per-session `known_hosts` inside the same directory.
//! Provider addresses get recycled, so the operator's own `known_hosts` would
//! often hold a stale key for a brand-new host.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::application::ports::{CommandRunner, Login, RemoteSession, SessionConnector};
use crate::domain::host::HostAddress;

const SSH: &str = "ssh";

/// Client-side settings shared by every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSshOptions {
    pub identity_file: Option<PathBuf>,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

/// Opens [`OpenSshSession`]s through the system `ssh` client.
pub struct OpenSshConnector<R> {
    runner: R,
    options: OpenSshOptions,
}

impl<R: CommandRunner + Clone> OpenSshConnector<R> {
    #[must_use]
    pub fn new(runner: R, options: OpenSshOptions) -> Self {
        Self { runner, options }
    }
}

/// One multiplexed connection to the target host.
///
/// Call [`RemoteSession::close`] to stop the master; dropping the session only
/// removes its socket directory.
pub struct OpenSshSession<R> {
    runner: R,
    control_dir: TempDir,
    destination: String,
    port: u16,
    base_args: Vec<String>,
    command_timeout: Duration,
}

impl<R: CommandRunner + Clone> SessionConnector for OpenSshConnector<R> {
    type Session = OpenSshSession<R>;

    async fn connect(&self, address: &HostAddress, login: &Login) -> Result<Self::Session> {
        let control_dir = tempfile::Builder::new()
            .prefix("hardhost-ssh-")
            .tempdir()
            .context("creating ssh control directory")?;
        let session = OpenSshSession {
            runner: self.runner.clone(),
            base_args: base_args(&self.options, control_dir.path()),
            control_dir,
            destination: format!("{}@{address}", login.user),
            port: login.port,
            command_timeout: self.options.command_timeout,
        };

        // -f backgrounds the master once authenticated; -N runs no command.
        let mut args = session.args();
        args.extend(
            ["-o", "ControlMaster=yes", "-o", "ControlPersist=no", "-f", "-N"]
                .map(String::from),
        );
        args.push(session.destination.clone());
        let deadline = self.options.connect_timeout + Duration::from_secs(5);
        let output = self
            .runner
            .run_with_timeout(SSH, &as_strs(&args), deadline)
            .await
            .with_context(|| format!("connecting to {}", session.destination))?;
        if !output.status.success() {
            anyhow::bail!(
                "ssh to {} failed: {}",
                session.destination,
                stderr_or_status(&output)
            );
        }
        tracing::debug!(destination = %session.destination, "ssh master started");
        Ok(session)
    }
}

impl<R: CommandRunner> OpenSshSession<R> {
    fn socket(&self) -> PathBuf {
        self.control_dir.path().join("master.sock")
    }

    /// Options common to every invocation against this session.
    fn args(&self) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push("-S".to_string());
        args.push(self.socket().display().to_string());
        args.push("-p".to_string());
        args.push(self.port.to_string());
        args
    }

    fn command_args(&self, command: &str) -> Vec<String> {
        let mut args = self.args();
        args.extend(["-o".to_string(), "ControlMaster=no".to_string()]);
        args.push(self.destination.clone());
        args.push("--".to_string());
        args.push(command.to_string());
        args
    }
}

impl<R: CommandRunner> RemoteSession for OpenSshSession<R> {
    async fn run(&self, command: &str) -> Result<Output> {
        tracing::debug!(destination = %self.destination, %command, "remote command");
        self.runner
            .run_with_timeout(SSH, &as_strs(&self.command_args(command)), self.command_timeout)
            .await
    }

    async fn run_with_input(&self, command: &str, input: &[u8]) -> Result<Output> {
        tracing::debug!(destination = %self.destination, %command, "remote command with stdin");
        self.runner
            .run_with_stdin(SSH, &as_strs(&self.command_args(command)), input)
            .await
    }

    async fn close(self) -> Result<()> {
        let mut args = self.args();
        args.extend(["-O".to_string(), "exit".to_string(), self.destination.clone()]);
        let output = self
            .runner
            .run_with_timeout(SSH, &as_strs(&args), Duration::from_secs(10))
            .await?;
        if !output.status.success() {
            anyhow::bail!("stopping ssh master failed: {}", stderr_or_status(&output));
        }
        Ok(())
    }
}

fn base_args(options: &OpenSshOptions, control_dir: &Path) -> Vec<String> {
    let known_hosts = control_dir.join("known_hosts");
    let mut args: Vec<String> = [
        "-o",
        "BatchMode=yes",
        "-o",
        "StrictHostKeyChecking=accept-new",
        "-o",
        "LogLevel=ERROR",
        "-o",
        "ServerAliveInterval=15",
    ]
    .map(String::from)
    .to_vec();
    args.push("-o".to_string());
    args.push(format!("UserKnownHostsFile={}", known_hosts.display()));
    args.push("-o".to_string());
    args.push(format!(
        "ConnectTimeout={}",
        options.connect_timeout.as_secs().max(1)
    ));
    if let Some(identity) = &options.identity_file {
        args.push("-i".to_string());
        args.push(identity.display().to_string());
        args.push("-o".to_string());
        args.push("IdentitiesOnly=yes".to_string());
    }
    args
}

fn as_strs(args: &[String]) -> Vec<&str> {
    args.iter().map(String::as_str).collect()
}

fn stderr_or_status(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exit status {:?}", output.status.code())
    } else {
        stderr
    }
}
