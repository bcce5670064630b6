//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::Path;
use std::process::Output;
use std::time::Duration;

use anyhow::Result;

use crate::domain::host::{
    ActionId, ActionStatus, HostAddress, HostHandle, HostId, HostRequest, KeyRef,
};
use crate::domain::remote::{append_command, substitute_command};

// ── Provider Port ─────────────────────────────────────────────────────────────

/// Cloud provider operations needed to bring one host up.
#[allow(async_fn_in_trait)]
pub trait HostProvider {
    /// Keys registered with the account; all of them are attached at creation
    /// so root can log in before hardening.
    async fn list_ssh_keys(&self) -> Result<Vec<KeyRef>>;
    /// Submit the create request. Errors mean no host exists.
    async fn create_host(&self, request: &HostRequest) -> Result<HostHandle>;
    /// Re-fetch the status of one action.
    async fn action_status(&self, action: &ActionId) -> Result<ActionStatus>;
    /// Re-fetch the host record. `None` when it has no public address yet.
    async fn host_address(&self, host: &HostId) -> Result<Option<HostAddress>>;
}

// ── Remote Session Ports ──────────────────────────────────────────────────────

/// Who to log in as and on which port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub user: String,
    pub port: u16,
}

impl Login {
    /// The privileged account a fresh host accepts keys for.
    #[must_use]
    pub fn root() -> Self {
        Self {
            user: "root".to_string(),
            port: 22,
        }
    }
}

/// Opens sessions against a resolved host.
#[allow(async_fn_in_trait)]
pub trait SessionConnector {
    type Session: RemoteSession;

    /// Open an authenticated session.
    ///
    /// # Errors
    ///
    /// Returns an error if the host refuses or does not answer.
    async fn connect(&self, address: &HostAddress, login: &Login) -> Result<Self::Session>;
}

/// One open session on the target host.
///
/// Every operation resolves to the remote command's `Output`; a non-zero exit
/// status is not an `Err`. `Err` is reserved for transport failures.
#[allow(async_fn_in_trait)]
pub trait RemoteSession {
    /// Run a shell command as the session user.
    async fn run(&self, command: &str) -> Result<Output>;

    /// Run a shell command with `input` piped to its stdin.
    async fn run_with_input(&self, command: &str, input: &[u8]) -> Result<Output>;

    /// Replace every literal occurrence of `find` with `replace` in a remote file.
    async fn edit_file(&self, path: &str, find: &str, replace: &str) -> Result<Output> {
        self.run(&substitute_command(path, find, replace)).await
    }

    /// Append `line` to a remote file unless it is already there.
    async fn append_line(&self, path: &str, line: &str) -> Result<Output> {
        self.run(&append_command(path, line)).await
    }

    /// Tear the session down.
    async fn close(self) -> Result<()>
    where
        Self: Sized;
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
    /// Run a program with stdin piped from `stdin`.
    async fn run_with_stdin(&self, program: &str, args: &[&str], stdin: &[u8]) -> Result<Output>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait, no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
    /// Signal that a wait is still ongoing. Called once per poll or retry.
    fn waiting(&self, message: &str);
}

// ── Artifact Port ─────────────────────────────────────────────────────────────

/// Persists the result artifact.
pub trait ArtifactWriter {
    /// Write `contents` to `path` readable by the current user only.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    fn write_private(&self, path: &Path, contents: &str) -> Result<()>;
}
