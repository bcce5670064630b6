//! Shared test helpers: a scripted provider, a recording SSH connector and a
//! recording progress reporter.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::process::{ExitStatus, Output};
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use hardhost_cli::application::ports::{
    HostProvider, Login, ProgressReporter, RemoteSession, SessionConnector,
};
use hardhost_cli::application::services::hardening::HardeningSettings;
use hardhost_cli::application::services::poller::PollPolicy;
use hardhost_cli::application::services::provision::ProvisionOptions;
use hardhost_cli::application::services::readiness::ProbePolicy;
use hardhost_cli::domain::hardening::HardeningPlan;
use hardhost_cli::domain::host::{
    ActionId, ActionStatus, HostAddress, HostHandle, HostId, HostRequest, KeyRef,
};

pub const HOST_ID: &str = "3164494";
pub const ACTION_ID: &str = "36804636";
pub const ADDRESS: &str = "203.0.113.10";
pub const PUBLIC_KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIHx operator@laptop";

// ── Output constructors ──────────────────────────────────────────────────────

#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

pub fn ok_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

pub fn err_output(code: i32, stderr: &str) -> Output {
    Output {
        status: exit_status(code),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

// ── Options ──────────────────────────────────────────────────────────────────

/// Options with every delay set to zero so tests never sleep.
pub fn options(admin: &str, ssh_port: u16) -> ProvisionOptions {
    ProvisionOptions {
        request: HostRequest {
            name: "web-1".to_string(),
            region: "nyc3".to_string(),
            image: "ubuntu-24-04-x64".to_string(),
            size: "s-1vcpu-1gb".to_string(),
            ssh_keys: Vec::new(),
            backups: false,
        },
        plan: HardeningPlan::default(),
        settings: HardeningSettings {
            admin_username: admin.to_string(),
            ssh_port,
            public_key: Some(PUBLIC_KEY.to_string()),
        },
        settle_delay: Duration::ZERO,
        poll: PollPolicy {
            interval: Duration::ZERO,
            max_attempts: 5,
        },
        probe: ProbePolicy {
            attempts: 3,
            initial_backoff: Duration::ZERO,
        },
    }
}

// ── Provider ─────────────────────────────────────────────────────────────────

/// Provider whose action statuses are read from a script.
///
/// Once the script runs out every further read reports `completed`.
pub struct FakeProvider {
    pub keys: Vec<KeyRef>,
    pub reject_create: Option<String>,
    pub statuses: RefCell<VecDeque<ActionStatus>>,
    /// Status reads that fail before the script is consulted.
    pub failing_reads: Cell<u32>,
    pub address: Option<HostAddress>,
    pub status_reads: Cell<u32>,
    pub host_reads: Cell<u32>,
    pub created: RefCell<Vec<HostRequest>>,
}

impl FakeProvider {
    pub fn new(statuses: &[ActionStatus]) -> Self {
        Self {
            keys: vec![KeyRef(512_190)],
            reject_create: None,
            statuses: RefCell::new(statuses.iter().copied().collect()),
            failing_reads: Cell::new(0),
            address: Some(HostAddress(ADDRESS.to_string())),
            status_reads: Cell::new(0),
            host_reads: Cell::new(0),
            created: RefCell::new(Vec::new()),
        }
    }

    pub fn ready() -> Self {
        Self::new(&[ActionStatus::InProgress, ActionStatus::Completed])
    }

    pub fn handle() -> HostHandle {
        HostHandle {
            id: HostId(HOST_ID.to_string()),
            pending_actions: vec![ActionId(ACTION_ID.to_string())],
        }
    }

    pub fn handle_with_actions(actions: &[&str]) -> HostHandle {
        HostHandle {
            id: HostId(HOST_ID.to_string()),
            pending_actions: actions.iter().map(|a| ActionId((*a).to_string())).collect(),
        }
    }
}

impl HostProvider for FakeProvider {
    async fn list_ssh_keys(&self) -> Result<Vec<KeyRef>> {
        Ok(self.keys.clone())
    }

    async fn create_host(&self, request: &HostRequest) -> Result<HostHandle> {
        if let Some(reason) = &self.reject_create {
            anyhow::bail!("POST /droplets returned 422: {reason}");
        }
        self.created.borrow_mut().push(request.clone());
        Ok(Self::handle())
    }

    async fn action_status(&self, action: &ActionId) -> Result<ActionStatus> {
        self.status_reads.set(self.status_reads.get() + 1);
        if self.failing_reads.get() > 0 {
            self.failing_reads.set(self.failing_reads.get() - 1);
            anyhow::bail!("GET /actions/{action} returned 503: service unavailable");
        }
        Ok(self
            .statuses
            .borrow_mut()
            .pop_front()
            .unwrap_or(ActionStatus::Completed))
    }

    async fn host_address(&self, _: &HostId) -> Result<Option<HostAddress>> {
        self.host_reads.set(self.host_reads.get() + 1);
        Ok(self.address.clone())
    }
}

// ── SSH ──────────────────────────────────────────────────────────────────────

/// One command a session was asked to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub command: String,
    pub input: Option<String>,
}

/// State of the simulated host, shared by every session opened on it.
#[derive(Default)]
pub struct HostState {
    pub calls: Vec<Call>,
    pub users: HashSet<String>,
    pub closed: u32,
}

/// Connector to a simulated host that records everything run on it.
pub struct FakeConnector {
    pub host: Rc<RefCell<HostState>>,
    /// Commands containing this substring exit 1.
    pub fail_on: Option<String>,
    /// Sessions yield to the runtime before every command.
    pub yielding: bool,
    /// Connection attempts refused before one succeeds.
    pub refuse: Cell<u32>,
    pub attempts: Cell<u32>,
    pub logins: RefCell<Vec<Login>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self {
            host: Rc::new(RefCell::new(HostState::default())),
            fail_on: None,
            yielding: false,
            refuse: Cell::new(0),
            attempts: Cell::new(0),
            logins: RefCell::new(Vec::new()),
        }
    }

    pub fn failing_on(pattern: &str) -> Self {
        Self {
            fail_on: Some(pattern.to_string()),
            ..Self::new()
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.host
            .borrow()
            .calls
            .iter()
            .map(|c| c.command.clone())
            .collect()
    }

    pub fn inputs(&self) -> Vec<String> {
        self.host
            .borrow()
            .calls
            .iter()
            .filter_map(|c| c.input.clone())
            .collect()
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.commands().iter().any(|c| c.contains(needle))
    }
}

impl SessionConnector for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self, _: &HostAddress, login: &Login) -> Result<FakeSession> {
        self.attempts.set(self.attempts.get() + 1);
        self.logins.borrow_mut().push(login.clone());
        if self.refuse.get() > 0 {
            self.refuse.set(self.refuse.get() - 1);
            anyhow::bail!("ssh: connect to host {ADDRESS} port 22: Connection refused");
        }
        Ok(FakeSession {
            host: Rc::clone(&self.host),
            fail_on: self.fail_on.clone(),
            yielding: self.yielding,
        })
    }
}

pub struct FakeSession {
    host: Rc<RefCell<HostState>>,
    fail_on: Option<String>,
    yielding: bool,
}

impl FakeSession {
    fn execute(&self, command: &str, input: Option<&[u8]>) -> Output {
        let mut host = self.host.borrow_mut();
        host.calls.push(Call {
            command: command.to_string(),
            input: input.map(|i| String::from_utf8_lossy(i).into_owned()),
        });
        if self.fail_on.as_deref().is_some_and(|p| command.contains(p)) {
            return err_output(1, "simulated failure");
        }
        if let Some(user) = command.strip_prefix("adduser --disabled-password --gecos '' ") {
            if !host.users.insert(user.to_string()) {
                return err_output(1, &format!("adduser: The user `{user}' already exists."));
            }
        }
        ok_output()
    }
}

impl RemoteSession for FakeSession {
    async fn run(&self, command: &str) -> Result<Output> {
        if self.yielding {
            tokio::task::yield_now().await;
        }
        Ok(self.execute(command, None))
    }

    async fn run_with_input(&self, command: &str, input: &[u8]) -> Result<Output> {
        if self.yielding {
            tokio::task::yield_now().await;
        }
        Ok(self.execute(command, Some(input)))
    }

    async fn close(self) -> Result<()> {
        self.host.borrow_mut().closed += 1;
        Ok(())
    }
}

// ── Reporter ─────────────────────────────────────────────────────────────────

/// Records every progress event as `kind: message`.
#[derive(Default)]
pub struct RecordingReporter {
    pub events: RefCell<Vec<String>>,
}

impl RecordingReporter {
    pub fn count(&self, prefix: &str) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    pub fn joined(&self) -> String {
        self.events.borrow().join("\n")
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.events.borrow_mut().push(format!("step: {message}"));
    }
    fn success(&self, message: &str) {
        self.events.borrow_mut().push(format!("success: {message}"));
    }
    fn warn(&self, message: &str) {
        self.events.borrow_mut().push(format!("warn: {message}"));
    }
    fn waiting(&self, message: &str) {
        self.events.borrow_mut().push(format!("waiting: {message}"));
    }
}
