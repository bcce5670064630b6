//! Orchestrator lifecycle states and the legal transitions between them.

use std::fmt;

/// Where a provisioning run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    Requested,
    ActionPending,
    AddressResolved,
    Hardening,
    Done,
    Failed,
}

impl ProvisionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "REQUESTED",
            Self::ActionPending => "ACTION_PENDING",
            Self::AddressResolved => "ADDRESS_RESOLVED",
            Self::Hardening => "HARDENING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// The state reached on success from this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Requested => Some(Self::ActionPending),
            Self::ActionPending => Some(Self::AddressResolved),
            Self::AddressResolved => Some(Self::Hardening),
            Self::Hardening => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    /// `Failed` is reachable from every non-terminal state; otherwise only `next()`.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Failed || self.next() == Some(to)
    }
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records every state a run passes through.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    history: Vec<ProvisionState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    #[must_use]
    pub fn new() -> Self {
        Self {
            history: vec![ProvisionState::Requested],
        }
    }

    #[must_use]
    pub fn current(&self) -> ProvisionState {
        self.history
            .last()
            .copied()
            .unwrap_or(ProvisionState::Requested)
    }

    /// Move to `to`. Illegal transitions are ignored and logged; the orchestrator
    /// only ever drives the linear path plus `Failed`.
    pub fn advance(&mut self, to: ProvisionState) {
        let from = self.current();
        if from.can_transition_to(to) {
            tracing::debug!(%from, %to, "provisioning state change");
            self.history.push(to);
        } else {
            tracing::error!(%from, %to, "illegal provisioning state change ignored");
        }
    }

    #[must_use]
    pub fn entered(&self, state: ProvisionState) -> bool {
        self.history.contains(&state)
    }

    #[must_use]
    pub fn history(&self) -> &[ProvisionState] {
        &self.history
    }

    #[must_use]
    pub fn into_history(self) -> Vec<ProvisionState> {
        self.history
    }
}
