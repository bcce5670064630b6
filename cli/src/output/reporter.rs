//! `TerminalReporter` — Presentation-layer implementation of `ProgressReporter`.
//!
//! Wraps `&OutputContext` so application services can emit progress events
//! without depending on any presentation type directly.

use std::cell::RefCell;

use indicatif::ProgressBar;

use crate::application::ports::ProgressReporter;
use crate::output::{OutputContext, progress};

/// Terminal progress reporter that wraps an `OutputContext`.
///
/// - `step()` prints `"  → {message}"`
/// - `success()` prints `"  ✓ {message}"`
/// - `warn()` prints `"  ⚠ {message}"`
/// - `waiting()` drives a spinner on a TTY. Elsewhere it prints a line only
///   when the kind of wait changes, so polling does not flood CI logs.
///
/// Everything except errors is suppressed when `ctx.quiet` is set.
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
    spinner: RefCell<Option<ProgressBar>>,
    last_wait: RefCell<Option<String>>,
}

impl<'a> TerminalReporter<'a> {
    /// Create a new `TerminalReporter` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self {
            ctx,
            spinner: RefCell::new(None),
            last_wait: RefCell::new(None),
        }
    }

    /// Stop and erase any spinner so the next line prints cleanly.
    pub fn clear(&self) {
        if let Some(pb) = self.spinner.borrow_mut().take() {
            pb.finish_and_clear();
        }
        self.last_wait.borrow_mut().take();
    }
}

impl Drop for TerminalReporter<'_> {
    fn drop(&mut self) {
        self.clear();
    }
}

/// The part of a wait message that identifies what is being waited on.
fn wait_kind(message: &str) -> &str {
    message.split(" (").next().unwrap_or(message)
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        self.clear();
        self.ctx.step(message);
    }

    fn success(&self, message: &str) {
        self.clear();
        self.ctx.success(message);
    }

    fn warn(&self, message: &str) {
        self.clear();
        self.ctx.warn(message);
    }

    fn waiting(&self, message: &str) {
        if self.ctx.quiet {
            return;
        }
        if self.ctx.show_progress() {
            let mut spinner = self.spinner.borrow_mut();
            match spinner.as_ref() {
                Some(pb) => pb.set_message(message.to_string()),
                None => *spinner = Some(progress::spinner(message)),
            }
            return;
        }
        let kind = wait_kind(message);
        let mut last = self.last_wait.borrow_mut();
        if last.as_deref() != Some(kind) {
            self.ctx.step(message);
            *last = Some(kind.to_string());
        }
    }
}
