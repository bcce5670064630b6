//! Human-readable terminal renderer.

use std::path::Path;

use owo_colors::OwoColorize as _;

use crate::domain::error::{ProvisionError, ProvisionFailure};
use crate::domain::host::HostRequest;
use crate::domain::result::{ProvisioningResult, StepOutcome};
use crate::output::OutputContext;

/// Renders run summaries and failures using `OutputContext`.
///
/// Never prints generated secrets; those only go to the result file.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Describe what is about to be created.
    pub fn render_plan(&self, request: &HostRequest, ssh_port: u16, steps: usize) {
        self.ctx.header(&format!("Provisioning {}", request.name));
        self.ctx.kv("Region:", &request.region);
        self.ctx.kv("Size:", &request.size);
        self.ctx.kv("Image:", &request.image);
        self.ctx.kv("SSH port:", &ssh_port.to_string());
        self.ctx.kv("Steps:", &steps.to_string());
        if !self.ctx.quiet {
            println!();
        }
    }

    /// Summarise a completed run.
    pub fn render_result(&self, result: &ProvisioningResult, artifact: &Path) {
        if !self.ctx.quiet {
            println!();
        }
        self.ctx.header("Host ready");
        self.ctx.kv("Host ID:", &result.host_id.to_string());
        self.ctx.kv("Address:", &result.address.to_string());
        self.ctx.kv("SSH port:", &result.ssh_port.to_string());
        let ok = result.steps.iter().filter(|s| s.is_success()).count();
        self.ctx
            .kv("Steps:", &format!("{ok}/{} succeeded", result.steps.len()));
        self.ctx.kv("Credentials:", &artifact.display().to_string());
        self.ctx.warn(&format!(
            "{} holds plaintext passwords (mode 0600). Move them to a password manager and delete the file.",
            artifact.display()
        ));
        self.ctx.success(&format!("Connect with: {}", result.connect_hint()));
    }

    /// Report a failed run on stderr. Never suppressed.
    pub fn render_failure(&self, failure: &ProvisionFailure) {
        self.render_error(&failure.error);
        eprintln!(
            "  {} failed during {}",
            "state:".style(self.ctx.styles.dim),
            failure.failed_in
        );
        if let Some(host) = &failure.progress.host_id {
            eprintln!("  {} {host}", "host id:".style(self.ctx.styles.dim));
        }
        for result in &failure.progress.steps {
            if let StepOutcome::Failure { .. } = result.outcome {
                eprintln!(
                    "  {} step {} ({}) did not complete; later steps were not attempted",
                    "note:".style(self.ctx.styles.dim),
                    result.step.number(),
                    result.step
                );
            }
        }
    }

    /// Report an error with its operator-facing code.
    pub fn render_error(&self, error: &ProvisionError) {
        let code = error.kind().code();
        self.ctx.error(&format!("{} {error}", code.style(self.ctx.styles.error)));
    }

    /// Point the operator at a partial result file.
    pub fn render_partial_written(&self, artifact: &Path) {
        eprintln!(
            "  {} credentials already applied to the host were saved to {} (mode 0600)",
            "⚠".style(self.ctx.styles.warning),
            artifact.display()
        );
    }
}
