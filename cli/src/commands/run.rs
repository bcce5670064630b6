//! Run command — provision one host and harden it.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use crate::application::services::provision::{ProvisionOptions, provision};
use crate::application::services::report::{write_partial, write_result};
use crate::domain::error::ProvisionError;
use crate::domain::result::render_artifact;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::{self, TOKEN_ENV};
use crate::infra::digitalocean::DigitalOceanClient;
use crate::infra::fs::LocalFs;
use crate::infra::ssh::{OpenSshConnector, OpenSshOptions};
use crate::output::{HumanRenderer, OutputContext, TerminalReporter};

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Configuration file (default: $HARDHOST_CONFIG or ./hardhost.yaml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// DigitalOcean API token; overrides provider.api_token
    #[arg(long, env = TOKEN_ENV, hide_env_values = true)]
    pub token: Option<String>,

    /// Alternative API root, used against local API stubs
    #[arg(long, env = "HARDHOST_API_URL", hide = true)]
    pub api_url: Option<String>,
}

/// Entry point for `hardhost run`.
///
/// Failures of the run itself are rendered here and reported through the
/// returned exit code.
///
/// # Errors
///
/// Returns an error only when the HTTP client cannot be built.
pub async fn run(ctx: &OutputContext, args: RunArgs) -> Result<ExitCode> {
    let renderer = HumanRenderer::new(ctx);

    let path = config::resolve_path(args.config.as_deref());
    tracing::debug!(path = %path.display(), "loading configuration");
    let loaded = match config::load(&path, args.token) {
        Ok(loaded) => loaded,
        Err(e) => return Ok(reject(&renderer, &e)),
    };
    let cfg = &loaded.config;
    let opts = match ProvisionOptions::from_config(cfg, loaded.public_key.clone()) {
        Ok(opts) => opts,
        Err(e) => return Ok(reject(&renderer, &e)),
    };

    let token = cfg.provider.api_token.clone().unwrap_or_default();
    let timing = &cfg.timing;
    let provider = match &args.api_url {
        Some(url) => DigitalOceanClient::with_base_url(token, url, timing.http_timeout()),
        None => DigitalOceanClient::new(token, timing.http_timeout()),
    }
    .context("building API client")?;
    let connector = OpenSshConnector::new(
        TokioCommandRunner::new(timing.command_timeout()),
        OpenSshOptions {
            identity_file: cfg.host.identity_file.clone(),
            connect_timeout: timing.connect_timeout(),
            command_timeout: timing.command_timeout(),
        },
    );

    renderer.render_plan(&opts.request, opts.settings.ssh_port, opts.plan.len());

    let reporter = TerminalReporter::new(ctx);
    let outcome = provision(&provider, &connector, &reporter, &opts, interrupted()).await;
    reporter.clear();

    let artifact = &cfg.output.result_file;
    match outcome {
        Ok(result) => {
            if let Err(e) = write_result(&LocalFs, artifact, &result) {
                ctx.error(&format!("{e:#}"));
                // Credentials exist only in memory now; do not lose them.
                println!("{}", render_artifact(&result));
                return Ok(ExitCode::FAILURE);
            }
            renderer.render_result(&result, artifact);
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            renderer.render_failure(&failure);
            match write_partial(&LocalFs, artifact, &failure) {
                Ok(true) => renderer.render_partial_written(artifact),
                Ok(false) => {}
                Err(e) => ctx.error(&format!("{e:#}")),
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn reject(renderer: &HumanRenderer<'_>, error: &ProvisionError) -> ExitCode {
    renderer.render_error(error);
    ExitCode::FAILURE
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
