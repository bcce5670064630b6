//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use crate::output::OutputContext;

/// Create a cloud host and harden it in one run
#[derive(Parser)]
#[command(
    name = "hardhost",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output (a set NO_COLOR does the same)
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Increase diagnostic logging on stderr (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a host, wait for it, and apply the hardening steps
    Run(commands::run::RunArgs),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be set up.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            no_color,
            quiet,
            command,
            ..
        } = self;
        match command {
            Command::Version => {
                commands::version::run();
                Ok(ExitCode::SUCCESS)
            }
            Command::Run(args) => {
                let ctx = OutputContext::new(no_color, quiet);
                commands::run::run(&ctx, args).await
            }
        }
    }
}
