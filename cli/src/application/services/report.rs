//! Application service — persist the result artifact.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::application::ports::ArtifactWriter;
use crate::domain::error::ProvisionFailure;
use crate::domain::result::{ProvisioningResult, render_artifact, render_partial_artifact};

/// Write the artifact for a completed run.
///
/// # Errors
///
/// Returns an error if the writer fails.
pub fn write_result(
    writer: &impl ArtifactWriter,
    path: &Path,
    result: &ProvisioningResult,
) -> Result<()> {
    writer
        .write_private(path, &render_artifact(result))
        .with_context(|| format!("writing result to {}", path.display()))
}

/// Write what a failed run collected, if it generated any credentials.
///
/// Returns `false` without touching the filesystem when there is nothing
/// worth keeping.
///
/// # Errors
///
/// Returns an error if the writer fails.
pub fn write_partial(
    writer: &impl ArtifactWriter,
    path: &Path,
    failure: &ProvisionFailure,
) -> Result<bool> {
    if !failure.progress.holds_credentials() {
        return Ok(false);
    }
    let text = render_partial_artifact(&failure.progress, failure.kind().code(), Utc::now());
    writer
        .write_private(path, &text)
        .with_context(|| format!("writing partial result to {}", path.display()))?;
    Ok(true)
}
