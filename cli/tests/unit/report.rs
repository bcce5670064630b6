//! Unit tests for result artifact persistence.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::cell::RefCell;
use std::future;
use std::path::{Path, PathBuf};

use anyhow::Result;
use hardhost_cli::application::ports::ArtifactWriter;
use hardhost_cli::application::services::provision::provision;
use hardhost_cli::application::services::report::{write_partial, write_result};
use hardhost_cli::domain::host::ActionStatus;

use crate::helpers::{FakeConnector, FakeProvider, RecordingReporter, options};

#[derive(Default)]
struct MemoryWriter {
    files: RefCell<Vec<(PathBuf, String)>>,
}

impl ArtifactWriter for MemoryWriter {
    fn write_private(&self, path: &Path, contents: &str) -> Result<()> {
        self.files
            .borrow_mut()
            .push((path.to_path_buf(), contents.to_string()));
        Ok(())
    }
}

#[tokio::test]
async fn completed_run_writes_done_artifact() {
    let result = provision(
        &FakeProvider::ready(),
        &FakeConnector::new(),
        &RecordingReporter::default(),
        &options("deploy", 2222),
        future::pending(),
    )
    .await
    .unwrap();
    let writer = MemoryWriter::default();

    write_result(&writer, Path::new("serverinfo.txt"), &result).unwrap();

    let files = writer.files.borrow();
    assert_eq!(files.len(), 1);
    let text = &files[0].1;
    assert!(text.contains("Status: DONE"));
    assert!(text.contains("SSH Port: 2222"));
    assert!(text.contains("5. unattended-upgrades: ok"));
}

#[tokio::test]
async fn failure_after_credentials_writes_partial_artifact() {
    let failure = provision(
        &FakeProvider::ready(),
        &FakeConnector::failing_on("ufw allow"),
        &RecordingReporter::default(),
        &options("deploy", 22),
        future::pending(),
    )
    .await
    .unwrap_err();
    let writer = MemoryWriter::default();

    let written = write_partial(&writer, Path::new("serverinfo.txt"), &failure).unwrap();

    assert!(written);
    let files = writer.files.borrow();
    let text = &files[0].1;
    let root = failure.progress.root_credential.as_ref().unwrap();
    assert!(text.contains(&format!("root: {}", root.secret())));
    assert!(text.contains("Status: FAILED (STEP_FAILED)"));
}

#[tokio::test]
async fn failure_before_credentials_writes_nothing() {
    let failure = provision(
        &FakeProvider::new(&[ActionStatus::Errored]),
        &FakeConnector::new(),
        &RecordingReporter::default(),
        &options("deploy", 22),
        future::pending(),
    )
    .await
    .unwrap_err();
    let writer = MemoryWriter::default();

    assert!(!write_partial(&writer, Path::new("serverinfo.txt"), &failure).unwrap());
    assert!(writer.files.borrow().is_empty());
}
