//! Test utilities for orchard-lib.
//!
//! Provides a container backend double that executes step scripts with the
//! local shell, so the pipeline's state machine can be exercised end to end
//! without a container runtime, and a helper for creating throwaway git
//! repositories.

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::process::Command;

use crate::container::{BindMount, ContainerBackend, ContainerError, RunningContainer};

/// Backend double running scripts in `/bin/sh` instead of a container.
///
/// Mounts are ignored (scripts `cd` into the mount's container path, which
/// tests map onto a real local directory). Image bookkeeping is recorded
/// in shared lists for assertions.
pub struct ShellBackend {
  images: Vec<String>,
  fail_snapshots: bool,
  starts: Arc<Mutex<Vec<String>>>,
  committed: Arc<Mutex<Vec<String>>>,
  removed: Arc<Mutex<Vec<String>>>,
}

impl ShellBackend {
  pub fn new() -> Self {
    Self {
      images: Vec::new(),
      fail_snapshots: false,
      starts: Arc::new(Mutex::new(Vec::new())),
      committed: Arc::new(Mutex::new(Vec::new())),
      removed: Arc::new(Mutex::new(Vec::new())),
    }
  }

  /// Backend reporting the given image labels as locally present.
  pub fn with_images<I: IntoIterator<Item = &'static str>>(images: I) -> Self {
    Self {
      images: images.into_iter().map(str::to_string).collect(),
      ..Self::new()
    }
  }

  /// Backend whose snapshot operation always fails.
  pub fn failing_snapshots() -> Self {
    Self {
      fail_snapshots: true,
      ..Self::new()
    }
  }

  /// Images containers were started from, in order.
  pub fn starts(&self) -> Arc<Mutex<Vec<String>>> {
    self.starts.clone()
  }

  /// Snapshot images committed, in order.
  pub fn committed(&self) -> Arc<Mutex<Vec<String>>> {
    self.committed.clone()
  }

  /// Images removed, in order.
  pub fn removed(&self) -> Arc<Mutex<Vec<String>>> {
    self.removed.clone()
  }
}

#[async_trait]
impl ContainerBackend for ShellBackend {
  async fn image_exists(&self, label: &str) -> Result<bool, ContainerError> {
    Ok(self.images.iter().any(|image| image == label))
  }

  fn start(
    &self,
    image: &str,
    _mounts: &[BindMount],
    env: &[(String, String)],
  ) -> Result<RunningContainer, ContainerError> {
    self.starts.lock().unwrap().push(image.to_string());

    let mut command = Command::new("/bin/sh");
    for (key, value) in env {
      command.env(key, value);
    }

    let child = command
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(|source| ContainerError::Spawn { source })?;

    Ok(RunningContainer::new(child))
  }

  async fn snapshot_last(&self, image: &str) -> Result<(), ContainerError> {
    if self.fail_snapshots {
      return Err(ContainerError::SnapshotFailed {
        image: image.to_string(),
        detail: "snapshots disabled".to_string(),
      });
    }

    self.committed.lock().unwrap().push(image.to_string());
    Ok(())
  }

  async fn remove_images(&self, images: &[String]) {
    self.removed.lock().unwrap().extend(images.iter().cloned());
  }
}

impl Default for ShellBackend {
  fn default() -> Self {
    Self::new()
  }
}

/// Initializes `dir` as a git repository with one commit of its current
/// contents. Writes a README first when the directory is empty, so there
/// is always something to commit.
pub async fn init_git_repo(dir: &Path) {
  let is_empty = std::fs::read_dir(dir)
    .map(|mut entries| entries.next().is_none())
    .unwrap_or(true);
  if is_empty {
    std::fs::write(dir.join("README"), "fixture\n").unwrap();
  }

  run_git(dir, &["init"]).await;
  run_git(dir, &["add", "."]).await;
  run_git(
    dir,
    &[
      "-c",
      "user.email=ci@example.invalid",
      "-c",
      "user.name=ci",
      "commit",
      "-m",
      "initial",
    ],
  )
  .await;
}

async fn run_git(dir: &Path, args: &[&str]) {
  let status = Command::new("git")
    .arg("-C")
    .arg(dir)
    .args(args)
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .status()
    .await
    .expect("failed to spawn git");
  assert!(status.success(), "git {args:?} failed in {}", dir.display());
}
