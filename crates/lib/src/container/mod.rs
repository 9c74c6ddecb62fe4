//! Isolated environment backend.
//!
//! A thin control surface over an external container runtime: query images,
//! start a container with mounts and environment, snapshot the most recent
//! container's state into a new image, and delete snapshot images.
//!
//! The backend never interprets build semantics; it only manages environment
//! lifecycle. The step script is delivered over the container's stdin as an
//! opaque payload ([`RunningContainer::pipe_script`]) and is never
//! interpolated into a command line.

mod docker;

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStderr, ChildStdout};

pub use docker::Docker;

/// Errors from the container runtime.
#[derive(Debug, Error)]
pub enum ContainerError {
  /// The runtime binary could not be spawned at all.
  #[error("failed to spawn container runtime: {source}")]
  Spawn {
    #[source]
    source: io::Error,
  },

  /// A runtime command exited nonzero.
  #[error("{command} failed with exit code {code:?}: {stderr}")]
  Command {
    command: String,
    code: Option<i32>,
    stderr: String,
  },

  /// Committing container state into a new image failed.
  #[error("failed to snapshot container state into {image}: {detail}")]
  SnapshotFailed { image: String, detail: String },

  /// No recently run container exists to snapshot.
  #[error("no container available to snapshot")]
  NoContainer,

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

/// A host directory bound into the container at a fixed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
  pub host: PathBuf,
  pub container: PathBuf,
}

/// Control surface over an isolated environment runtime.
///
/// The image a container starts from is always an explicit argument; the
/// backend carries no current-image state of its own.
#[async_trait]
pub trait ContainerBackend: Send + Sync {
  /// Returns whether an image with the given label is present locally.
  async fn image_exists(&self, label: &str) -> Result<bool, ContainerError>;

  /// Starts a container from `image` with the given mounts and environment,
  /// stdin/stdout/stderr piped. Does not block; the caller drives the
  /// process's input/output lifecycle.
  fn start(
    &self,
    image: &str,
    mounts: &[BindMount],
    env: &[(String, String)],
  ) -> Result<RunningContainer, ContainerError>;

  /// Snapshots the most recently run container's state into a new image.
  async fn snapshot_last(&self, image: &str) -> Result<(), ContainerError>;

  /// Force-deletes a set of images. Best-effort: failures are logged and
  /// remaining images are still attempted.
  async fn remove_images(&self, images: &[String]);
}

/// A single active container process with piped standard streams.
///
/// Owned exclusively by the step currently executing; the handle is waited
/// on and discarded before the next step starts.
pub struct RunningContainer {
  child: Child,
}

impl RunningContainer {
  pub fn new(child: Child) -> Self {
    Self { child }
  }

  /// Writes the script to the container's stdin and closes the stream,
  /// signalling end-of-script to the shell inside.
  pub async fn pipe_script(&mut self, script: &str) -> io::Result<()> {
    if let Some(mut stdin) = self.child.stdin.take() {
      stdin.write_all(script.as_bytes()).await?;
      stdin.shutdown().await?;
    }
    Ok(())
  }

  /// Takes the container's stdout stream, if not already taken.
  pub fn take_stdout(&mut self) -> Option<ChildStdout> {
    self.child.stdout.take()
  }

  /// Takes the container's stderr stream, if not already taken.
  pub fn take_stderr(&mut self) -> Option<ChildStderr> {
    self.child.stderr.take()
  }

  /// Waits for the container process to exit.
  pub async fn wait(&mut self) -> io::Result<ExitStatus> {
    self.child.wait().await
  }
}
