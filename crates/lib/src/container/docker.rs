//! Docker implementation of the container backend.
//!
//! Shells out to the `docker` CLI. Every invocation uses structured argv
//! arrays; user-supplied values (image names, mounts, environment) are
//! passed as discrete arguments and never joined into a shell string.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{BindMount, ContainerBackend, ContainerError, RunningContainer};

const DOCKER_BIN: &str = "docker";

/// Backend driving a local Docker daemon through its CLI.
#[derive(Debug, Default)]
pub struct Docker {}

impl Docker {
  pub fn new() -> Self {
    Self {}
  }

  /// Runs a docker subcommand to completion and captures its stdout.
  async fn capture(&self, args: &[&str]) -> Result<String, ContainerError> {
    debug!(?args, "running docker");

    let output = Command::new(DOCKER_BIN)
      .args(args)
      .stdin(Stdio::null())
      .output()
      .await
      .map_err(|source| ContainerError::Spawn { source })?;

    if !output.status.success() {
      return Err(ContainerError::Command {
        command: format!("{} {}", DOCKER_BIN, args.join(" ")),
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }
}

#[async_trait]
impl ContainerBackend for Docker {
  async fn image_exists(&self, label: &str) -> Result<bool, ContainerError> {
    let output = self.capture(&["images", "-q", label]).await?;
    Ok(!output.trim().is_empty())
  }

  fn start(
    &self,
    image: &str,
    mounts: &[BindMount],
    env: &[(String, String)],
  ) -> Result<RunningContainer, ContainerError> {
    let mut command = Command::new(DOCKER_BIN);
    command.arg("run").arg("-i");

    for mount in mounts {
      command.arg("-v").arg(format!(
        "{}:{}",
        mount.host.display(),
        mount.container.display()
      ));
    }

    for (key, value) in env {
      command.arg("-e").arg(format!("{key}={value}"));
    }

    command
      .arg(image)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());

    debug!(image, mounts = mounts.len(), "starting container");

    let child = command
      .spawn()
      .map_err(|source| ContainerError::Spawn { source })?;

    Ok(RunningContainer::new(child))
  }

  async fn snapshot_last(&self, image: &str) -> Result<(), ContainerError> {
    let last = self.capture(&["ps", "-lq"]).await?;
    let container = last.trim();

    if container.is_empty() {
      return Err(ContainerError::NoContainer);
    }

    if let Err(e) = self.capture(&["commit", container, image]).await {
      return Err(ContainerError::SnapshotFailed {
        image: image.to_string(),
        detail: e.to_string(),
      });
    }

    info!(container, image, "committed container state");
    Ok(())
  }

  async fn remove_images(&self, images: &[String]) {
    for image in images {
      match self.capture(&["rmi", "-f", image]).await {
        Ok(_) => debug!(image = %image, "removed image"),
        // Cleanup is not correctness-critical; keep going.
        Err(e) => warn!(image = %image, error = %e, "failed to remove image"),
      }
    }
  }
}
