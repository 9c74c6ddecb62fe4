//! Repository sync: clone-or-pull of a project's source tree.
//!
//! Shells out to the git CLI with argv arrays. The checkout lives at
//! `<project_dir>/repo` and is reused across builds: cloned on the first
//! build, pulled afterwards.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::consts::REPO_DIRNAME;

const GIT_BIN: &str = "git";

/// Errors syncing a repository.
#[derive(Debug, Error)]
pub enum RepoError {
  /// The project declared no repository URL.
  #[error("repository url is empty")]
  EmptyUrl,

  /// A git command exited nonzero.
  #[error("{command} failed with exit code {code:?}: {stderr}")]
  Git {
    command: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("failed to run git: {0}")]
  Io(#[from] io::Error),
}

/// Clones the repository into `<project_dir>/repo`, or pulls when the
/// checkout already exists. Returns the checkout path.
pub async fn sync(project_dir: &Path, url: &str) -> Result<PathBuf, RepoError> {
  if url.trim().is_empty() {
    return Err(RepoError::EmptyUrl);
  }

  let local = project_dir.join(REPO_DIRNAME);
  let local_str = local.display().to_string();

  if local.exists() {
    info!(checkout = %local.display(), "pulling existing checkout");
    git(&["-C", &local_str, "pull"]).await?;
  } else {
    info!(url, checkout = %local.display(), "cloning repository");
    git(&["clone", "--", url, &local_str]).await?;
  }

  Ok(local)
}

/// Returns the checkout's HEAD commit id.
pub async fn head_commit(repo_dir: &Path) -> Result<String, RepoError> {
  let dir = repo_dir.display().to_string();
  let output = git(&["-C", &dir, "rev-parse", "HEAD"]).await?;
  Ok(output.trim().to_string())
}

async fn git(args: &[&str]) -> Result<String, RepoError> {
  debug!(?args, "running git");

  let output = Command::new(GIT_BIN).args(args).output().await?;

  if !output.status.success() {
    return Err(RepoError::Git {
      command: format!("{} {}", GIT_BIN, args.join(" ")),
      code: output.status.code(),
      stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    });
  }

  Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
