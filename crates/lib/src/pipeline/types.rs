//! Pipeline verdicts and hard-error types.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::container::ContainerError;

/// The three-way terminal outcome of a build run.
///
/// `Succeeded`/`Failed` reflect the `script` step; `Errored` means a
/// pre-step broke the environment and the pipeline aborted early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
  Succeeded,
  Failed,
  Errored,
}

impl Verdict {
  pub fn is_success(self) -> bool {
    matches!(self, Verdict::Succeeded)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Verdict::Succeeded => "succeeded",
      Verdict::Failed => "failed",
      Verdict::Errored => "errored",
    }
  }
}

impl fmt::Display for Verdict {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Hard errors that prevent a step from running at all.
///
/// Ordinary step failure (nonzero exit, snapshot failure) is not an error;
/// it feeds the verdict instead.
#[derive(Debug, Error)]
pub enum StepError {
  #[error("container error: {0}")]
  Container(#[from] ContainerError),

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}
