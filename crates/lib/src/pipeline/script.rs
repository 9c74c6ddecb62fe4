//! In-container script assembly.
//!
//! A step's script is a fixed preamble followed by the step's commands,
//! each preceded by an echo of itself so the log shows what ran before its
//! output. Statements are joined with `;\n`; the whole body is delivered
//! over the container's stdin, never interpolated into a command line.

use std::path::Path;

use crate::config::BuildConfig;

/// Builds the shell script for one step.
///
/// `workdir` is the in-container path of the source mount; the preamble
/// changes into it after enabling fail-on-error semantics and, when an
/// `rvm` version is configured, installing and activating it.
pub fn build_script(config: &BuildConfig, workdir: &Path, commands: &[String]) -> String {
  let mut lines = preamble(config, workdir);

  for command in commands {
    lines.push(format!("echo {command}"));
    lines.push(command.clone());
  }

  lines.join(";\n")
}

fn preamble(config: &BuildConfig, workdir: &Path) -> Vec<String> {
  let mut lines = vec!["set -e".to_string()];

  if let Some(version) = config.rvm_version() {
    lines.push(". /etc/profile.d/rvm.sh".to_string());
    lines.push(format!("rvm install {version}"));
    lines.push(format!("echo rvm use {version}"));
    lines.push(format!("rvm use {version}"));
    lines.push("gem install bundler rake".to_string());
  }

  lines.push(format!("cd \"{}\"", workdir.display()));
  lines
}
