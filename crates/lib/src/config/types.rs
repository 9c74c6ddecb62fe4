//! Build configuration types.
//!
//! A build manifest maps step names to one or more shell commands, plus a
//! few auxiliary keys (`language`, `rvm`, `gemfile`). Step names form a
//! fixed ordered set; declaration order of [`StepName`] is execution order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The fixed, ordered set of pipeline steps.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
  BeforeInstall,
  Install,
  BeforeScript,
  Script,
  AfterSuccess,
  AfterFailure,
  AfterScript,
}

impl StepName {
  /// Setup steps; a hard failure in any of these aborts the whole pipeline.
  pub const PRE_STEPS: [StepName; 3] = [
    StepName::BeforeInstall,
    StepName::Install,
    StepName::BeforeScript,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      StepName::BeforeInstall => "before_install",
      StepName::Install => "install",
      StepName::BeforeScript => "before_script",
      StepName::Script => "script",
      StepName::AfterSuccess => "after_success",
      StepName::AfterFailure => "after_failure",
      StepName::AfterScript => "after_script",
    }
  }
}

impl fmt::Display for StepName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One or more shell commands, written in YAML as either a scalar or a
/// sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandList {
  Single(String),
  Many(Vec<String>),
}

impl CommandList {
  /// The commands as an owned list, in declaration order.
  pub fn to_vec(&self) -> Vec<String> {
    match self {
      CommandList::Single(cmd) => vec![cmd.clone()],
      CommandList::Many(cmds) => cmds.clone(),
    }
  }

  pub fn first(&self) -> Option<&str> {
    match self {
      CommandList::Single(cmd) => Some(cmd),
      CommandList::Many(cmds) => cmds.first().map(String::as_str),
    }
  }
}

impl From<&str> for CommandList {
  fn from(cmd: &str) -> Self {
    CommandList::Single(cmd.to_string())
  }
}

impl From<Vec<String>> for CommandList {
  fn from(cmds: Vec<String>) -> Self {
    CommandList::Many(cmds)
  }
}

/// A parsed build manifest.
///
/// Unknown YAML keys are ignored; real-world manifests carry keys this
/// runner does not interpret. Steps absent from the manifest are no-ops.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
  pub language: Option<String>,
  pub rvm: Option<CommandList>,
  pub gemfile: Option<CommandList>,
  pub before_install: Option<CommandList>,
  pub install: Option<CommandList>,
  pub before_script: Option<CommandList>,
  pub script: Option<CommandList>,
  pub after_success: Option<CommandList>,
  pub after_failure: Option<CommandList>,
  pub after_script: Option<CommandList>,
}

impl BuildConfig {
  /// The commands configured for a step, if any.
  pub fn step(&self, step: StepName) -> Option<&CommandList> {
    match step {
      StepName::BeforeInstall => self.before_install.as_ref(),
      StepName::Install => self.install.as_ref(),
      StepName::BeforeScript => self.before_script.as_ref(),
      StepName::Script => self.script.as_ref(),
      StepName::AfterSuccess => self.after_success.as_ref(),
      StepName::AfterFailure => self.after_failure.as_ref(),
      StepName::AfterScript => self.after_script.as_ref(),
    }
  }

  pub fn has_step(&self, step: StepName) -> bool {
    self.step(step).is_some()
  }

  /// Inserts commands for a step only when the manifest left it unset.
  /// Explicit entries are never overwritten.
  pub fn set_default_step(&mut self, step: StepName, commands: Vec<String>) {
    let slot = self.step_slot(step);
    if slot.is_none() {
      *slot = Some(CommandList::Many(commands));
    }
  }

  fn step_slot(&mut self, step: StepName) -> &mut Option<CommandList> {
    match step {
      StepName::BeforeInstall => &mut self.before_install,
      StepName::Install => &mut self.install,
      StepName::BeforeScript => &mut self.before_script,
      StepName::Script => &mut self.script,
      StepName::AfterSuccess => &mut self.after_success,
      StepName::AfterFailure => &mut self.after_failure,
      StepName::AfterScript => &mut self.after_script,
    }
  }

  /// Declared ruby version-manager version, when configured.
  pub fn rvm_version(&self) -> Option<&str> {
    self.rvm.as_ref().and_then(CommandList::first)
  }

  /// Declared gemfile path, when configured.
  pub fn gemfile_path(&self) -> Option<&str> {
    self.gemfile.as_ref().and_then(CommandList::first)
  }
}
