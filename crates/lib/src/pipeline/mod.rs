//! The step pipeline: the build's core state machine.
//!
//! Steps run in a fixed order: the pre-steps `before_install`, `install`,
//! `before_script`, then `script`, then exactly one of `after_success` /
//! `after_failure`, then `after_script`. A pre-step failure aborts the
//! whole pipeline as `Errored`; the `script` outcome decides
//! `Succeeded`/`Failed`; `after_*` outcomes never change the verdict.
//!
//! Each successful step's container state is snapshotted into a new image
//! which becomes the base for the next step, so later steps inherit
//! installed state. The current image and the snapshot list live on the
//! sequence struct; the backend holds no image state.

pub mod script;

mod types;

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::{BuildConfig, CommandList, StepName};
use crate::consts::CI_ENV;
use crate::container::{BindMount, ContainerBackend};
use crate::multiplex::Multiplexer;
use crate::record::BuildRecord;

pub use types::{StepError, Verdict};

/// Drives one build's steps against a container backend.
pub struct StepSequence<B> {
  backend: B,
  config: BuildConfig,
  /// Per-build label; snapshots are named `<label>-<step>`.
  label: String,
  /// Source tree mount (host path -> in-container path).
  mount: BindMount,
  /// The run's single append-only log file.
  log_path: PathBuf,
  /// Image the next step starts from: the toolchain base initially, then
  /// the snapshot of the most recent successful step.
  current_image: String,
  /// Snapshot images created during this run, in creation order.
  snapshots: Vec<String>,
}

impl<B: ContainerBackend> StepSequence<B> {
  pub fn new(
    backend: B,
    config: BuildConfig,
    label: impl Into<String>,
    mount: BindMount,
    log_path: PathBuf,
    base_image: impl Into<String>,
  ) -> Self {
    Self {
      backend,
      config,
      label: label.into(),
      mount,
      log_path,
      current_image: base_image.into(),
      snapshots: Vec::new(),
    }
  }

  /// Image the next step would start from.
  pub fn current_image(&self) -> &str {
    &self.current_image
  }

  /// Snapshot images created so far.
  pub fn snapshots(&self) -> &[String] {
    &self.snapshots
  }

  /// Runs the full step sequence to a terminal verdict.
  ///
  /// Returns `Err` only for hard failures that prevent a step from running
  /// at all; ordinary step failures are folded into the verdict.
  pub async fn run(&mut self, record: &mut BuildRecord) -> Result<Verdict, StepError> {
    for step in StepName::PRE_STEPS {
      if !self.execute_step(step, record).await? {
        // A broken setup makes later steps meaningless; skip even
        // after_script.
        self.note_retained_snapshot();
        return Ok(Verdict::Errored);
      }
    }

    let passed = self.execute_step(StepName::Script, record).await?;

    if passed {
      self.execute_step(StepName::AfterSuccess, record).await?;
    } else {
      self.execute_step(StepName::AfterFailure, record).await?;
    }

    self.execute_step(StepName::AfterScript, record).await?;

    if passed {
      // Snapshots only cache state within a single run.
      self.backend.remove_images(&self.snapshots).await;
      self.snapshots.clear();
      Ok(Verdict::Succeeded)
    } else {
      self.note_retained_snapshot();
      Ok(Verdict::Failed)
    }
  }

  /// Executes one step.
  ///
  /// Returns `Ok(true)` when the step passed (including vacuously, for a
  /// step with no configured commands) and `Ok(false)` when its script
  /// exited nonzero or the post-success snapshot failed.
  async fn execute_step(
    &mut self,
    step: StepName,
    record: &mut BuildRecord,
  ) -> Result<bool, StepError> {
    let Some(commands) = self.config.step(step).map(CommandList::to_vec) else {
      return Ok(true);
    };

    info!(step = %step, commands = commands.len(), image = %self.current_image, "executing step");

    let body = script::build_script(&self.config, &self.mount.container, &commands);

    let mounts = [self.mount.clone()];
    let env: Vec<(String, String)> = CI_ENV
      .iter()
      .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
      .collect();

    let mut container = self.backend.start(&self.current_image, &mounts, &env)?;
    container.pipe_script(&body).await?;

    let log = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.log_path)?;

    let mut output = Multiplexer::new();
    if let Some(stdout) = container.take_stdout() {
      output.add_source(Box::new(stdout));
    }
    if let Some(stderr) = container.take_stderr() {
      output.add_source(Box::new(stderr));
    }
    output.add_sink(Box::new(io::stdout()));
    output.add_sink(Box::new(log));

    output.run().await;
    let status = container.wait().await?;

    record.record_step(step);

    if !status.success() {
      output.write(&format!("step '{step}' failed\n"));
      return Ok(false);
    }

    output.write(&format!("step '{step}' passed\n"));

    // Command success alone is not enough; the committed state must also
    // be captured for the chain to continue.
    let snapshot = format!("{}-{}", self.label, step);
    if let Err(e) = self.backend.snapshot_last(&snapshot).await {
      warn!(step = %step, error = %e, "failed to snapshot environment after step");
      output.write(&format!("step '{step}' snapshot failed\n"));
      return Ok(false);
    }

    self.snapshots.push(snapshot.clone());
    self.current_image = snapshot;

    Ok(true)
  }

  fn note_retained_snapshot(&self) {
    if let Some(image) = self.snapshots.last() {
      info!(image = %image, "retaining last snapshot for inspection");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::ShellBackend;
  use std::path::Path;
  use tempfile::TempDir;

  fn config_from(steps: &[(StepName, &str)]) -> BuildConfig {
    let mut config = BuildConfig::default();
    for (step, command) in steps {
      config.set_default_step(*step, vec![command.to_string()]);
    }
    config
  }

  /// Sequence whose mount maps the workdir onto itself, so scripts run by
  /// the local shell `cd` into a real directory.
  fn sequence(config: BuildConfig, backend: ShellBackend, dir: &Path) -> StepSequence<ShellBackend> {
    let mount = BindMount {
      host: dir.to_path_buf(),
      container: dir.to_path_buf(),
    };
    StepSequence::new(
      backend,
      config,
      "build-1",
      mount,
      dir.join("log.txt"),
      "orchard-base",
    )
  }

  fn record() -> BuildRecord {
    BuildRecord::new(PathBuf::from("/unused"), "1".to_string())
  }

  fn read_log(dir: &Path) -> String {
    std::fs::read_to_string(dir.join("log.txt")).unwrap_or_default()
  }

  #[tokio::test]
  async fn absent_steps_are_no_ops() {
    let dir = TempDir::new().unwrap();
    let backend = ShellBackend::new();
    let starts = backend.starts();

    let config = config_from(&[(StepName::Script, "echo hi")]);
    let mut seq = sequence(config, backend, dir.path());
    let mut rec = record();

    let verdict = seq.run(&mut rec).await.unwrap();

    assert_eq!(verdict, Verdict::Succeeded);
    // Only the script step touched the backend.
    assert_eq!(starts.lock().unwrap().len(), 1);
    assert_eq!(rec.steps.keys().copied().collect::<Vec<_>>(), vec![StepName::Script]);
    assert!(read_log(dir.path()).contains("step 'script' passed"));
  }

  #[tokio::test]
  async fn failing_script_runs_failure_branch_then_after_script() {
    let dir = TempDir::new().unwrap();
    let backend = ShellBackend::new();

    let config = config_from(&[
      (StepName::Script, "exit 1"),
      (StepName::AfterSuccess, "touch success_marker"),
      (StepName::AfterFailure, "touch failure_marker"),
      (StepName::AfterScript, "touch cleanup_marker"),
    ]);
    let mut seq = sequence(config, backend, dir.path());
    let mut rec = record();

    let verdict = seq.run(&mut rec).await.unwrap();

    assert_eq!(verdict, Verdict::Failed);
    assert!(!dir.path().join("success_marker").exists());
    assert!(dir.path().join("failure_marker").exists());
    assert!(dir.path().join("cleanup_marker").exists());
    assert!(read_log(dir.path()).contains("step 'script' failed"));
    assert_eq!(
      rec.steps.keys().copied().collect::<Vec<_>>(),
      vec![StepName::Script, StepName::AfterFailure, StepName::AfterScript]
    );
  }

  #[tokio::test]
  async fn passing_script_runs_success_branch() {
    let dir = TempDir::new().unwrap();
    let backend = ShellBackend::new();

    let config = config_from(&[
      (StepName::Script, "echo ok"),
      (StepName::AfterSuccess, "touch success_marker"),
      (StepName::AfterFailure, "touch failure_marker"),
      (StepName::AfterScript, "touch cleanup_marker"),
    ]);
    let mut seq = sequence(config, backend, dir.path());
    let mut rec = record();

    let verdict = seq.run(&mut rec).await.unwrap();

    assert_eq!(verdict, Verdict::Succeeded);
    assert!(dir.path().join("success_marker").exists());
    assert!(!dir.path().join("failure_marker").exists());
    assert!(dir.path().join("cleanup_marker").exists());
  }

  #[tokio::test]
  async fn pre_step_failure_aborts_everything() {
    let dir = TempDir::new().unwrap();
    let backend = ShellBackend::new();
    let snapshots = backend.committed();

    let config = config_from(&[
      (StepName::BeforeInstall, "exit 1"),
      (StepName::Script, "touch script_marker"),
      (StepName::AfterFailure, "touch failure_marker"),
      (StepName::AfterScript, "touch cleanup_marker"),
    ]);
    let mut seq = sequence(config, backend, dir.path());
    let mut rec = record();

    let verdict = seq.run(&mut rec).await.unwrap();

    assert_eq!(verdict, Verdict::Errored);
    assert!(!dir.path().join("script_marker").exists());
    assert!(!dir.path().join("failure_marker").exists());
    assert!(!dir.path().join("cleanup_marker").exists());
    assert!(snapshots.lock().unwrap().is_empty());

    let log = read_log(dir.path());
    assert_eq!(log.matches("failed").count(), 1);
    assert_eq!(
      rec.steps.keys().copied().collect::<Vec<_>>(),
      vec![StepName::BeforeInstall]
    );
  }

  #[tokio::test]
  async fn successful_run_removes_all_snapshots() {
    let dir = TempDir::new().unwrap();
    let backend = ShellBackend::new();
    let removed = backend.removed();

    let config = config_from(&[
      (StepName::BeforeInstall, "echo setup"),
      (StepName::Script, "echo test"),
    ]);
    let mut seq = sequence(config, backend, dir.path());
    let mut rec = record();

    let verdict = seq.run(&mut rec).await.unwrap();

    assert_eq!(verdict, Verdict::Succeeded);
    assert_eq!(
      *removed.lock().unwrap(),
      vec![
        "build-1-before_install".to_string(),
        "build-1-script".to_string()
      ]
    );
    assert!(seq.snapshots().is_empty());
  }

  #[tokio::test]
  async fn failed_run_retains_snapshots() {
    let dir = TempDir::new().unwrap();
    let backend = ShellBackend::new();
    let removed = backend.removed();

    let config = config_from(&[
      (StepName::BeforeInstall, "echo setup"),
      (StepName::Script, "exit 1"),
    ]);
    let mut seq = sequence(config, backend, dir.path());
    let mut rec = record();

    let verdict = seq.run(&mut rec).await.unwrap();

    assert_eq!(verdict, Verdict::Failed);
    assert!(removed.lock().unwrap().is_empty());
    assert_eq!(seq.snapshots(), ["build-1-before_install".to_string()]);
  }

  #[tokio::test]
  async fn later_steps_start_from_earlier_snapshots() {
    let dir = TempDir::new().unwrap();
    let backend = ShellBackend::new();
    let starts = backend.starts();

    let config = config_from(&[
      (StepName::Install, "echo install"),
      (StepName::Script, "echo test"),
    ]);
    let mut seq = sequence(config, backend, dir.path());
    let mut rec = record();

    seq.run(&mut rec).await.unwrap();

    assert_eq!(
      *starts.lock().unwrap(),
      vec!["orchard-base".to_string(), "build-1-install".to_string()]
    );
  }

  #[tokio::test]
  async fn snapshot_failure_on_script_fails_the_build() {
    let dir = TempDir::new().unwrap();
    let backend = ShellBackend::failing_snapshots();

    let config = config_from(&[(StepName::Script, "echo ok")]);
    let mut seq = sequence(config, backend, dir.path());
    let mut rec = record();

    let verdict = seq.run(&mut rec).await.unwrap();

    // The command passed but the environment could not be captured.
    assert_eq!(verdict, Verdict::Failed);
    let log = read_log(dir.path());
    assert!(log.contains("step 'script' passed"));
    assert!(log.contains("step 'script' snapshot failed"));
  }

  #[tokio::test]
  async fn snapshot_failure_on_pre_step_errors_the_build() {
    let dir = TempDir::new().unwrap();
    let backend = ShellBackend::failing_snapshots();

    let config = config_from(&[
      (StepName::Install, "echo ok"),
      (StepName::Script, "touch script_marker"),
    ]);
    let mut seq = sequence(config, backend, dir.path());
    let mut rec = record();

    let verdict = seq.run(&mut rec).await.unwrap();

    assert_eq!(verdict, Verdict::Errored);
    assert!(!dir.path().join("script_marker").exists());
  }

  #[tokio::test]
  async fn step_output_round_trip() {
    let dir = TempDir::new().unwrap();
    let backend = ShellBackend::new();

    let mut config = BuildConfig::default();
    config.set_default_step(
      StepName::Script,
      vec!["echo A".to_string(), "echo B".to_string()],
    );
    let mut seq = sequence(config, backend, dir.path());
    let mut rec = record();

    let verdict = seq.run(&mut rec).await.unwrap();
    assert_eq!(verdict, Verdict::Succeeded);

    // Each command is echoed before it runs, then the status marker ends
    // the step's output.
    let log = read_log(dir.path());
    let echo_a = log.find("echo A").unwrap();
    let out_a = log.find("\nA\n").unwrap();
    let echo_b = log.find("echo B").unwrap();
    let out_b = log.find("\nB\n").unwrap();
    let marker = log.find("step 'script' passed").unwrap();

    assert!(echo_a < out_a);
    assert!(out_a < echo_b);
    assert!(echo_b < out_b);
    assert!(out_b < marker);
  }

  #[tokio::test]
  async fn ci_environment_is_injected() {
    let dir = TempDir::new().unwrap();
    let backend = ShellBackend::new();

    let config = config_from(&[(StepName::Script, "echo ci=$CI rails=$RAILS_ENV")]);
    let mut seq = sequence(config, backend, dir.path());
    let mut rec = record();

    seq.run(&mut rec).await.unwrap();

    assert!(read_log(dir.path()).contains("ci=true rails=test"));
  }

  #[tokio::test]
  async fn stderr_is_captured_in_the_log() {
    let dir = TempDir::new().unwrap();
    let backend = ShellBackend::new();

    let config = config_from(&[(StepName::Script, "echo oops >&2")]);
    let mut seq = sequence(config, backend, dir.path());
    let mut rec = record();

    seq.run(&mut rec).await.unwrap();

    assert!(read_log(dir.path()).contains("oops"));
  }
}
