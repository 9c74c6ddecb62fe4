//! Build orchestration.
//!
//! The executor wires configuration, the container backend, and the step
//! pipeline together for one build: it stamps timing and commit metadata,
//! fills default steps, resolves the toolchain image, drives the pipeline,
//! and persists the build record. `run_project` adds the per-project glue
//! (sync the checkout, discover the manifest, allocate a build id).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::config::{self, BuildConfig, ConfigError};
use crate::consts::{BUILD_LABEL_PREFIX, CONTAINER_BUILD_DIR, LOG_FILENAME};
use crate::container::{BindMount, ContainerBackend, ContainerError};
use crate::pipeline::{StepError, StepSequence, Verdict};
use crate::project::{self, Project, ProjectError};
use crate::record::{BuildRecord, RecordError};
use crate::repo::{self, RepoError};
use crate::toolchain;

/// Errors from build orchestration.
#[derive(Debug, Error)]
pub enum ExecutorError {
  #[error("repository error: {0}")]
  Repo(#[from] RepoError),

  #[error("configuration error: {0}")]
  Config(#[from] ConfigError),

  #[error("project error: {0}")]
  Project(#[from] ProjectError),

  #[error("container error: {0}")]
  Container(#[from] ContainerError),

  #[error("pipeline error: {0}")]
  Step(#[from] StepError),

  #[error("record error: {0}")]
  Record(#[from] RecordError),

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

/// Everything one build needs: identity and directories, produced by the
/// project bookkeeping.
#[derive(Debug, Clone)]
pub struct BuildContext {
  pub build_id: String,
  /// Synced working checkout on the host.
  pub repo_dir: PathBuf,
  /// Per-build directory for the log and the result record.
  pub build_dir: PathBuf,
}

/// Result of one build: the terminal verdict plus the persisted record.
#[derive(Debug)]
pub struct BuildOutcome {
  pub verdict: Verdict,
  pub record: BuildRecord,
}

/// Drives one build to completion.
pub struct Executor {
  context: BuildContext,
  config: BuildConfig,
}

impl Executor {
  pub fn new(context: BuildContext, config: BuildConfig) -> Self {
    Self { context, config }
  }

  /// Runs the build against the given backend.
  ///
  /// The record is finalized and serialized on every terminal verdict;
  /// only hard errors (backend or filesystem failures) leave no record
  /// behind.
  pub async fn run<B: ContainerBackend>(self, backend: B) -> Result<BuildOutcome, ExecutorError> {
    let Executor {
      context,
      mut config,
    } = self;

    fs::create_dir_all(&context.build_dir)?;

    let mut record = BuildRecord::new(context.build_dir.clone(), context.build_id.clone());
    record.mark_started();
    record.commit_id = Some(repo::head_commit(&context.repo_dir).await?);

    toolchain::fill_default_steps(&mut config, &context.repo_dir);
    let base_image = toolchain::resolve_base_image(&config, &backend).await?;

    info!(
      build = %context.build_id,
      image = %base_image,
      commit = record.commit_id.as_deref().unwrap_or(""),
      "starting build"
    );

    let label = format!("{BUILD_LABEL_PREFIX}{}", context.build_id);
    let mount = BindMount {
      host: context.repo_dir.clone(),
      container: PathBuf::from(CONTAINER_BUILD_DIR),
    };
    let log_path = context.build_dir.join(LOG_FILENAME);

    let mut sequence = StepSequence::new(backend, config, label, mount, log_path, base_image);
    let verdict = sequence.run(&mut record).await?;

    record.mark_finished(verdict.is_success());
    let result_path = record.write()?;

    info!(
      build = %context.build_id,
      verdict = %verdict,
      result = %result_path.display(),
      "build finished"
    );

    Ok(BuildOutcome { verdict, record })
  }
}

/// Builds one registered project: sync its checkout, load the manifest,
/// allocate a build id, and run the executor.
pub async fn run_project<B: ContainerBackend>(
  home: &Path,
  project: &Project,
  backend: B,
) -> Result<BuildOutcome, ExecutorError> {
  let project_dir = project::project_dir(home, &project.name);
  fs::create_dir_all(&project_dir)?;

  let repo_dir = repo::sync(&project_dir, &project.repo).await?;
  let config = config::load(&repo_dir)?;

  let build_id = project::next_build_id(&project_dir)?;
  let build_dir = project::builds_dir(&project_dir).join(build_id.to_string());

  info!(project = %project.name, build = build_id, "executing build");

  let context = BuildContext {
    build_id: build_id.to_string(),
    repo_dir,
    build_dir,
  };

  Executor::new(context, config).run(backend).await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::consts::RESULT_FILENAME;
  use crate::util::testutil::{ShellBackend, init_git_repo};
  use tempfile::TempDir;

  #[tokio::test]
  async fn build_with_no_steps_succeeds() {
    let dir = TempDir::new().unwrap();
    let repo_dir = dir.path().join("repo");
    fs::create_dir_all(&repo_dir).unwrap();
    init_git_repo(&repo_dir).await;

    let build_dir = dir.path().join("builds").join("0");
    let context = BuildContext {
      build_id: "0".to_string(),
      repo_dir,
      build_dir: build_dir.clone(),
    };

    let outcome = Executor::new(context, BuildConfig::default())
      .run(ShellBackend::new())
      .await
      .unwrap();

    assert_eq!(outcome.verdict, Verdict::Succeeded);
    assert!(outcome.record.success);
    assert!(outcome.record.steps.is_empty());
    assert_eq!(outcome.record.commit_id.as_ref().unwrap().len(), 40);
    assert!(build_dir.join(RESULT_FILENAME).exists());
  }

  #[tokio::test]
  async fn missing_checkout_is_a_repo_error() {
    let dir = TempDir::new().unwrap();
    let context = BuildContext {
      build_id: "0".to_string(),
      repo_dir: dir.path().join("nonexistent"),
      build_dir: dir.path().join("build"),
    };

    let err = Executor::new(context, BuildConfig::default())
      .run(ShellBackend::new())
      .await
      .unwrap_err();

    assert!(matches!(err, ExecutorError::Repo(_)));
  }

  #[tokio::test]
  async fn run_project_syncs_and_builds() {
    let dir = TempDir::new().unwrap();

    let origin = dir.path().join("origin");
    fs::create_dir_all(&origin).unwrap();
    fs::write(origin.join(".orchard.yml"), "language: sh\n").unwrap();
    init_git_repo(&origin).await;

    let home = dir.path().join("home");
    let project = Project {
      name: "app".to_string(),
      repo: origin.display().to_string(),
    };

    let outcome = run_project(&home, &project, ShellBackend::new())
      .await
      .unwrap();
    assert_eq!(outcome.verdict, Verdict::Succeeded);

    let project_dir = project::project_dir(&home, "app");
    assert!(project_dir.join("repo").join(".orchard.yml").exists());
    assert!(
      project::builds_dir(&project_dir)
        .join("0")
        .join(RESULT_FILENAME)
        .exists()
    );

    // A second run pulls the checkout and gets the next build id.
    let again = run_project(&home, &project, ShellBackend::new())
      .await
      .unwrap();
    assert_eq!(again.record.build_id, "1");
    assert!(
      project::builds_dir(&project_dir)
        .join("1")
        .join(RESULT_FILENAME)
        .exists()
    );
  }

  #[tokio::test]
  async fn run_project_without_manifest_fails() {
    let dir = TempDir::new().unwrap();

    let origin = dir.path().join("origin");
    fs::create_dir_all(&origin).unwrap();
    init_git_repo(&origin).await;

    let home = dir.path().join("home");
    let project = Project {
      name: "bare".to_string(),
      repo: origin.display().to_string(),
    };

    let err = run_project(&home, &project, ShellBackend::new())
      .await
      .unwrap_err();
    assert!(matches!(err, ExecutorError::Config(ConfigError::NotFound { .. })));
  }
}
