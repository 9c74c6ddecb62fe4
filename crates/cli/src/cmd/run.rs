//! Implementation of the `orchard run` command.
//!
//! Builds every project in the registry, in order, stopping at the first
//! build whose verdict is not `Succeeded`.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use orchard_lib::container::Docker;
use orchard_lib::executor::{BuildOutcome, run_project};
use orchard_lib::pipeline::Verdict;
use orchard_lib::project::Project;

use crate::output;

/// Execute the run command.
pub async fn cmd_run(home: &Path) -> Result<()> {
  let registry = super::load_registry_or_exit(home)?;

  if registry.projects.is_empty() {
    output::print_info("no projects registered");
    return Ok(());
  }

  for project in &registry.projects {
    output::print_info(&format!("building {}", project.name));

    let outcome = build_one(home, project).await?;

    if !outcome.verdict.is_success() {
      std::process::exit(1);
    }
  }

  Ok(())
}

/// Builds one project and prints its outcome.
pub(crate) async fn build_one(home: &Path, project: &Project) -> Result<BuildOutcome> {
  let outcome = run_project(home, project, Docker::new()).await?;

  let elapsed = match (outcome.record.start_time, outcome.record.end_time) {
    (Some(start), Some(end)) => Duration::from_secs(end.saturating_sub(start)),
    _ => Duration::ZERO,
  };

  match outcome.verdict {
    Verdict::Succeeded => output::print_success(&format!(
      "{} build {} succeeded in {}",
      project.name,
      outcome.record.build_id,
      output::format_duration(elapsed)
    )),
    verdict => output::print_error(&format!(
      "{} build {} {}",
      project.name, outcome.record.build_id, verdict
    )),
  }

  Ok(outcome)
}
