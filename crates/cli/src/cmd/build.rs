//! Implementation of the `orchard build` command.
//!
//! Builds a single registered project by name.

use std::path::Path;

use anyhow::Result;

use crate::output;

/// Execute the build command.
pub async fn cmd_build(home: &Path, name: &str) -> Result<()> {
  let registry = super::load_registry_or_exit(home)?;

  let Some(project) = registry.projects.iter().find(|p| p.name == name) else {
    output::print_error(&format!("unknown project: {name}"));
    std::process::exit(1);
  };

  let outcome = super::run::build_one(home, project).await?;

  if !outcome.verdict.is_success() {
    std::process::exit(1);
  }

  Ok(())
}
