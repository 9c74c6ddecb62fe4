//! Implementation of the `orchard projects` command.

use std::path::Path;

use anyhow::Result;

use crate::output;

/// Execute the projects command: list the registry.
pub fn cmd_projects(home: &Path) -> Result<()> {
  let registry = super::load_registry_or_exit(home)?;

  if registry.projects.is_empty() {
    output::print_info("no projects registered");
    return Ok(());
  }

  for project in &registry.projects {
    println!("{}  {}", project.name, project.repo);
  }

  Ok(())
}
