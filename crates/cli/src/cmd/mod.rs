mod build;
mod projects;
mod run;

pub use build::cmd_build;
pub use projects::cmd_projects;
pub use run::cmd_run;

use std::path::Path;

use orchard_lib::project::{ProjectError, Registry, load_registry};

use crate::output;

/// Exit code when the home registry is missing entirely.
const EXIT_NO_REGISTRY: i32 = 127;

/// Loads the registry, or exits with a clear message when it is missing.
pub(crate) fn load_registry_or_exit(home: &Path) -> anyhow::Result<Registry> {
  match load_registry(home) {
    Ok(registry) => Ok(registry),
    Err(ProjectError::RegistryNotFound { path }) => {
      output::print_error(&format!("project registry missing: {}", path.display()));
      std::process::exit(EXIT_NO_REGISTRY);
    }
    Err(e) => Err(e.into()),
  }
}
