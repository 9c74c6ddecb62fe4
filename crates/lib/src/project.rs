//! Project registry and per-project build bookkeeping.
//!
//! The orchard home directory holds a `config.yml` registry listing the
//! projects to build, and one directory per project:
//!
//! ```text
//! {home}/
//! ├── config.yml              # Registry: list of {name, repo}
//! └── projects/<name>/
//!     ├── repo/               # Synced working checkout
//!     ├── builds/<id>/        # One directory per build (log, result)
//!     └── build_id            # Counter: next build id
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{BUILD_ID_FILENAME, BUILDS_DIRNAME, REGISTRY_FILENAME};

/// Errors reading the registry or allocating build ids.
#[derive(Debug, Error)]
pub enum ProjectError {
  /// The registry file does not exist.
  #[error("project registry missing: {path}")]
  RegistryNotFound { path: PathBuf },

  #[error("failed to parse project registry: {0}")]
  Parse(#[from] serde_yaml::Error),

  /// The build-id counter file holds something other than a number.
  #[error("invalid build id {value:?} in {path}")]
  BadBuildId { path: PathBuf, value: String },

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

/// A registered project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
  pub name: String,
  pub repo: String,
}

/// The home registry: every project this runner builds.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registry {
  #[serde(default)]
  pub projects: Vec<Project>,
}

/// Loads the registry from `<home>/config.yml`.
pub fn load_registry(home: &Path) -> Result<Registry, ProjectError> {
  let path = home.join(REGISTRY_FILENAME);

  let text = match fs::read_to_string(&path) {
    Ok(text) => text,
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      return Err(ProjectError::RegistryNotFound { path });
    }
    Err(e) => return Err(e.into()),
  };

  Ok(serde_yaml::from_str(&text)?)
}

/// Directory holding a project's state.
pub fn project_dir(home: &Path, name: &str) -> PathBuf {
  home.join("projects").join(name)
}

/// Directory holding a project's per-build directories.
pub fn builds_dir(project_dir: &Path) -> PathBuf {
  project_dir.join(BUILDS_DIRNAME)
}

/// Allocates the next build id for a project.
///
/// The counter file holds the id for the next build; ids start at 0 and
/// increase monotonically per project. The file is rewritten before the id
/// is returned, so a crashed build still consumes its id.
pub fn next_build_id(project_dir: &Path) -> Result<u64, ProjectError> {
  let path = project_dir.join(BUILD_ID_FILENAME);

  let current: u64 = match fs::read_to_string(&path) {
    Ok(text) => {
      let trimmed = text.trim();
      if trimmed.is_empty() {
        0
      } else {
        trimmed.parse().map_err(|_| ProjectError::BadBuildId {
          path: path.clone(),
          value: trimmed.to_string(),
        })?
      }
    }
    Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
    Err(e) => return Err(e.into()),
  };

  fs::create_dir_all(project_dir)?;
  fs::write(&path, (current + 1).to_string())?;

  Ok(current)
}
