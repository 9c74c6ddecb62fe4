//! Orchard home directory resolution.
//!
//! The home directory holds the project registry and all per-project state
//! (checkouts, build directories, build-id counters).

use std::path::PathBuf;

use crate::consts::APP_NAME;

/// Returns the orchard home directory.
///
/// `ORCHARD_HOME` takes precedence; otherwise the platform data directory
/// is used (`$XDG_DATA_HOME/orchard`, falling back to
/// `~/.local/share/orchard`).
pub fn home_dir() -> PathBuf {
  if let Ok(path) = std::env::var("ORCHARD_HOME") {
    return PathBuf::from(path);
  }

  default_home_dir()
}

/// Returns the default home directory, ignoring `ORCHARD_HOME`.
pub fn default_home_dir() -> PathBuf {
  let data_home = std::env::var("XDG_DATA_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| user_home().join(".local").join("share"));
  data_home.join(APP_NAME)
}

fn user_home() -> PathBuf {
  let home = std::env::var("HOME").expect("HOME not set");
  PathBuf::from(home)
}
