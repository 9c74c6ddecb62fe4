//! Build manifest discovery and parsing.
//!
//! Looks for a manifest in the synced checkout, trying `.orchard.yml` first
//! and `.travis.yml` as a fallback. A missing manifest is fatal before the
//! pipeline starts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::types::BuildConfig;

/// Manifest file names, in lookup order.
pub const MANIFEST_FILENAMES: [&str; 2] = [".orchard.yml", ".travis.yml"];

/// Errors locating or parsing a build manifest.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// No manifest file found in the checkout.
  #[error("no build manifest (.orchard.yml or .travis.yml) found in {dir}")]
  NotFound { dir: PathBuf },

  #[error("failed to parse build manifest: {0}")]
  Parse(#[from] serde_yaml::Error),

  #[error("failed to read build manifest: {0}")]
  Read(#[from] io::Error),
}

/// Locates the manifest file in a checkout.
pub fn find_manifest(repo_dir: &Path) -> Result<PathBuf, ConfigError> {
  for name in MANIFEST_FILENAMES {
    let candidate = repo_dir.join(name);
    if candidate.is_file() {
      debug!(manifest = %candidate.display(), "found build manifest");
      return Ok(candidate);
    }
  }

  Err(ConfigError::NotFound {
    dir: repo_dir.to_path_buf(),
  })
}

/// Parses manifest text into a [`BuildConfig`].
pub fn parse(text: &str) -> Result<BuildConfig, ConfigError> {
  Ok(serde_yaml::from_str(text)?)
}

/// Locates, reads, and parses the manifest for a checkout.
pub fn load(repo_dir: &Path) -> Result<BuildConfig, ConfigError> {
  let path = find_manifest(repo_dir)?;
  let text = fs::read_to_string(&path)?;
  parse(&text)
}
