//! Default install/script commands inferred from ecosystem markers.

use std::path::Path;

use tracing::debug;

use crate::config::{BuildConfig, StepName};

const BUNDLE_INSTALL: &str = "bundle install --jobs=3 --retry=3";

/// Fills in `install`/`script` commands the manifest omitted, based on the
/// declared language and marker files present in the checkout.
///
/// Only ever adds missing keys; explicit entries are left untouched. Runs
/// once, synchronously, before the first step.
pub fn fill_default_steps(config: &mut BuildConfig, repo_dir: &Path) {
  match config.language.as_deref() {
    Some("ruby") => fill_ruby(config, repo_dir),
    Some("node_js") => fill_node(config),
    Some("python") | Some("python3") => fill_python(config, repo_dir),
    _ => {}
  }
}

fn fill_ruby(config: &mut BuildConfig, repo_dir: &Path) {
  if !config.has_step(StepName::Install) {
    if let Some(gemfile) = config.gemfile_path() {
      let command = format!("{BUNDLE_INSTALL} --gemfile={gemfile}");
      config.set_default_step(StepName::Install, vec![command]);
    } else if repo_dir.join("Gemfile.lock").exists() {
      let command = format!("{BUNDLE_INSTALL} --deployment");
      config.set_default_step(StepName::Install, vec![command]);
    } else if repo_dir.join("Gemfile").exists() {
      config.set_default_step(StepName::Install, vec![BUNDLE_INSTALL.to_string()]);
    } else {
      debug!("no gemfile markers, leaving install unset");
    }
  }

  if !config.has_step(StepName::Script) && repo_dir.join("Rakefile").exists() {
    config.set_default_step(StepName::Script, vec!["rake test".to_string()]);
  }
}

fn fill_node(config: &mut BuildConfig) {
  config.set_default_step(StepName::Install, vec!["npm install".to_string()]);
  config.set_default_step(StepName::Script, vec!["npm test".to_string()]);
}

fn fill_python(config: &mut BuildConfig, repo_dir: &Path) {
  if repo_dir.join("requirements.txt").exists() {
    config.set_default_step(
      StepName::Install,
      vec!["pip install -r requirements.txt".to_string()],
    );
  }
}
