//! The persisted outcome of one build run.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::StepName;
use crate::consts::RESULT_FILENAME;

/// Errors persisting a build record.
#[derive(Debug, Error)]
pub enum RecordError {
  #[error("failed to serialize build record: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("failed to write build record: {0}")]
  Write(#[from] io::Error),
}

/// One execution instance of a build.
///
/// Created when the orchestrator starts, mutated by the pipeline as steps
/// complete, finalized exactly once when the pipeline terminates, then
/// serialized and treated as immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
  pub build_id: String,
  pub success: bool,
  /// Unix seconds.
  pub start_time: Option<u64>,
  /// Unix seconds.
  pub end_time: Option<u64>,
  /// Completion timestamp per attempted step, in step order.
  pub steps: BTreeMap<StepName, u64>,
  pub commit_id: Option<String>,
  pub build_dir: PathBuf,
}

impl BuildRecord {
  pub fn new(build_dir: PathBuf, build_id: String) -> Self {
    Self {
      build_id,
      success: false,
      start_time: None,
      end_time: None,
      steps: BTreeMap::new(),
      commit_id: None,
      build_dir,
    }
  }

  pub fn mark_started(&mut self) {
    self.start_time = Some(unix_now());
  }

  /// Finalizes the record with the overall verdict.
  pub fn mark_finished(&mut self, success: bool) {
    self.success = success;
    self.end_time = Some(unix_now());
  }

  /// Records that a step was attempted, regardless of its outcome.
  pub fn record_step(&mut self, step: StepName) {
    self.steps.insert(step, unix_now());
  }

  /// Serializes the record to `result.json` in the build directory.
  ///
  /// Writes to a temp file and renames, so consumers never observe a
  /// partially written record.
  pub fn write(&self) -> Result<PathBuf, RecordError> {
    let path = self.build_dir.join(RESULT_FILENAME);
    let temp_path = self.build_dir.join(format!("{RESULT_FILENAME}.tmp"));

    let content = serde_json::to_string_pretty(self)?;
    fs::write(&temp_path, &content)?;
    fs::rename(&temp_path, &path)?;

    Ok(path)
  }
}

fn unix_now() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs())
    .unwrap_or(0)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn lifecycle_sets_timestamps_and_verdict() {
    let mut record = BuildRecord::new(PathBuf::from("/tmp/builds/3"), "3".to_string());
    assert!(record.start_time.is_none());
    assert!(!record.success);

    record.mark_started();
    record.record_step(StepName::Install);
    record.record_step(StepName::Script);
    record.mark_finished(true);

    assert!(record.start_time.is_some());
    assert!(record.end_time.is_some());
    assert!(record.success);
    assert_eq!(record.steps.len(), 2);
  }

  #[test]
  fn steps_serialize_in_pipeline_order() {
    let mut record = BuildRecord::new(PathBuf::from("/tmp/builds/1"), "1".to_string());

    // Inserted out of order; the map orders by step order.
    record.record_step(StepName::AfterScript);
    record.record_step(StepName::Install);
    record.record_step(StepName::Script);

    let json = serde_json::to_string(&record).unwrap();
    let install = json.find("\"install\"").unwrap();
    let script = json.find("\"script\"").unwrap();
    let after_script = json.find("\"after_script\"").unwrap();

    assert!(install < script);
    assert!(script < after_script);
  }

  #[test]
  fn write_persists_readable_json() {
    let dir = TempDir::new().unwrap();
    let mut record = BuildRecord::new(dir.path().to_path_buf(), "7".to_string());
    record.mark_started();
    record.record_step(StepName::Script);
    record.mark_finished(false);

    let path = record.write().unwrap();
    assert_eq!(path, dir.path().join(RESULT_FILENAME));

    let text = std::fs::read_to_string(&path).unwrap();
    let restored: BuildRecord = serde_json::from_str(&text).unwrap();
    assert_eq!(restored, record);
    assert!(!dir.path().join(format!("{RESULT_FILENAME}.tmp")).exists());
  }
}
