//! Build configuration: the parsed manifest and its discovery.

mod discover;
mod types;

pub use discover::{ConfigError, MANIFEST_FILENAMES, find_manifest, load, parse};
pub use types::{BuildConfig, CommandList, StepName};
