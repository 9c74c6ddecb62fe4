//! Toolchain image resolution and default step filling.
//!
//! Resolution picks the base image a build starts from, based on the
//! declared language. The default filler inspects the checkout for
//! ecosystem marker files and inserts `install`/`script` commands the
//! manifest omitted. Both are pure functions of their inputs and run once,
//! before the pipeline starts.

mod defaults;

use tracing::warn;

use crate::config::BuildConfig;
use crate::consts::{BASE_IMAGE, LANGUAGE_IMAGE_PREFIX};
use crate::container::{ContainerBackend, ContainerError};

pub use defaults::fill_default_steps;

/// Picks the base image for a build.
///
/// When `language` is declared, the language-specific toolchain image is
/// used if it exists locally; a missing image produces a warning and the
/// generic base image. Without a declared language the generic base image
/// is used directly.
pub async fn resolve_base_image<B: ContainerBackend>(
  config: &BuildConfig,
  backend: &B,
) -> Result<String, ContainerError> {
  if let Some(language) = &config.language {
    let label = format!("{LANGUAGE_IMAGE_PREFIX}{language}");

    if backend.image_exists(&label).await? {
      return Ok(label);
    }

    warn!(language = %language, fallback = BASE_IMAGE, "no toolchain image for language");
  }

  Ok(BASE_IMAGE.to_string())
}
