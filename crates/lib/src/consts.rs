//! Shared constants for the orchard build runner.

/// Application name, used for default data directories.
pub const APP_NAME: &str = "orchard";

/// Generic fallback image when no language-specific toolchain image exists.
pub const BASE_IMAGE: &str = "orchard-base";

/// Prefix for language-specific toolchain images, e.g. `orchard-language-ruby`.
pub const LANGUAGE_IMAGE_PREFIX: &str = "orchard-language-";

/// Prefix for per-build labels; snapshots are named `build-<id>-<step>`.
pub const BUILD_LABEL_PREFIX: &str = "build-";

/// Fixed path inside the container where the source tree is mounted.
pub const CONTAINER_BUILD_DIR: &str = "/build";

/// Per-build append-only log file, under the build directory.
pub const LOG_FILENAME: &str = "log.txt";

/// Serialized build record, under the build directory.
pub const RESULT_FILENAME: &str = "result.json";

/// Project registry file, under the orchard home directory.
pub const REGISTRY_FILENAME: &str = "config.yml";

/// Per-project counter file holding the next build id.
pub const BUILD_ID_FILENAME: &str = "build_id";

/// Per-project directory holding the synced working checkout.
pub const REPO_DIRNAME: &str = "repo";

/// Per-project directory holding one subdirectory per build id.
pub const BUILDS_DIRNAME: &str = "builds";

/// Environment injected into every step container so builds can detect CI.
///
/// Static by design: these flags identify the runner, they are not
/// configuration-driven.
pub const CI_ENV: &[(&str, &str)] = &[
  ("CI", "true"),
  ("TRAVIS", "true"),
  ("CONTINUOUS_INTEGRATION", "true"),
  ("DEBIAN_FRONTEND", "noninteractive"),
  ("LANG", "en_US.UTF-8"),
  ("RAILS_ENV", "test"),
  ("RACK_ENV", "test"),
  ("MERB_ENV", "test"),
  (
    "JRUBY_OPTS",
    "--server -Dcext.enabled=false -Xcompile.invokedynamic=false",
  ),
];
