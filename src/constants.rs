//! App-wide constants.
//!
//! Centralises the tool name, config paths, cache file names and
//! environment variable names so a rename only requires changing this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "maskcmp";

/// Version of the running binary. Stamped into the cache metadata so a
/// release with different metric semantics invalidates old results.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compilation target triple, exported by `build.rs`.
pub const TARGET: &str = env!("TARGET");

/// Local config filename (e.g. `.maskcmp.toml` in the working directory).
pub const CONFIG_FILENAME: &str = ".maskcmp.toml";

/// Directory name under `~/.config/` and the OS data dir.
pub const CONFIG_DIR: &str = "maskcmp";

// ── Cache layout ────────────────────────────────────────────────────

/// Directory under the data dir holding every cache document.
pub const CACHE_DIR_NAME: &str = "comparison_cache";

/// GT index document.
pub const GT_INDEX_FILE: &str = "gt_index.json";

/// Aggregate metadata document.
pub const METADATA_FILE: &str = "metadata.json";

/// Default age threshold for `cache cleanup`.
pub const DEFAULT_MAX_AGE_DAYS: u32 = 30;

// ── Environment variable names ──────────────────────────────────────

pub const ENV_CACHE_DIR: &str = "MASKCMP_CACHE_DIR";
pub const ENV_CACHE_ENABLED: &str = "MASKCMP_CACHE";
pub const ENV_BACKEND: &str = "MASKCMP_BACKEND";
pub const ENV_LOG: &str = "MASKCMP_LOG";
