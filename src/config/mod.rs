//! Configuration loading and layering.
//!
//! Handles `.maskcmp.toml` loading, environment variable resolution,
//! and CLI flag merging with proper priority ordering.

pub mod loader;

pub use loader::{BackendConfig, CacheConfig, Config, ConfigError, LogConfig};
