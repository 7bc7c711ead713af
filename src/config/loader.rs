//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables
//! 3. `.maskcmp.toml` in the working directory
//! 4. `~/.config/maskcmp/config.toml` (global defaults)
//! 5. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::constants::{
    CACHE_DIR_NAME, CONFIG_DIR, CONFIG_FILENAME, DEFAULT_MAX_AGE_DAYS, ENV_BACKEND, ENV_CACHE_DIR,
    ENV_CACHE_ENABLED, ENV_LOG,
};
use crate::env::Env;

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub backend: BackendConfig,
    pub log: LogConfig,
}

/// Comparison cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Cache directory. `None` resolves to the OS data dir.
    pub dir: Option<PathBuf>,
    /// Default threshold for `cache cleanup`.
    pub max_age_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            max_age_days: DEFAULT_MAX_AGE_DAYS,
        }
    }
}

impl CacheConfig {
    /// Resolve the cache directory: explicit setting, else
    /// `<data dir>/maskcmp/comparison_cache`.
    pub fn resolved_dir(&self) -> Option<PathBuf> {
        self.dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join(CONFIG_DIR).join(CACHE_DIR_NAME)))
    }
}

/// External metric backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Program that computes metrics for a JSON job on stdin.
    pub command: Option<String>,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_secs: 600,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive string.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// Reads the global config, then `work_dir/.maskcmp.toml`, then applies
    /// environment variable overrides.
    pub fn load(work_dir: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                config.merge(global);
            }
        }

        if let Some(dir) = work_dir {
            let local_path = dir.join(CONFIG_FILENAME);
            if local_path.exists() {
                let local = Self::load_file(&local_path)?;
                config.merge(local);
            }
        }

        config.apply_env_vars(env);

        Ok(config)
    }

    /// Load a config from a specific file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR).join("config.toml"))
    }

    /// Merge another config into this one (other takes precedence for non-default values).
    fn merge(&mut self, other: Config) {
        let default_cache = CacheConfig::default();
        if !other.cache.enabled {
            self.cache.enabled = false;
        }
        if other.cache.dir.is_some() {
            self.cache.dir = other.cache.dir;
        }
        if other.cache.max_age_days != default_cache.max_age_days {
            self.cache.max_age_days = other.cache.max_age_days;
        }

        let default_backend = BackendConfig::default();
        if other.backend.command.is_some() {
            self.backend.command = other.backend.command;
        }
        if !other.backend.args.is_empty() {
            self.backend.args = other.backend.args;
        }
        if other.backend.timeout_secs != default_backend.timeout_secs {
            self.backend.timeout_secs = other.backend.timeout_secs;
        }

        if other.log.filter != LogConfig::default().filter {
            self.log.filter = other.log.filter;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_vars(&mut self, env: &Env) {
        if let Some(dir) = env.var(ENV_CACHE_DIR) {
            self.cache.dir = Some(PathBuf::from(dir));
        }
        match env.flag(ENV_CACHE_ENABLED) {
            Some(Ok(enabled)) => self.cache.enabled = enabled,
            Some(Err(raw)) => warn!("ignoring invalid {ENV_CACHE_ENABLED} value: {raw}"),
            None => {}
        }
        if let Some(command) = env.var(ENV_BACKEND) {
            self.backend.command = Some(command);
        }
        if let Some(filter) = env.var(ENV_LOG) {
            self.log.filter = filter;
        }
    }
}
