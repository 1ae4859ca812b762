//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. Environment variables
//! 4. CLI flags (not handled here)
//!
//! # Config File Location
//!
//! Searched in order:
//! 1. The explicit path passed by the caller (must exist)
//! 2. `$GHCOMMIT_CONFIG` if set (must exist)
//! 3. `<config_dir>/ghcommit/config.toml` (optional)
//!
//! # Environment
//!
//! - `GITHUB_TOKEN`: bearer token
//! - `GH_USER` / `GH_SECRET`: basic credentials
//! - `GHCOMMIT_OWNER`, `GHCOMMIT_REPO`, `GHCOMMIT_API_BASE`, `GHCOMMIT_BRANCH`
//!
//! The loaded [`Config`] is an explicit value handed to the store client;
//! nothing here is process-global.
//!
//! # Example
//!
//! ```no_run
//! use ghcommit::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! config.validate().unwrap();
//! println!("{}/{} on {}", config.owner, config.repo, config.branch);
//! ```

pub mod schema;

pub use schema::{AuthConfig, Config, Credentials};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "GHCOMMIT_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from the file and the process environment.
    ///
    /// The result is not validated; call [`Config::validate`] once CLI
    /// overrides have been applied.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file is missing or if any
    /// config file cannot be parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    /// Load configuration with an injected environment lookup.
    pub fn load_with(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Config, ConfigError> {
        let mut config = match Self::locate(explicit, &env)? {
            Some(path) => Self::read_file(&path)?,
            None => Config::default(),
        };
        config.apply_env(env);
        Ok(config)
    }

    /// Find the config file to read, if any.
    fn locate(
        explicit: Option<&Path>,
        env: &impl Fn(&str) -> Option<String>,
    ) -> Result<Option<PathBuf>, ConfigError> {
        if let Some(path) = explicit {
            return Self::require(path.to_path_buf()).map(Some);
        }
        if let Some(path) = env(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Self::require(PathBuf::from(path)).map(Some);
        }
        Ok(Self::default_path().filter(|p| p.exists()))
    }

    fn require(path: PathBuf) -> Result<PathBuf, ConfigError> {
        if path.exists() {
            Ok(path)
        } else {
            Err(ConfigError::NotFound(path))
        }
    }

    /// The default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ghcommit").join("config.toml"))
    }

    /// Read and parse a config file.
    pub fn read_file(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Overlay environment variables onto this configuration.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| env(key).filter(|v| !v.is_empty());

        if let Some(owner) = non_empty("GHCOMMIT_OWNER") {
            self.owner = owner;
        }
        if let Some(repo) = non_empty("GHCOMMIT_REPO") {
            self.repo = repo;
        }
        if let Some(api_base) = non_empty("GHCOMMIT_API_BASE") {
            self.api_base = api_base;
        }
        if let Some(branch) = non_empty("GHCOMMIT_BRANCH") {
            self.branch = branch;
        }
        if let Some(token) = non_empty("GITHUB_TOKEN") {
            self.auth.token = Some(token);
        }
        if let Some(user) = non_empty("GH_USER") {
            self.auth.username = Some(user);
        }
        if let Some(secret) = non_empty("GH_SECRET") {
            self.auth.password = Some(secret);
        }
    }
}
