//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Example
//!
//! ```toml
//! api_base = "https://api.github.com"
//! owner = "simon-weber"
//! repo = "the-listserve-archive"
//! branch = "gh-pages"
//! timeout_secs = 30
//!
//! [auth]
//! token = "ghp_..."
//! ```
//!
//! # Validation
//!
//! Values are validated after all layers are applied, so a file may omit
//! fields that the environment or CLI flags later provide.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::BranchName;

/// Default GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default branch mutated when none is given.
pub const DEFAULT_BRANCH: &str = "master";

/// User-Agent header value for API requests.
pub const DEFAULT_USER_AGENT: &str = concat!("ghcommit/", env!("CARGO_PKG_VERSION"));

/// Default per-request transport timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection configuration for one repository on the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// API base URL (configurable for GitHub Enterprise)
    pub api_base: String,

    /// Repository owner (user or organization)
    pub owner: String,

    /// Repository name
    pub repo: String,

    /// Branch used when a command does not name one
    pub branch: String,

    /// User-Agent sent with every request
    pub user_agent: String,

    /// Per-request transport timeout in seconds
    pub timeout_secs: u64,

    /// Credentials
    pub auth: AuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            owner: String::new(),
            repo: String::new(),
            branch: DEFAULT_BRANCH.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.owner.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "owner is required (set `owner`, GHCOMMIT_OWNER or --owner)".into(),
            ));
        }
        if self.repo.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "repo is required (set `repo`, GHCOMMIT_REPO or --repo)".into(),
            ));
        }
        if !(self.api_base.starts_with("https://") || self.api_base.starts_with("http://")) {
            return Err(ConfigError::InvalidValue(format!(
                "api_base must be an http(s) URL, got '{}'",
                self.api_base
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "timeout_secs must be greater than zero".into(),
            ));
        }
        self.default_branch()?;
        self.auth.credentials()?;
        Ok(())
    }

    /// The configured default branch.
    pub fn default_branch(&self) -> Result<BranchName, ConfigError> {
        BranchName::new(self.branch.clone())
            .map_err(|e| ConfigError::InvalidValue(format!("branch: {}", e)))
    }

    /// Resolve the credentials carried on requests.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        self.auth.credentials()
    }
}

/// Credential settings as written in the config file.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Bearer token (takes precedence over basic credentials)
    pub token: Option<String>,

    /// Basic-auth username
    pub username: Option<String>,

    /// Basic-auth password or personal access token
    pub password: Option<String>,
}

impl AuthConfig {
    /// Resolve the settings into the credentials to send.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if only half of a basic-auth pair
    /// is present.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(Credentials::Token(token.clone()));
        }
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Ok(Credentials::Basic {
                username: username.clone(),
                password: password.clone(),
            }),
            (Some(_), None) => Err(ConfigError::InvalidValue(
                "auth.username requires auth.password (or use --ask-secret)".into(),
            )),
            (None, Some(_)) => Err(ConfigError::InvalidValue(
                "auth.password requires auth.username".into(),
            )),
            (None, None) => Ok(Credentials::Anonymous),
        }
    }
}

// Custom Debug to avoid exposing secrets
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("has_token", &self.token.is_some())
            .field("username", &self.username)
            .field("has_password", &self.password.is_some())
            .finish()
    }
}

/// Credentials attached to requests.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// No credentials; only reads against a public repository succeed.
    Anonymous,
    /// `Authorization: Bearer <token>`
    Token(String),
    /// HTTP basic authentication
    Basic { username: String, password: String },
}

impl Credentials {
    /// Whether any credentials are present.
    pub fn is_present(&self) -> bool {
        !matches!(self, Credentials::Anonymous)
    }
}

// Custom Debug to avoid exposing secrets
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Anonymous => write!(f, "Anonymous"),
            Credentials::Token(_) => write!(f, "Token(<redacted>)"),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}
