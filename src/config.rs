//! Monitor and HTTP endpoint configuration
//!
//! Configuration can be built in code, taken from [`MonitorConfig::default`],
//! or loaded from a TOML file. Missing keys fall back to the defaults:
//!
//! ```toml
//! keep_records = false
//! default_category = "GLOBAL"
//! http_server_addr = "0.0.0.0:8080"
//!
//! [http_endpoints]
//! blocked = "/blocked"
//! categories = "/categories"
//! stack = "/stacks/"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Category used when a lock has none and no monitor supplies one
pub const DEFAULT_CATEGORY: &str = "GLOBAL";

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// URL paths of the HTTP endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpEndpoints {
    /// List of currently recorded long locks
    pub blocked: String,
    /// Statistics per category
    pub categories: String,
    /// Prefix for stack lookups; the stack id is appended (e.g. `/stacks/42`)
    pub stack: String,
}

impl Default for HttpEndpoints {
    fn default() -> Self {
        Self {
            blocked: "/blocked".to_string(),
            categories: "/categories".to_string(),
            stack: "/stacks/".to_string(),
        }
    }
}

/// Settings for a [`Monitor`](crate::monitor::Monitor) and its HTTP server
///
/// # Example
/// ```
/// use lockmon::config::MonitorConfig;
///
/// let config = MonitorConfig::default();
/// assert!(!config.keep_records);
/// assert_eq!(config.default_category, "GLOBAL");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Keep long-lock records after the lock is released
    pub keep_records: bool,

    /// Category for locks that were not given one
    pub default_category: String,

    /// Listen address of the HTTP server
    pub http_server_addr: String,

    pub http_endpoints: HttpEndpoints,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            keep_records: false,
            default_category: DEFAULT_CATEGORY.to_string(),
            http_server_addr: "0.0.0.0:8080".to_string(),
            http_endpoints: HttpEndpoints::default(),
        }
    }
}

impl MonitorConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_category.is_empty() {
            return Err(ConfigError::Invalid(
                "default_category must not be empty".to_string(),
            ));
        }

        if self.http_server_addr.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "http_server_addr must not be empty".to_string(),
            ));
        }

        let endpoints = &self.http_endpoints;
        for (name, path) in [
            ("blocked", &endpoints.blocked),
            ("categories", &endpoints.categories),
            ("stack", &endpoints.stack),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "http_endpoints.{name} must start with '/', got {path:?}"
                )));
            }
        }

        if !endpoints.stack.ends_with('/') {
            return Err(ConfigError::Invalid(format!(
                "http_endpoints.stack must end with '/', got {:?}",
                endpoints.stack
            )));
        }

        if endpoints.blocked == endpoints.categories
            || endpoints.blocked == endpoints.stack
            || endpoints.categories == endpoints.stack
        {
            return Err(ConfigError::Invalid(
                "http_endpoints must be distinct".to_string(),
            ));
        }

        Ok(())
    }
}
