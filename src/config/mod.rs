//! Host configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) is valid:
//!
//! ```toml
//! bind = "127.0.0.1:8080"
//! max_request_size = 8388608
//! duplicate_routes = "overwrite"   # or "reject"
//!
//! [log]
//! level = "info"
//! ansi = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::router::DuplicatePolicy;

/// Errors produced while loading a [`ServerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Settings for the bundled server, logging, and route compilation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address passed to [`Server::bind`](crate::server::Server::bind).
    pub bind: String,
    /// Largest request, headers plus body, buffered before answering `413`.
    pub max_request_size: usize,
    /// How route compilation treats two routes with the same full path.
    pub duplicate_routes: DuplicatePolicy,
    pub log: LogConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_owned(),
            max_request_size: 8 * 1024 * 1024,
            duplicate_routes: DuplicatePolicy::default(),
            log: LogConfig::default(),
        }
    }
}

/// `[log]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Colored output.
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            ansi: true,
        }
    }
}

impl ServerConfig {
    /// Read and validate a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML or unknown keys,
    /// [`ConfigError::Invalid`] when a value is out of range.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bind.trim().is_empty() {
            return Err(ConfigError::Invalid("bind must not be empty"));
        }
        if self.max_request_size == 0 {
            return Err(ConfigError::Invalid("max_request_size must be positive"));
        }
        Ok(())
    }
}
