//! Configuration for the Graviola federator.
//!
//! Configuration is a single YAML document. Every option has a default, so a
//! minimal file only needs the `storages` section:
//!
//! ```yaml
//! storages:
//!   merge_strategy:
//!     type: always_merge
//!   groups:
//!     - name: main
//!       on_query_fail: partial_response
//!       remotes:
//!         - name: prom-0
//!           address: http://prometheus-0:9090
//! ```

mod api;
mod log;
mod query;
mod storages;
pub mod time;

use std::{path::Path, time::Duration};

pub use api::*;
pub use log::*;
pub use query::*;
use serde::{Deserialize, Deserializer};
pub use storages::*;
use thiserror::Error;

/// Root configuration document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraviolaConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration.
    #[serde(default)]
    pub log: LogConfig,

    /// PromQL evaluation limits and timeouts.
    #[serde(default)]
    pub query: QueryConfig,

    /// The backend groups this instance federates over.
    pub storages: StoragesConfig,
}

impl GraviolaConfig {
    /// Load and validate configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().display().to_string()))?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: GraviolaConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.api.validate()?;
        self.query.validate()?;
        self.storages.validate()?;
        Ok(())
    }
}

/// Errors produced while loading or validating configuration. All of them are
/// fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file {1}: {0}")]
    Io(std::io::Error, String),

    #[error("parsing config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Validation(String),
}

/// A duration expressed in the config grammar (`30s`, `5m`, `1d`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigDuration(Duration);

impl ConfigDuration {
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_millis(&self) -> i64 {
        self.0.as_millis() as i64
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl<'de> Deserialize<'de> for ConfigDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        time::parse_duration(&raw)
            .map(ConfigDuration)
            .map_err(serde::de::Error::custom)
    }
}
