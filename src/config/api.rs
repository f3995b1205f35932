//! HTTP server configuration.

use serde::Deserialize;

use super::{ConfigDuration, ConfigError};

pub const DEFAULT_PORT: u16 = 9197;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// TCP port the server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Grace period for in-flight requests during shutdown.
    #[serde(default = "default_timeout")]
    pub timeout: ConfigDuration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            timeout: default_timeout(),
        }
    }
}

impl ApiConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Validation("api.port cannot be zero".into()));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Validation(
                "api.timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout() -> ConfigDuration {
    ConfigDuration::from_secs(5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_port_is_invalid() {
        let config = ApiConfig {
            port: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn defaults_are_valid() {
        assert!(ApiConfig::default().validate().is_ok());
    }
}
