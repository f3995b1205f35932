//! PromQL evaluation limits and timeouts.

use serde::Deserialize;

use super::{ConfigDuration, ConfigError};

pub const DEFAULT_MAX_SAMPLES: u64 = 10000;
pub const DEFAULT_MAX_CONCURRENT_QUERIES: usize = 20;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    /// Sample budget per evaluation. Queries selecting more samples than this
    /// fail with an execution error.
    #[serde(default = "default_max_samples")]
    pub max_samples: u64,

    /// Staleness window applied when resolving instant vectors.
    #[serde(default = "default_lookback_delta")]
    pub lookback_delta: ConfigDuration,

    /// Admission-gate capacity: how many evaluations may run at once.
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,

    /// Deadline for a single evaluation, including all backend calls.
    #[serde(default = "default_timeout")]
    pub timeout: ConfigDuration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_samples: default_max_samples(),
            lookback_delta: default_lookback_delta(),
            max_concurrent_queries: default_max_concurrent_queries(),
            timeout: default_timeout(),
        }
    }
}

impl QueryConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.max_samples == 0 {
            return Err(ConfigError::Validation(
                "query.max_samples must be greater than zero".into(),
            ));
        }
        if self.lookback_delta.is_zero() {
            return Err(ConfigError::Validation(
                "query.lookback_delta must be greater than zero".into(),
            ));
        }
        if self.max_concurrent_queries == 0 {
            return Err(ConfigError::Validation(
                "query.max_concurrent_queries must be greater than zero".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Validation(
                "query.timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn default_max_samples() -> u64 {
    DEFAULT_MAX_SAMPLES
}

fn default_lookback_delta() -> ConfigDuration {
    ConfigDuration::from_secs(5 * 60)
}

fn default_max_concurrent_queries() -> usize {
    DEFAULT_MAX_CONCURRENT_QUERIES
}

fn default_timeout() -> ConfigDuration {
    ConfigDuration::from_secs(60)
}
