//! Logging configuration.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Minimum level emitted to stdout.
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The level as a `tracing` filter directive.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("debug", LogLevel::Debug)]
    #[case("info", LogLevel::Info)]
    #[case("warn", LogLevel::Warn)]
    #[case("error", LogLevel::Error)]
    fn parses_all_levels(#[case] raw: &str, #[case] expected: LogLevel) {
        let config: LogConfig =
            serde_yaml::from_str(&format!("level: {raw}")).unwrap();
        assert_eq!(config.level, expected);
    }

    #[test]
    fn rejects_unknown_level() {
        let result: Result<LogConfig, _> = serde_yaml::from_str("level: loud");
        assert!(result.is_err());
    }
}
