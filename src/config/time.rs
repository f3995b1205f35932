//! Duration and timestamp grammars used by the configuration file and the
//! HTTP query parameters.
//!
//! Durations are `<digits><unit>` where unit is one of `d`, `h`, `m`, `s`,
//! `ms` (`d` counts as 24 hours). Timestamps accept RFC3339, a bare integer
//! Unix-seconds value, or a relative `now` / `now-<duration>` form.

use std::{sync::OnceLock, time::Duration};

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("value {0} is not a duration")]
    InvalidDuration(String),

    #[error("unable to parse time: {0}")]
    InvalidTimestamp(String),
}

fn duration_rex() -> &'static Regex {
    static REX: OnceLock<Regex> = OnceLock::new();
    REX.get_or_init(|| Regex::new("^[0-9]+(d|h|m|s|ms)$").unwrap())
}

fn unix_timestamp_rex() -> &'static Regex {
    static REX: OnceLock<Regex> = OnceLock::new();
    REX.get_or_init(|| Regex::new("^[0-9]+$").unwrap())
}

fn relative_timestamp_rex() -> &'static Regex {
    static REX: OnceLock<Regex> = OnceLock::new();
    REX.get_or_init(|| Regex::new("^now(-[0-9]+(d|h|m|s|ms))?$").unwrap())
}

/// Parse a duration string such as `30s`, `5m` or `2d`.
pub fn parse_duration(input: &str) -> Result<Duration, TimeParseError> {
    let input = input.trim();

    if !duration_rex().is_match(input) {
        return Err(TimeParseError::InvalidDuration(input.to_string()));
    }

    let (digits, unit_ms) = if let Some(digits) = input.strip_suffix("ms") {
        (digits, 1u64)
    } else if let Some(digits) = input.strip_suffix('s') {
        (digits, 1_000)
    } else if let Some(digits) = input.strip_suffix('m') {
        (digits, 60 * 1_000)
    } else if let Some(digits) = input.strip_suffix('h') {
        (digits, 60 * 60 * 1_000)
    } else if let Some(digits) = input.strip_suffix('d') {
        (digits, 24 * 60 * 60 * 1_000)
    } else {
        return Err(TimeParseError::InvalidDuration(input.to_string()));
    };

    let amount: u64 = digits
        .parse()
        .map_err(|_| TimeParseError::InvalidDuration(input.to_string()))?;

    Ok(Duration::from_millis(amount.saturating_mul(unit_ms)))
}

/// Parse a timestamp into Unix milliseconds. Accepts RFC3339, a relative
/// `now-<duration>` form and bare integer Unix seconds, tried in that order.
pub fn parse_timestamp(input: &str, now: DateTime<Utc>) -> Result<i64, TimeParseError> {
    let input = input.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Ok(parsed.timestamp_millis());
    }

    if relative_timestamp_rex().is_match(input) {
        return parse_relative(input, now);
    }

    if unix_timestamp_rex().is_match(input) {
        let secs: i64 = input
            .parse()
            .map_err(|_| TimeParseError::InvalidTimestamp(input.to_string()))?;
        return Ok(secs * 1000);
    }

    Err(TimeParseError::InvalidTimestamp(input.to_string()))
}

fn parse_relative(input: &str, now: DateTime<Utc>) -> Result<i64, TimeParseError> {
    if input == "now" {
        return Ok(now.timestamp_millis());
    }

    let offset = match input.split_once('-') {
        Some((_, offset)) => offset,
        None => return Err(TimeParseError::InvalidTimestamp(input.to_string())),
    };

    let period = parse_duration(offset)
        .map_err(|_| TimeParseError::InvalidTimestamp(input.to_string()))?;

    Ok(now.timestamp_millis() - period.as_millis() as i64)
}
