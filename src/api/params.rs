//! Request parameter handling shared by the read endpoints.
//!
//! Prometheus accepts the same parameters through the query string on GET
//! and through an urlencoded form on POST, with `match[]` allowed to repeat.
//! Everything is parsed from raw key/value pairs so both transports share one
//! code path.

use chrono::Utc;

use super::response::ApiError;
use crate::{
    config::time::{parse_duration, parse_timestamp},
    engine,
    model::Matcher,
};

pub(super) struct FormParams {
    pairs: Vec<(String, String)>,
}

impl FormParams {
    pub fn parse(raw: &[u8]) -> Self {
        Self {
            pairs: url::form_urlencoded::parse(raw).into_owned().collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn required(&self, key: &str) -> Result<&str, ApiError> {
        self.get(key)
            .ok_or_else(|| ApiError::bad_data(format!("missing required parameter \"{key}\"")))
    }

    pub fn get_all(&self, key: &str) -> impl Iterator<Item = &str> {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse a `time`/`start`/`end` parameter into Unix milliseconds. Accepts
/// everything the config grammar does (RFC3339, integer seconds, relative
/// `now-5m`) plus float Unix seconds, the Prometheus convention.
pub(super) fn parse_time(key: &str, raw: &str) -> Result<i64, ApiError> {
    if let Ok(ms) = parse_timestamp(raw, Utc::now()) {
        return Ok(ms);
    }

    if let Ok(seconds) = raw.trim().parse::<f64>() {
        if seconds.is_finite() {
            return Ok((seconds * 1000.0).round() as i64);
        }
    }

    Err(ApiError::bad_data(format!(
        "invalid parameter \"{key}\": cannot parse {raw:?} to a valid timestamp"
    )))
}

/// Parse a `step` parameter into milliseconds. Accepts a duration string or
/// a float number of seconds; must be positive.
pub(super) fn parse_step(raw: &str) -> Result<i64, ApiError> {
    let step_ms = if let Ok(duration) = parse_duration(raw) {
        duration.as_millis() as i64
    } else if let Ok(seconds) = raw.trim().parse::<f64>() {
        if !seconds.is_finite() {
            return Err(ApiError::bad_data(format!(
                "invalid parameter \"step\": cannot parse {raw:?} to a valid duration"
            )));
        }
        (seconds * 1000.0).round() as i64
    } else {
        return Err(ApiError::bad_data(format!(
            "invalid parameter \"step\": cannot parse {raw:?} to a valid duration"
        )));
    };

    if step_ms <= 0 {
        return Err(ApiError::bad_data(
            "zero or negative query resolution step widths are not accepted. Try a positive integer",
        ));
    }

    Ok(step_ms)
}

/// Parse every `match[]` parameter and flatten the matchers.
pub(super) fn parse_matchers(params: &FormParams) -> Result<Vec<Matcher>, ApiError> {
    let mut matchers = Vec::new();
    for selector in params.get_all("match[]") {
        matchers.extend(engine::parse_selector(selector)?);
    }
    Ok(matchers)
}
