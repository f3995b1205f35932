//! Wire types for the Prometheus HTTP API response envelope and its decoding
//! into the domain model.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::model::{GraviolaSeries, LabelSet, QueryError, Sample};

pub(super) const STATUS_ERROR: &str = "error";

/// The outer `{"status": ..., "data": ..., "warnings": ...}` envelope every
/// Prometheus API response is wrapped in.
#[derive(Debug, Deserialize)]
pub(super) struct Envelope {
    pub status: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SelectData {
    #[serde(rename = "resultType")]
    result_type: String,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VectorEntry {
    metric: BTreeMap<String, String>,
    value: WirePoint,
}

#[derive(Debug, Deserialize)]
struct MatrixEntry {
    metric: BTreeMap<String, String>,
    #[serde(default)]
    values: Vec<WirePoint>,
}

/// A `[<unix seconds float>, "<value>"]` pair as Prometheus encodes it.
#[derive(Debug, Deserialize)]
struct WirePoint(f64, String);

impl WirePoint {
    fn into_sample(self) -> Result<Sample, QueryError> {
        Ok(Sample::new(
            (self.0 * 1000.0).floor() as i64,
            parse_sample_value(&self.1)?,
        ))
    }
}

/// Decode the `data` part of a Select response, dispatching on `resultType`.
pub(super) fn decode_series_data(
    data: serde_json::Value,
) -> Result<Vec<GraviolaSeries>, QueryError> {
    let data: SelectData = serde_json::from_value(data)
        .map_err(|e| QueryError::Decode(e.to_string()))?;

    match data.result_type.as_str() {
        "vector" => {
            let entries: Vec<VectorEntry> = serde_json::from_value(data.result)
                .map_err(|e| QueryError::Decode(e.to_string()))?;

            entries
                .into_iter()
                .map(|entry| {
                    Ok(GraviolaSeries::new(
                        LabelSet::from_map(entry.metric),
                        vec![entry.value.into_sample()?],
                    ))
                })
                .collect()
        }
        "matrix" => {
            let entries: Vec<MatrixEntry> = serde_json::from_value(data.result)
                .map_err(|e| QueryError::Decode(e.to_string()))?;

            entries
                .into_iter()
                .map(|entry| {
                    let samples = entry
                        .values
                        .into_iter()
                        .map(WirePoint::into_sample)
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(GraviolaSeries::new(LabelSet::from_map(entry.metric), samples))
                })
                .collect()
        }
        other => Err(QueryError::UnsupportedResultType(other.to_string())),
    }
}

/// Decode the `data` part of a label-names or label-values response.
pub(super) fn decode_label_data(data: serde_json::Value) -> Result<Vec<String>, QueryError> {
    serde_json::from_value(data).map_err(|e| QueryError::Decode(e.to_string()))
}

/// Parse a sample value, accepting the IEEE-754 special literals Prometheus
/// emits.
fn parse_sample_value(raw: &str) -> Result<f64, QueryError> {
    match raw {
        "NaN" => Ok(f64::NAN),
        "Inf" | "+Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        _ => raw
            .parse()
            .map_err(|_| QueryError::Decode(format!("invalid sample value {raw}"))),
    }
}
