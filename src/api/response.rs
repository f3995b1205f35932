//! The Prometheus HTTP API response envelope and error mapping.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde_json::{Value, json};

use crate::{
    engine::{EngineError, QueryValue, VectorSample, tracker::TrackerError},
    model::{Annotations, GraviolaSeries, LabelSet, Sample},
};

pub(super) fn success_response(data: Value, warnings: &Annotations) -> Response {
    let mut body = json!({
        "status": "success",
        "data": data,
    });

    if !warnings.is_empty() {
        body["warnings"] = Value::Array(
            warnings
                .iter()
                .map(|w| Value::String(w.to_string()))
                .collect(),
        );
    }

    Json(body).into_response()
}

pub(super) fn query_data(value: &QueryValue) -> Value {
    match value {
        QueryValue::Vector(samples) => json!({
            "resultType": "vector",
            "result": samples.iter().map(vector_entry).collect::<Vec<_>>(),
        }),
        QueryValue::Matrix(series) => json!({
            "resultType": "matrix",
            "result": series.iter().map(matrix_entry).collect::<Vec<_>>(),
        }),
        QueryValue::Scalar(sample) => json!({
            "resultType": "scalar",
            "result": point(sample),
        }),
    }
}

fn vector_entry(sample: &VectorSample) -> Value {
    json!({
        "metric": metric_object(&sample.labels),
        "value": point(&sample.sample),
    })
}

fn matrix_entry(series: &GraviolaSeries) -> Value {
    json!({
        "metric": metric_object(&series.labels),
        "values": series.samples.iter().map(point).collect::<Vec<_>>(),
    })
}

fn metric_object(labels: &LabelSet) -> Value {
    Value::Object(
        labels
            .iter()
            .map(|label| (label.name.clone(), Value::String(label.value.clone())))
            .collect(),
    )
}

/// `[<unix seconds>, "<value>"]`, the wire form of one datapoint.
fn point(sample: &Sample) -> Value {
    json!([sample.timestamp_ms as f64 / 1000.0, format_value(sample.value)])
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{value}")
    }
}

/// An error answered in the Prometheus envelope:
/// `{"status":"error","errorType":...,"error":...}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_type: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn bad_data(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error_type: "bad_data",
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            error_type: "execution",
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "status": "error",
            "errorType": self.error_type,
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match &err {
            EngineError::Parse(_) => ApiError::bad_data(err.to_string()),
            EngineError::Unsupported(_) | EngineError::Execution(_) | EngineError::SampleLimit => {
                ApiError::execution(err.to_string())
            }
            EngineError::Timeout => ApiError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                error_type: "timeout",
                message: err.to_string(),
            },
            EngineError::Admission(TrackerError::Cancelled) => ApiError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                error_type: "canceled",
                message: err.to_string(),
            },
            EngineError::Admission(_) => ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error_type: "internal",
                message: err.to_string(),
            },
        }
    }
}
