//! Handlers for the read endpoints and the operational endpoints.

use axum::{
    extract::{Path, RawForm, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use http::{StatusCode, header};
use serde_json::json;

use super::{
    params::{FormParams, parse_matchers, parse_step, parse_time},
    response::{ApiError, query_data, success_response},
};
use crate::{AppState, querier::LabelQueryResult};

/// `GET|POST /api/v1/query`: instant query.
pub async fn query(
    State(state): State<AppState>,
    RawForm(raw): RawForm,
) -> Result<Response, ApiError> {
    let params = FormParams::parse(&raw);
    let expr = params.required("query")?;
    let time_ms = match params.get("time") {
        Some(raw_time) => parse_time("time", raw_time)?,
        None => Utc::now().timestamp_millis(),
    };

    let result = state.engine.instant_query(expr, time_ms).await?;
    Ok(success_response(query_data(&result.value), &result.warnings))
}

/// `GET|POST /api/v1/query_range`: range query.
pub async fn query_range(
    State(state): State<AppState>,
    RawForm(raw): RawForm,
) -> Result<Response, ApiError> {
    let params = FormParams::parse(&raw);
    let expr = params.required("query")?;
    let start_ms = parse_time("start", params.required("start")?)?;
    let end_ms = parse_time("end", params.required("end")?)?;
    let step_ms = parse_step(params.required("step")?)?;

    if end_ms < start_ms {
        return Err(ApiError::bad_data(
            "invalid parameter \"end\": end timestamp must not be before start time",
        ));
    }

    let result = state
        .engine
        .range_query(expr, start_ms, end_ms, step_ms)
        .await?;
    Ok(success_response(query_data(&result.value), &result.warnings))
}

/// `GET|POST /api/v1/labels`: label names.
pub async fn label_names(
    State(state): State<AppState>,
    RawForm(raw): RawForm,
) -> Result<Response, ApiError> {
    let params = FormParams::parse(&raw);
    let matchers = parse_matchers(&params)?;

    let result = state.storage.querier(0, 0).label_names(&matchers).await;
    label_response(result)
}

/// `GET /api/v1/label/{name}/values`: values for one label name.
pub async fn label_values(
    State(state): State<AppState>,
    Path(name): Path<String>,
    RawForm(raw): RawForm,
) -> Result<Response, ApiError> {
    let params = FormParams::parse(&raw);
    let matchers = parse_matchers(&params)?;

    let result = state
        .storage
        .querier(0, 0)
        .label_values(&name, &matchers)
        .await;
    label_response(result)
}

/// The merge layer dedupes with set semantics and makes no order promise;
/// the API surface imposes the order.
fn label_response(result: LabelQueryResult) -> Result<Response, ApiError> {
    if let Some(err) = result.error {
        return Err(ApiError::execution(err.to_string()));
    }

    let mut values = result.values;
    values.sort();
    Ok(success_response(json!(values), &result.annotations))
}

pub async fn healthy() -> StatusCode {
    StatusCode::OK
}

pub async fn ready() -> StatusCode {
    StatusCode::OK
}

pub async fn metrics() -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::observability::metrics::render(),
    )
        .into_response()
}
