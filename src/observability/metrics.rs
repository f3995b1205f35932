//! Prometheus metrics for the federator itself.
//!
//! Installs the global recorder once at startup; `/metrics` renders the
//! handle. The querier tree records per-querier traffic through the helpers
//! below.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

pub const QUERIER_QUERY_TOTAL: &str = "graviola_querier_query_total";
pub const QUERIER_QUERY_LATENCY: &str = "graviola_querier_query_latency_seconds";

const QUERY_LATENCY_BUCKETS: &[f64] = &[
    0.1, 0.25, 0.5, 0.75, 1.0, 1.5, 2.5, 5.0, 10.0, 20.0, 30.0, 45.0, 60.0,
];

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("setting up metrics recorder: {0}")]
    Setup(String),

    #[error("installing metrics recorder: {0}")]
    Install(String),
}

/// Install the Prometheus recorder and register metric metadata. Idempotent,
/// so tests sharing one process can call it freely.
pub fn init_metrics() -> Result<(), MetricsError> {
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }

    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(QUERIER_QUERY_LATENCY.to_string()),
            QUERY_LATENCY_BUCKETS,
        )
        .map_err(|e| MetricsError::Setup(e.to_string()))?;

    let handle = builder
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    describe_counter!(
        QUERIER_QUERY_TOTAL,
        "Counter for outgoing requests. Label queries are not accounted here."
    );
    describe_histogram!(
        QUERIER_QUERY_LATENCY,
        "Latency of outgoing requests to a remote/group, in seconds. Only PromQL queries."
    );

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::Setup("metrics recorder already installed".into()))?;

    Ok(())
}

/// Render the exposition-format payload for `/metrics`. Empty until
/// `init_metrics` ran.
pub fn render() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

pub fn record_querier_query(querier_type: &'static str, querier_name: &str) {
    counter!(
        QUERIER_QUERY_TOTAL,
        "querier_type" => querier_type,
        "querier_name" => querier_name.to_string(),
    )
    .increment(1);
}

pub fn record_querier_latency(querier_type: &'static str, querier_name: &str, seconds: f64) {
    histogram!(
        QUERIER_QUERY_LATENCY,
        "querier_type" => querier_type,
        "querier_name" => querier_name.to_string(),
    )
    .record(seconds);
}
