//! Graviola is a read-only query federator for Prometheus-compatible metric
//! storages. It exposes the Prometheus HTTP query API and fans each request
//! out to a configured set of remote backends, merging their answers into a
//! single federated view that a small PromQL engine evaluates over.

use std::sync::Arc;

use thiserror::Error;

pub mod api;
pub mod config;
pub mod engine;
pub mod model;
pub mod observability;
pub mod querier;

#[cfg(test)]
mod tests;

use config::GraviolaConfig;
use engine::{
    Engine, EngineOpts,
    tracker::{QueryTracker, TrackerError},
};
use querier::storage::GraviolaStorage;

/// Everything a request handler needs, assembled once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GraviolaConfig>,
    pub storage: Arc<GraviolaStorage>,
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(config: GraviolaConfig) -> Result<Self, StartupError> {
        // One shared client for all backends; reqwest keeps per-host
        // connection pools internally. Its request timeout is the per-backend
        // timeout of the pipeline.
        let http_client = reqwest::Client::builder()
            .timeout(config.query.timeout.as_duration())
            .build()?;

        let storage = Arc::new(GraviolaStorage::from_config(&config.storages, http_client));
        let tracker = Arc::new(QueryTracker::new(config.query.max_concurrent_queries)?);
        let engine = Arc::new(Engine::new(
            storage.clone(),
            tracker,
            EngineOpts {
                timeout: config.query.timeout.as_duration(),
                max_samples: config.query.max_samples,
                lookback_delta: config.query.lookback_delta.as_duration(),
            },
        ));

        Ok(Self {
            config: Arc::new(config),
            storage,
            engine,
        })
    }
}

/// Fatal errors while assembling the application; the process exits non-zero.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("building HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("creating query tracker: {0}")]
    Tracker(#[from] TrackerError),
}
