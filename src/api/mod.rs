//! The Prometheus-compatible HTTP surface.

pub mod handlers;
mod params;
mod response;

use std::any::Any;

use axum::{
    Router,
    body::Body,
    routing::get,
};
use http::{Response, StatusCode};
pub use response::ApiError;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::AppState;

/// The full application router: read endpoints, operational endpoints, and
/// the middleware stack.
pub fn router(state: AppState) -> Router {
    with_middleware(base_router(state))
}

pub(crate) fn base_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/query",
            get(handlers::query).post(handlers::query),
        )
        .route(
            "/api/v1/query_range",
            get(handlers::query_range).post(handlers::query_range),
        )
        .route(
            "/api/v1/labels",
            get(handlers::label_names).post(handlers::label_names),
        )
        .route("/api/v1/label/{name}/values", get(handlers::label_values))
        .route("/healthy", get(handlers::healthy))
        .route("/ready", get(handlers::ready))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
}

pub(crate) fn with_middleware(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

/// A panicking handler answers 500 with an empty body; the connection
/// survives for subsequent requests.
fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    tracing::error!("panic while serving a request");
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .body(Body::empty())
        .unwrap()
}
