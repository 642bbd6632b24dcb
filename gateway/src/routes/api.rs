use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::api;
use crate::state::AppState;
use std::sync::Arc;

/// Create the public health router
///
/// `/ping` is what client health probes hit; the `health` variants are meant
/// for load balancers and log allow-listed request headers.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(api::ping))
        .route("/health", get(api::health_check))
        .route("/health/", get(api::health_check))
        .route("/healthz", get(api::health_check))
        .route("/healthz/", get(api::health_check))
        .layer(TraceLayer::new_for_http())
}
