//! HTTP server setup with Axum

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::rest::{events, readings, stats};
use super::state::AppState;

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>, cors_allow_all: bool) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/temperature", post(readings::post_temperature))
        .route("/traffic", post(readings::post_traffic))
        .route("/temperature/:index", get(readings::get_temperature))
        .route("/traffic/:index", get(readings::get_traffic))
        .route("/stats", get(stats::log_stats))
        .route("/processing/stats", get(stats::processing_stats))
        .route("/events/temperature", get(events::temperature_events))
        .route("/events/traffic", get(events::traffic_events))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors_allow_all {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
