//! HTTP control surface

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/stream", get(handlers::stream_mjpeg))
        .route("/snapshot", get(handlers::snapshot_jpeg))
        .route("/snapshot/raw", get(handlers::snapshot_raw))
        .route("/overlay", get(handlers::overlay_get))
        .route("/overlay/set", get(handlers::overlay_set))
        .route("/blocking", get(handlers::blocking_get))
        .route("/blocking/set", get(handlers::blocking_set))
        .route("/blocking/background", post(handlers::blocking_background))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
