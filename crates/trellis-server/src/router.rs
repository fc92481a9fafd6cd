use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all Trellis endpoints.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_size;
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/objects/:graph", post(handler::upload_handler))
        .route("/objects/:graph/:id", get(handler::stream_handler))
        .route("/objects/:graph/:id/single", get(handler::single_handler))
        .route("/api/diff/:graph", post(handler::diff_handler))
        .route("/api/getobjects/:graph", post(handler::get_objects_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
