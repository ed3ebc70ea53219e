use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::state::AppState;
use super::{http, ws};

/// Build the complete axum Router with all relay routes.
pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::upgrade))
        .route("/generate_token", post(http::generate_token))
        .route("/health", get(http::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
