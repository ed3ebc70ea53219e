//! Plain HTTP handlers

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use super::state::AppState;
use crate::token;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub aws_translate: bool,
    pub connected_clients: usize,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        aws_translate: state.dispatcher.translation().is_available(),
        connected_clients: state.dispatcher.directory().count().await,
    })
}

/// POST /generate_token
pub async fn generate_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let (status, reply) = token::respond(&state.dispatcher, authorization).await;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(reply))
}
