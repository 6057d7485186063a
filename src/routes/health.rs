use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::SecondsFormat;
use serde::Serialize;

use crate::routes::{ErrorResponse, SharedState};

pub fn router() -> Router<SharedState> {
    Router::new().route("/api/health", get(health))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub timestamp: String,
}

async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        message: "AI Todo List Backend is running".to_string(),
        timestamp: state.now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

pub async fn not_found() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "API endpoint not found".to_string(),
        }),
    )
}
