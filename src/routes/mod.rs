pub mod calendar;
pub mod health;
pub mod todos;

use crate::application::commands::AppState;
use crate::domain::models::FieldError;
use crate::infrastructure::error::InfraError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

pub type SharedState = Arc<AppState>;

/// Standard API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Field-level validation failures
#[derive(Serialize)]
pub struct ValidationErrorResponse {
    pub errors: Vec<FieldError>,
}

/// Maps command failures onto HTTP responses
#[derive(Debug)]
pub enum AppError {
    Command(InfraError),
    BadRequest(String),
}

impl AppError {
    /// Writes the failure to the command log before it becomes a response.
    pub fn logged(state: &AppState, command: &str, error: InfraError) -> Self {
        state.log_error(command, &error.to_string());
        Self::Command(error)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error = match self {
            Self::BadRequest(message) => {
                return (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message })).into_response();
            }
            Self::Command(error) => error,
        };

        match error {
            InfraError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(ValidationErrorResponse { errors })).into_response()
            }
            InfraError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "Todo not found".to_string(),
                }),
            )
                .into_response(),
            InfraError::CalendarUnavailable(message) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse { error: message }),
            )
                .into_response(),
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: other.to_string(),
                }),
            )
                .into_response(),
        }
    }
}

impl From<InfraError> for AppError {
    fn from(error: InfraError) -> Self {
        Self::Command(error)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("invalid JSON body: {}", rejection.body_text()))
    }
}
