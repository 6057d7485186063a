use crate::domain::error::CoreError;
use crate::domain::models::FieldError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("OAuth error: {0}")]
    OAuth(String),
    #[error("Credential store error: {0}")]
    Credential(String),
    #[error("Google Calendar error: {0}")]
    Calendar(String),
    #[error("Google Calendar API error: http {status}{}", body_suffix(.body))]
    CalendarHttp { status: u16, body: String },
    #[error("Calendar sync unavailable: {0}")]
    CalendarUnavailable(String),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),
    #[error("not found: {0}")]
    NotFound(String),
}

impl InfraError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }
}

fn body_suffix(body: &str) -> String {
    if body.trim().is_empty() {
        String::new()
    } else {
        format!("; body={body}")
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|error| format!("{}: {}", error.field, error.message))
        .collect::<Vec<_>>()
        .join("; ")
}
