//! Google Calendar status, setup and authorization endpoints

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::application::calendar_sync::{CalendarServiceStatus, ConnectionTestResult};
use crate::application::commands::{
    authorization_url_impl, authorize_impl, calendar_status_impl, create_calendar_impl,
    list_calendars_impl, test_calendar_connection_impl, AuthorizationUrlResponse,
    AuthorizeResponse, CalendarListResponse, CreateCalendarResponse,
};
use crate::routes::{AppError, SharedState};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/google-calendar/status", get(status))
        .route("/api/google-calendar/test", get(test_connection))
        .route("/api/google-calendar/calendars", get(list_calendars))
        .route("/api/google-calendar/create-calendar", post(create_calendar))
        .route("/api/google-calendar/auth", get(authorization_url).post(authorize))
        .route("/api/google-calendar/auth/callback", get(authorize_callback))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateCalendarRequest {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeRequest {
    pub code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeCallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

async fn status(State(state): State<SharedState>) -> Json<CalendarServiceStatus> {
    Json(calendar_status_impl(&state).await)
}

async fn test_connection(State(state): State<SharedState>) -> Json<ConnectionTestResult> {
    Json(test_calendar_connection_impl(&state).await)
}

async fn list_calendars(State(state): State<SharedState>) -> Json<CalendarListResponse> {
    Json(list_calendars_impl(&state).await)
}

/// POST /api/google-calendar/create-calendar - body is optional
async fn create_calendar(
    State(state): State<SharedState>,
    payload: Result<Json<CreateCalendarRequest>, JsonRejection>,
) -> Result<Json<CreateCalendarResponse>, AppError> {
    let name = match payload {
        Ok(Json(request)) => request.name,
        Err(JsonRejection::MissingJsonContentType(_)) => None,
        Err(rejection) => return Err(rejection.into()),
    };
    Ok(Json(create_calendar_impl(&state, name).await))
}

async fn authorization_url(
    State(state): State<SharedState>,
) -> Result<Json<AuthorizationUrlResponse>, AppError> {
    authorization_url_impl(&state)
        .map(Json)
        .map_err(|error| AppError::logged(&state, "authorization_url", error))
}

async fn authorize(
    State(state): State<SharedState>,
    payload: Result<Json<AuthorizeRequest>, JsonRejection>,
) -> Result<Json<AuthorizeResponse>, AppError> {
    let Json(request) = payload?;
    authorize_impl(&state, request.code)
        .await
        .map(Json)
        .map_err(|error| AppError::logged(&state, "authorize_google", error))
}

/// GET /api/google-calendar/auth/callback - redirect target of the consent screen
async fn authorize_callback(
    State(state): State<SharedState>,
    Query(query): Query<AuthorizeCallbackQuery>,
) -> Result<Json<AuthorizeResponse>, AppError> {
    if let Some(error) = query.error {
        state.log_error("authorize_google", &format!("consent denied: {error}"));
        return Err(AppError::BadRequest(format!("authorization was not granted: {error}")));
    }
    authorize_impl(&state, query.code)
        .await
        .map(Json)
        .map_err(|error| AppError::logged(&state, "authorize_google", error))
}
