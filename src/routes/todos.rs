//! Todo CRUD, filtering and the due-time check

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::application::commands::{
    check_due_impl, create_todo_impl, delete_todo_impl, get_todo_impl, list_todos_impl,
    update_todo_impl, DeleteTodoResponse, DueCheckRequest, DueCheckResponse, TodoInput, TodoView,
};
use crate::routes::{AppError, SharedState};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/todos", get(list_todos).post(create_todo))
        .route("/api/todos/due-check", post(check_due))
        .route(
            "/api/todos/{id}",
            get(get_todo).put(update_todo).delete(delete_todo),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub q: Option<String>,
}

/// GET /api/todos?status=pending,overdue&q=keyword
async fn list_todos(
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<TodoView>>, AppError> {
    list_todos_impl(&state, query.status, query.q)
        .map(Json)
        .map_err(|error| AppError::logged(&state, "list_todos", error))
}

async fn get_todo(
    State(state): State<SharedState>,
    Path(todo_id): Path<String>,
) -> Result<Json<TodoView>, AppError> {
    get_todo_impl(&state, todo_id)
        .map(Json)
        .map_err(|error| AppError::logged(&state, "get_todo", error))
}

async fn create_todo(
    State(state): State<SharedState>,
    payload: Result<Json<TodoInput>, JsonRejection>,
) -> Result<(StatusCode, Json<TodoView>), AppError> {
    let Json(input) = payload?;
    let view = create_todo_impl(&state, input)
        .await
        .map_err(|error| AppError::logged(&state, "create_todo", error))?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn update_todo(
    State(state): State<SharedState>,
    Path(todo_id): Path<String>,
    payload: Result<Json<TodoInput>, JsonRejection>,
) -> Result<Json<TodoView>, AppError> {
    let Json(input) = payload?;
    update_todo_impl(&state, todo_id, input)
        .await
        .map(Json)
        .map_err(|error| AppError::logged(&state, "update_todo", error))
}

async fn delete_todo(
    State(state): State<SharedState>,
    Path(todo_id): Path<String>,
) -> Result<Json<DeleteTodoResponse>, AppError> {
    delete_todo_impl(&state, todo_id)
        .await
        .map(Json)
        .map_err(|error| AppError::logged(&state, "delete_todo", error))
}

/// POST /api/todos/due-check - pre-submission "already past" warning
async fn check_due(
    State(state): State<SharedState>,
    payload: Result<Json<DueCheckRequest>, JsonRejection>,
) -> Result<Json<DueCheckResponse>, AppError> {
    let Json(request) = payload?;
    check_due_impl(&state, request)
        .map(Json)
        .map_err(AppError::from)
}
