pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod routes;

use application::commands::AppState;
use axum::http::HeaderValue;
use axum::Router;
use infrastructure::error::InfraError;
use routes::SharedState;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,todo_calendar=debug"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

fn cors_layer(frontend_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match HeaderValue::from_str(frontend_origin.trim()) {
        Ok(origin) => cors.allow_origin(origin),
        Err(error) => {
            tracing::warn!(frontend_origin, %error, "invalid frontend origin; allowing any origin");
            cors.allow_origin(Any)
        }
    }
}

pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config().frontend_origin);

    Router::new()
        .merge(routes::todos::router())
        .merge(routes::calendar::router())
        .merge(routes::health::router())
        .fallback(routes::health::not_found)
        .with_state(state)
        .layer(cors)
}

/// Bootstraps `workspace_root` and serves the API until ctrl-c.
pub async fn run(workspace_root: PathBuf) -> Result<(), InfraError> {
    let state = Arc::new(AppState::new(workspace_root)?);
    let addr = state.config().listen_addr;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "todo-calendar listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for shutdown signal");
    }
}
