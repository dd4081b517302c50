use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::timeout::TimeoutLayer;

use crate::config::ServerConfig;
use crate::dispatch::ChatDispatcher;
use crate::handlers;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: ChatDispatcher,
    pub idle_timeout_seconds: u64,
    pub keep_alive_interval_seconds: u64,
}

impl AppState {
    pub fn new(dispatcher: ChatDispatcher, server: &ServerConfig) -> Self {
        Self {
            dispatcher,
            idle_timeout_seconds: server.idle_timeout_seconds,
            keep_alive_interval_seconds: server.keep_alive_interval_seconds,
        }
    }
}

pub fn build_app(state: AppState, request_timeout_secs: u64) -> Router {
    let api = Router::new()
        .route("/chat", post(handlers::chat))
        .route("/chat/stream", post(handlers::chat_stream))
        .route("/models", get(handlers::list_models))
        .with_state(state);

    Router::new()
        .route("/livez", get(handlers::livez))
        .route("/readyz", get(handlers::readyz))
        .route("/version", get(handlers::version))
        .merge(api)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(request_timeout_secs),
        ))
}
