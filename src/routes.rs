//! HTTP routes for hosting-platform health checks.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::intake::{SessionStore, Variant};

/// Shared state for the status routes.
#[derive(Clone)]
pub struct StatusRouteState {
    pub variant: Variant,
    pub sessions: Arc<SessionStore>,
}

/// Body of `GET /api/intake/status`.
#[derive(Debug, Serialize)]
pub struct IntakeStatus {
    pub variant: Variant,
    pub active_sessions: usize,
    pub version: &'static str,
}

/// GET /health
async fn health() -> &'static str {
    "ok"
}

/// GET /api/intake/status
async fn get_status(State(state): State<StatusRouteState>) -> impl IntoResponse {
    Json(IntakeStatus {
        variant: state.variant,
        active_sessions: state.sessions.len().await,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the status routes.
pub fn status_routes(state: StatusRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/intake/status", get(get_status))
        .with_state(state)
}
