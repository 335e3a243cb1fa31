//! HTTP + WebSocket surface for the presentation layer.

mod rest;
mod ws;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, patch, post},
};
use tower_http::cors::CorsLayer;

use crate::disruption::DisruptionOrchestrator;
use crate::error::{Error, StorageError};
use crate::reassign::ReassignmentCoordinator;
use crate::session::FloorSession;

pub use ws::FloorWsMessage;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<FloorSession>,
    pub reassigner: Arc<ReassignmentCoordinator>,
    pub orchestrator: Arc<DisruptionOrchestrator>,
}

impl AppState {
    pub fn new(session: Arc<FloorSession>, orchestrator: Arc<DisruptionOrchestrator>) -> Self {
        Self {
            reassigner: Arc::new(ReassignmentCoordinator::new(session.clone())),
            session,
            orchestrator,
        }
    }
}

/// Build the Axum router with floor REST and WebSocket routes.
pub fn floor_routes(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(rest::health))
        .route("/api/dashboard", get(rest::dashboard))
        .route("/api/jobs", get(rest::list_jobs).post(rest::create_job))
        .route("/api/jobs/{id}", patch(rest::update_job))
        .route("/api/jobs/{id}/status", post(rest::transition_job))
        .route("/api/jobs/{id}/reassign", post(rest::reassign_job))
        .route("/api/machines", get(rest::list_machines))
        .route("/api/workers", get(rest::list_workers))
        .route("/api/analytics", get(rest::analytics))
        .route(
            "/api/disruptions",
            get(rest::list_disruptions).post(rest::report_disruption),
        )
        .route("/api/disruptions/{id}", get(rest::get_disruption))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type ApiResponse = (StatusCode, Json<serde_json::Value>);

fn error_response(err: &Error) -> ApiResponse {
    let status = match err {
        Error::Storage(e) => storage_status(e),
        Error::Lifecycle(_) | Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::Llm(_) | Error::Recommendation(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(serde_json::json!({"error": err.to_string()})))
}

fn storage_status(err: &StorageError) -> StatusCode {
    match err {
        StorageError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    }
}
