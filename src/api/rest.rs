//! REST endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{ApiResponse, AppState, error_response, storage_status};
use crate::disruption::DisruptionEvent;
use crate::entities::{JobPatch, JobStatus, NewJob, SortKey};
use crate::error::Error;

fn bad_request(message: impl Into<String>) -> ApiResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": message.into()})),
    )
}

// ── Health ──────────────────────────────────────────────────────────────

pub(super) async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "floor-control"
    }))
}

// ── Dashboard ───────────────────────────────────────────────────────────

pub(super) async fn dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.session.snapshot().await;
    let alerts = state.session.alert_list().await;
    Json(serde_json::json!({
        "kpis": snapshot.kpis,
        "alerts": alerts,
        "optimizing": state.orchestrator.is_optimizing(),
        "loaded_at": snapshot.loaded_at,
    }))
}

// ── Jobs ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(super) struct JobListQuery {
    sort: Option<String>,
    limit: Option<usize>,
}

/// Without query parameters this is the session's job list, including any
/// optimistic changes. With `sort` or `limit` it reads the store directly.
pub(super) async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> ApiResponse {
    if query.sort.is_none() && query.limit.is_none() {
        return (
            StatusCode::OK,
            Json(serde_json::json!(state.session.jobs().await)),
        );
    }

    let sort = match query.sort.as_deref().map(str::parse::<SortKey>) {
        None => SortKey::CreatedDesc,
        Some(Ok(sort)) => sort,
        Some(Err(e)) => return bad_request(e),
    };

    match state.session.store().list_jobs(sort, query.limit).await {
        Ok(jobs) => (StatusCode::OK, Json(serde_json::json!(jobs))),
        Err(e) => {
            warn!(error = %e, "Job listing failed");
            (
                storage_status(&e),
                Json(serde_json::json!({"error": e.to_string()})),
            )
        }
    }
}

pub(super) async fn create_job(
    State(state): State<AppState>,
    Json(body): Json<NewJob>,
) -> ApiResponse {
    match state.session.create_job(body).await {
        Ok(job) => (StatusCode::CREATED, Json(serde_json::json!(job))),
        Err(e) => error_response(&e),
    }
}

pub(super) async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<JobPatch>,
) -> ApiResponse {
    match state.session.update_job(&id, patch).await {
        Ok(job) => (StatusCode::OK, Json(serde_json::json!(job))),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct StatusRequest {
    status: JobStatus,
}

pub(super) async fn transition_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> ApiResponse {
    match state.session.transition_job(&id, body.status).await {
        Ok(job) => (StatusCode::OK, Json(serde_json::json!(job))),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ReassignRequest {
    /// Source machine. Defaults to the job's current assignment.
    from: Option<String>,
    to: String,
}

pub(super) async fn reassign_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ReassignRequest>,
) -> ApiResponse {
    if body.to.trim().is_empty() {
        return bad_request("Destination machine is required");
    }

    let from = match body.from {
        Some(from) => from,
        None => state
            .session
            .jobs()
            .await
            .into_iter()
            .find(|j| j.id == id)
            .and_then(|j| j.assigned_machine)
            .unwrap_or_default(),
    };

    match state.reassigner.reassign(&id, &from, &body.to).await {
        Ok(outcome) => (StatusCode::OK, Json(serde_json::json!(outcome))),
        Err(e) => error_response(&Error::Storage(e)),
    }
}

// ── Machines / workers ──────────────────────────────────────────────────

pub(super) async fn list_machines(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session.machines().await)
}

pub(super) async fn list_workers(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session.workers().await)
}

// ── Analytics ───────────────────────────────────────────────────────────

pub(super) async fn analytics(State(state): State<AppState>) -> ApiResponse {
    match state.session.analytics().await {
        Ok(analytics) => (StatusCode::OK, Json(serde_json::json!(analytics))),
        Err(e) => error_response(&Error::Storage(e)),
    }
}

// ── Disruptions ─────────────────────────────────────────────────────────

pub(super) async fn report_disruption(
    State(state): State<AppState>,
    Json(event): Json<DisruptionEvent>,
) -> ApiResponse {
    if event.kind.trim().is_empty() || event.resource.trim().is_empty() {
        return bad_request("Disruption type and resource are required");
    }

    let ticket = state.orchestrator.handle(event).await;
    info!(disruption_id = %ticket.id, "Disruption accepted");
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "id": ticket.id,
            "optimizing": state.orchestrator.is_optimizing(),
        })),
    )
}

pub(super) async fn list_disruptions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.orchestrator.list().await)
}

pub(super) async fn get_disruption(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResponse {
    let disruption_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => return bad_request("Invalid disruption ID"),
    };

    match state.orchestrator.get(disruption_id).await {
        Some(record) => (StatusCode::OK, Json(serde_json::json!(record))),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Disruption not found"})),
        ),
    }
}
