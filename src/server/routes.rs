//! HTTP routes for the orchestration API.
//!
//! | Method | Path                            | Response                              |
//! |--------|---------------------------------|---------------------------------------|
//! | POST   | `/orchestrate`                  | `202 {taskId}` / `400`                |
//! | GET    | `/orchestrate/{taskId}/progress`| `200 ProgressSnapshot` / `404`        |
//! | GET    | `/orchestrate/{taskId}/result`  | `200` / `202 {status}` / `500` / `404`|
//! | DELETE | `/orchestrate/{taskId}`         | `204` / `404`                         |
//! | GET    | `/health`                       | `200 {status: "ok"}`                  |

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use super::params::{Accepted, ErrorBody, OrchestrateParams, Pending};
use super::registry::{CallRegistry, CallStatus};
use crate::agent::orchestrator::Orchestrator;
use crate::error::OrchestrationError;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Runs the calls.
    pub orchestrator: Arc<Orchestrator>,
    /// Tracks them.
    pub registry: Arc<CallRegistry>,
}

/// Builds the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/orchestrate", post(orchestrate))
        .route("/orchestrate/{task_id}", axum::routing::delete(cancel))
        .route("/orchestrate/{task_id}/progress", get(progress))
        .route("/orchestrate/{task_id}/result", get(result))
        .with_state(state)
}

fn error(status: StatusCode, error: &str, reason: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
            reason: reason.into(),
        }),
    )
        .into_response()
}

fn not_found(id: Uuid) -> Response {
    error(StatusCode::NOT_FOUND, "NotFound", format!("unknown task id {id}"))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn orchestrate(State(state): State<AppState>, Json(params): Json<OrchestrateParams>) -> Response {
    let req = params.into_request();
    if let Err(e) = state.orchestrator.validate(&req) {
        return error(StatusCode::BAD_REQUEST, e.kind(), e.to_string());
    }
    let task_id = state.registry.start(Arc::clone(&state.orchestrator), req);
    (StatusCode::ACCEPTED, Json(Accepted { task_id })).into_response()
}

async fn progress(State(state): State<AppState>, Path(task_id): Path<Uuid>) -> Response {
    state
        .registry
        .progress(task_id)
        .map_or_else(|| not_found(task_id), |snapshot| Json(snapshot).into_response())
}

async fn result(State(state): State<AppState>, Path(task_id): Path<Uuid>) -> Response {
    match state.registry.status(task_id) {
        None => not_found(task_id),
        Some(CallStatus::Pending) => {
            (StatusCode::ACCEPTED, Json(Pending { status: "pending" })).into_response()
        }
        Some(CallStatus::Finished(Ok(result))) => Json(result).into_response(),
        Some(CallStatus::Finished(Err(e))) => {
            let status = match e {
                OrchestrationError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
                OrchestrationError::AllAgentsFailed { .. } => {
                    warn!(task_id = %task_id, error = %e, "orchestration failed");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            error(status, e.kind(), e.to_string())
        }
    }
}

async fn cancel(State(state): State<AppState>, Path(task_id): Path<Uuid>) -> Response {
    if state.registry.cancel(task_id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        not_found(task_id)
    }
}
