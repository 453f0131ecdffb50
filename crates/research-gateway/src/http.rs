//! Axum routes: POST /jobs, GET /jobs/{id}/status|result, GET /jobs, GET /health.
//!
//! Request validation (400 for an empty input key, no job created), 404 for
//! unknown ids, 400 for a result read before completion. Submission returns
//! as soon as the record is inserted and the runner task is spawned; status
//! and result reads never wait on execution.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use research_jobs::{JobError, JobHealthState, JobRunner, JobState, JobStore};

/// Shared state for the HTTP server: the job table and the runner that
/// executes submissions.
#[derive(Clone)]
pub struct AppState {
    /// Authoritative job table; all reads go here.
    pub store: Arc<JobStore>,
    /// Spawns deadline-bounded pipeline executions.
    pub runner: Arc<JobRunner>,
}

/// Request body for POST /jobs.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// Work identifier, e.g. a molecule name.
    pub input_key: String,
}

/// Response body for a successful submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    /// Handle for status and result polling.
    pub job_id: String,
}

/// JSON error payload for every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable description.
    pub error: String,
    /// Current job state, included when it explains the rejection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<JobState>,
}

/// Response body for GET /jobs/{id}/status.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Job handle (echo of the path id).
    pub job_id: String,
    /// Caller-supplied work identifier.
    pub input_key: String,
    /// Lifecycle state at read time.
    pub state: JobState,
    /// Seconds since submission.
    pub elapsed_seconds: u64,
    /// Report text, present iff state is `complete`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Failure description, present iff state is `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response body for GET /jobs/{id}/result.
#[derive(Debug, Serialize)]
pub struct ResultResponse {
    /// Job handle.
    pub job_id: String,
    /// Caller-supplied work identifier.
    pub input_key: String,
    /// The final report.
    pub result: String,
}

/// Response body for GET /jobs (table overview).
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    /// Records currently tracked.
    pub total_jobs: usize,
    /// Count by state.
    pub pending: usize,
    /// Count by state.
    pub running: usize,
    /// Count by state.
    pub complete: usize,
    /// Count by state.
    pub errored: usize,
    /// Age of the oldest pending job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_pending_age_secs: Option<u64>,
    /// Age of the longest-running job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longest_running_age_secs: Option<u64>,
    /// Health classified from age thresholds.
    pub health: JobHealthState,
}

/// Trim and reject an empty input key; no job is created on rejection.
pub fn validate_input_key(raw: &str) -> Result<String, (StatusCode, Json<ErrorBody>)> {
    let input_key = raw.trim().to_string();
    if input_key.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "input_key must be non-empty".to_string(),
                state: None,
            }),
        ));
    }
    Ok(input_key)
}

fn error_response(error: &JobError) -> (StatusCode, Json<ErrorBody>) {
    let status = match error {
        JobError::NotFound(_) => StatusCode::NOT_FOUND,
        JobError::NotReady { .. } => StatusCode::BAD_REQUEST,
        JobError::Capacity { .. } => StatusCode::SERVICE_UNAVAILABLE,
        // Should not reach the HTTP layer under single-writer-per-job
        // discipline; reported rather than swallowed if it ever does.
        JobError::InvalidTransition { .. } => StatusCode::CONFLICT,
    };
    let state = match error {
        JobError::NotReady { state } => Some(*state),
        _ => None,
    };
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
            state,
        }),
    )
}

async fn handle_submit(
    State(state): State<AppState>,
    Json(body): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), (StatusCode, Json<ErrorBody>)> {
    let input_key = validate_input_key(&body.input_key)?;
    let job_id = state
        .store
        .create(&input_key)
        .await
        .map_err(|e| error_response(&e))?;
    state.runner.launch(job_id.clone(), input_key);
    Ok((StatusCode::CREATED, Json(SubmitResponse { job_id })))
}

async fn handle_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<StatusResponse>, (StatusCode, Json<ErrorBody>)> {
    let snapshot = state
        .store
        .get(&job_id)
        .await
        .map_err(|e| error_response(&e))?;
    Ok(Json(StatusResponse {
        job_id: snapshot.job_id,
        input_key: snapshot.input_key,
        state: snapshot.state,
        elapsed_seconds: snapshot.elapsed_secs,
        result: snapshot.result,
        error: snapshot.error,
    }))
}

async fn handle_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<ResultResponse>, (StatusCode, Json<ErrorBody>)> {
    let snapshot = state
        .store
        .get(&job_id)
        .await
        .map_err(|e| error_response(&e))?;
    if snapshot.state != JobState::Complete {
        return Err(error_response(&JobError::NotReady {
            state: snapshot.state,
        }));
    }
    Ok(Json(ResultResponse {
        job_id: snapshot.job_id,
        input_key: snapshot.input_key,
        result: snapshot.result.unwrap_or_default(),
    }))
}

async fn handle_metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    let metrics = state.store.metrics().await;
    Json(MetricsResponse {
        total_jobs: metrics.total_jobs,
        pending: metrics.pending,
        running: metrics.running,
        complete: metrics.complete,
        errored: metrics.errored,
        oldest_pending_age_secs: metrics.oldest_pending_age_secs,
        longest_running_age_secs: metrics.longest_running_age_secs,
        health: metrics.health_state,
    })
}

async fn handle_health() -> Json<serde_json::Value> {
    // Constant-time liveness probe, no store dependency.
    Json(serde_json::json!({ "status": "ok" }))
}

/// Build the service router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/jobs", post(handle_submit).get(handle_metrics))
        .route("/jobs/{id}/status", get(handle_status))
        .route("/jobs/{id}/result", get(handle_result))
        .with_state(state)
}

/// Run the HTTP server; binds to `bind_addr` (e.g. `0.0.0.0:8080`).
/// Graceful shutdown on Ctrl+C (SIGINT) and SIGTERM (Unix); in-flight
/// requests complete before exit.
pub async fn run_http(state: AppState, bind_addr: &str) -> Result<()> {
    let deadline_secs = state.runner.deadline().as_secs();
    let app = router(state);
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(
        "gateway listening on {} (job_deadline={}s, Ctrl+C/SIGTERM to stop)",
        bind_addr,
        deadline_secs
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let ctrl_c = tokio::signal::ctrl_c();
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to listen for SIGTERM");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for Ctrl+C");
    }
}
