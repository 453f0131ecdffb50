#![allow(missing_docs)]
//! HTTP integration tests: validation (400), routing, polling flow.
//! Uses mock pipelines so no interpreter or network is required.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use research_gateway::{AppState, router};
use research_jobs::{JobRunner, JobStore, JobStoreConfig, ResearchPipeline};

struct MockPipeline {
    delay: Duration,
    error: Option<String>,
}

impl MockPipeline {
    fn success(delay: Duration) -> Self {
        Self { delay, error: None }
    }

    fn failure(delay: Duration, error: &str) -> Self {
        Self {
            delay,
            error: Some(error.to_string()),
        }
    }
}

#[async_trait]
impl ResearchPipeline for MockPipeline {
    async fn run(&self, input_key: &str, _job_id: &str) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        match &self.error {
            Some(error) => Err(anyhow::anyhow!(error.clone())),
            None => Ok(format!("report for {input_key}")),
        }
    }
}

fn app_with(pipeline: MockPipeline, deadline: Duration) -> (Router, Arc<JobStore>) {
    let store = Arc::new(JobStore::new(JobStoreConfig::default()));
    let runner = Arc::new(JobRunner::new(
        Arc::clone(&store),
        Arc::new(pipeline),
        deadline,
    ));
    (
        router(AppState {
            store: Arc::clone(&store),
            runner,
        }),
        store,
    )
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

async fn submit(app: &Router, input_key: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::post("/jobs")
                .header("content-type", "application/json")
                .body(Body::from(format!("{{\"input_key\":\"{input_key}\"}}")))
                .expect("request"),
        )
        .await
        .expect("response")
}

async fn get(app: &Router, path: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::get(path).body(Body::empty()).expect("request"))
        .await
        .expect("response")
}

async fn poll_until_state(app: &Router, job_id: &str, state: &str) -> Value {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let response = get(app, &format!("/jobs/{job_id}/status")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        if payload.get("state").and_then(Value::as_str) == Some(state) {
            return payload;
        }
        assert!(
            Instant::now() < deadline,
            "job never reached state {state}: {payload}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn health_is_ok_without_store_access() {
    let (app, _store) = app_with(
        MockPipeline::success(Duration::from_millis(10)),
        Duration::from_secs(5),
    );
    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    assert_eq!(payload.get("status").and_then(Value::as_str), Some("ok"));
}

#[tokio::test]
async fn empty_input_key_is_400_and_creates_no_job() {
    let (app, store) = app_with(
        MockPipeline::success(Duration::from_millis(10)),
        Duration::from_secs(5),
    );

    let response = submit(&app, "").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = json_body(response).await;
    assert!(
        payload
            .get("error")
            .and_then(Value::as_str)
            .is_some_and(|e| e.contains("input_key"))
    );

    // Whitespace-only keys are empty after trimming.
    let response = submit(&app, "   ").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(store.metrics().await.total_jobs, 0);
}

#[tokio::test]
async fn unknown_id_is_404_for_status_and_result() {
    let (app, _store) = app_with(
        MockPipeline::success(Duration::from_millis(10)),
        Duration::from_secs(5),
    );

    for path in ["/jobs/no-such-job/status", "/jobs/no-such-job/result"] {
        let response = get(&app, path).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
        let payload = json_body(response).await;
        assert!(payload.get("error").is_some());
    }
}

#[tokio::test]
async fn submit_poll_and_fetch_result_flow() {
    let (app, _store) = app_with(
        MockPipeline::success(Duration::from_millis(30)),
        Duration::from_secs(5),
    );

    let response = submit(&app, "Metformin").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = json_body(response).await;
    let job_id = payload
        .get("job_id")
        .and_then(Value::as_str)
        .expect("job_id in response")
        .to_string();

    // An immediate poll sees the job, pending or running, never terminal.
    let response = get(&app, &format!("/jobs/{job_id}/status")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let early = json_body(response).await;
    let early_state = early.get("state").and_then(Value::as_str).expect("state");
    assert!(matches!(early_state, "pending" | "running"), "{early_state}");
    assert!(early.get("result").is_none());

    let done = poll_until_state(&app, &job_id, "complete").await;
    assert_eq!(done.get("input_key").and_then(Value::as_str), Some("Metformin"));
    assert_eq!(
        done.get("result").and_then(Value::as_str),
        Some("report for Metformin")
    );
    assert!(done.get("error").is_none());
    assert!(done.get("elapsed_seconds").and_then(Value::as_u64).is_some());

    let response = get(&app, &format!("/jobs/{job_id}/result")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let result = json_body(response).await;
    assert_eq!(result.get("job_id").and_then(Value::as_str), Some(job_id.as_str()));
    assert_eq!(
        result.get("result").and_then(Value::as_str),
        Some("report for Metformin")
    );
}

#[tokio::test]
async fn result_before_completion_is_400_with_state() {
    let (app, _store) = app_with(
        MockPipeline::success(Duration::from_secs(30)),
        Duration::from_secs(60),
    );

    let response = submit(&app, "Metformin").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let job_id = json_body(response)
        .await
        .get("job_id")
        .and_then(Value::as_str)
        .expect("job_id")
        .to_string();

    let response = get(&app, &format!("/jobs/{job_id}/result")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = json_body(response).await;
    assert!(
        payload
            .get("error")
            .and_then(Value::as_str)
            .is_some_and(|e| e.contains("not complete"))
    );
    assert!(payload.get("state").is_some());
}

#[tokio::test]
async fn pipeline_failure_surfaces_as_error_state() {
    let (app, _store) = app_with(
        MockPipeline::failure(Duration::from_millis(10), "scrape blocked"),
        Duration::from_secs(5),
    );

    let response = submit(&app, "Metformin").await;
    let job_id = json_body(response)
        .await
        .get("job_id")
        .and_then(Value::as_str)
        .expect("job_id")
        .to_string();

    let done = poll_until_state(&app, &job_id, "error").await;
    assert!(
        done.get("error")
            .and_then(Value::as_str)
            .is_some_and(|e| e.contains("scrape blocked"))
    );
    assert!(done.get("result").is_none());
}

#[tokio::test]
async fn deadline_overrun_surfaces_timeout_error() {
    let (app, _store) = app_with(
        MockPipeline::success(Duration::from_secs(60)),
        Duration::from_millis(50),
    );

    let response = submit(&app, "Metformin").await;
    let job_id = json_body(response)
        .await
        .get("job_id")
        .and_then(Value::as_str)
        .expect("job_id")
        .to_string();

    let done = poll_until_state(&app, &job_id, "error").await;
    assert!(
        done.get("error")
            .and_then(Value::as_str)
            .is_some_and(|e| e.contains("timeout"))
    );
}

#[tokio::test]
async fn concurrent_submissions_get_distinct_ids_and_all_finish() {
    let (app, _store) = app_with(
        MockPipeline::success(Duration::from_millis(20)),
        Duration::from_secs(5),
    );

    let mut job_ids = Vec::new();
    for i in 0..6 {
        let response = submit(&app, &format!("molecule-{i}")).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let job_id = json_body(response)
            .await
            .get("job_id")
            .and_then(Value::as_str)
            .expect("job_id")
            .to_string();
        assert!(!job_ids.contains(&job_id), "duplicate job id");
        job_ids.push(job_id);
    }

    for (i, job_id) in job_ids.iter().enumerate() {
        let done = poll_until_state(&app, job_id, "complete").await;
        assert_eq!(
            done.get("result").and_then(Value::as_str),
            Some(format!("report for molecule-{i}").as_str())
        );
    }
}

#[tokio::test]
async fn capacity_overflow_is_503() {
    let store = Arc::new(JobStore::new(JobStoreConfig {
        max_in_flight: 1,
        ..JobStoreConfig::default()
    }));
    let runner = Arc::new(JobRunner::new(
        Arc::clone(&store),
        Arc::new(MockPipeline::success(Duration::from_secs(30))),
        Duration::from_secs(60),
    ));
    let app = router(AppState {
        store: Arc::clone(&store),
        runner,
    });

    let response = submit(&app, "first").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = submit(&app, "second").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let payload = json_body(response).await;
    assert!(
        payload
            .get("error")
            .and_then(Value::as_str)
            .is_some_and(|e| e.contains("too many jobs"))
    );
}

#[tokio::test]
async fn metrics_endpoint_reports_counts_and_health() {
    let (app, _store) = app_with(
        MockPipeline::success(Duration::from_millis(10)),
        Duration::from_secs(5),
    );

    let response = submit(&app, "Metformin").await;
    let job_id = json_body(response)
        .await
        .get("job_id")
        .and_then(Value::as_str)
        .expect("job_id")
        .to_string();
    poll_until_state(&app, &job_id, "complete").await;

    let response = get(&app, "/jobs").await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    assert_eq!(payload.get("total_jobs").and_then(Value::as_u64), Some(1));
    assert_eq!(payload.get("complete").and_then(Value::as_u64), Some(1));
    assert_eq!(
        payload.get("health").and_then(Value::as_str),
        Some("healthy")
    );
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (app, _store) = app_with(
        MockPipeline::success(Duration::from_millis(10)),
        Duration::from_secs(5),
    );
    let response = get(&app, "/unknown").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
