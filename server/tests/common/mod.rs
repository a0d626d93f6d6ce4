#![allow(dead_code)]

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use job_engine::{JobSettings, WorkerConfig};
use serde_json::Value;
use server::config::ServerConfig;
use server::state::{AppState, JobStatus};
use server::build_app;
use tempfile::TempDir;
use tower::ServiceExt;

/// Worker script that writes `fake-pdf` to the path given as its last argument.
pub const WRITES_ARTIFACT: &str =
    "for out; do :; done; echo PROGRESS:50; printf fake-pdf > \"$out\"";

/// Build a test `ServerConfig` whose worker runs `script` with `sh -c`.
pub fn test_config(script: &str, dir: &TempDir) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![],
        worker: WorkerConfig {
            program: "sh".to_string(),
            leading_args: vec!["-c".to_string(), script.to_string(), "worker".to_string()],
            timeout: Some(Duration::from_secs(10)),
        },
        jobs: JobSettings {
            artifact_dir: dir.path().to_path_buf(),
            ..JobSettings::default()
        },
        result_ttl: Duration::from_secs(60),
    }
}

/// Build the full router plus its state for a worker running `script`.
pub fn build_test_app(script: &str) -> (Router, AppState, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(script, &dir);
    let state = AppState::new(&config);
    let app = build_app(state.clone(), &config);
    (app, state, dir)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_form(app: &Router, uri: &str, body: &str) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll `/api/jobs/{id}` until it stops answering 202.
pub async fn wait_for_result(app: &Router, job_id: &str) -> (StatusCode, Value) {
    for _ in 0..100 {
        let response = get(app, &format!("/api/jobs/{job_id}")).await;
        if response.status() != StatusCode::ACCEPTED {
            let status = response.status();
            return (status, body_json(response).await);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("job {job_id} did not finish in time");
}

/// Wait until the job's result has been recorded, without collecting it.
pub async fn wait_for_finished(state: &AppState, job_id: &str) {
    for _ in 0..100 {
        let finished = state
            .jobs
            .get(job_id)
            .is_some_and(|entry| matches!(*entry, JobStatus::Finished { .. }));
        if finished {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("job {job_id} was not recorded as finished in time");
}
