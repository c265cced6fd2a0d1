mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use common::RecordingNotifier;
use interval_timer::{
    api::create_router,
    clock::SystemClock,
    config::EngineConfig,
    engine::spawn_engine,
    services::MemoryStore,
    state::AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let timer = spawn_engine(
        EngineConfig::default(),
        Arc::new(SystemClock::new()),
        Arc::new(RecordingNotifier::new()),
        Arc::new(MemoryStore::new()),
    );
    let state = Arc::new(AppState::new(timer, 20554, "127.0.0.1".to_string()));
    create_router(state)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test(start_paused = true)]
async fn start_returns_running_snapshot() {
    let app = app();

    let (status, body) = call(&app, "POST", "/start", Some(json!({ "minutes": 30 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
    assert_eq!(body["timer"]["remaining_ms"], 1_800_000);
    assert_eq!(body["timer"]["duration_ms"], 1_800_000);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_duration_is_unprocessable() {
    let app = app();

    let (status, body) = call(&app, "POST", "/start", Some(json!({ "minutes": 2 }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");

    let (_, status_body) = call(&app, "GET", "/status", None).await;
    assert_eq!(status_body["timer"]["status"], "idle");
    assert_eq!(status_body["last_action"], Value::Null);
}

#[tokio::test(start_paused = true)]
async fn second_start_conflicts() {
    let app = app();

    call(&app, "POST", "/start", Some(json!({ "minutes": 10 }))).await;
    let (status, _) = call(&app, "POST", "/start", Some(json!({ "minutes": 10 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test(start_paused = true)]
async fn pause_is_reflected_in_status() {
    let app = app();

    call(&app, "POST", "/start", Some(json!({ "minutes": 10 }))).await;
    tokio::time::sleep(std::time::Duration::from_secs(30)).await;

    let (status, body) = call(&app, "POST", "/pause", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paused");
    assert_eq!(body["timer"]["elapsed_seconds"], 30);

    let (_, status_body) = call(&app, "GET", "/status", None).await;
    assert_eq!(status_body["timer"]["status"], "paused");
    assert_eq!(status_body["last_action"], "pause");
    assert_eq!(status_body["port"], 20554);
}

#[tokio::test(start_paused = true)]
async fn end_returns_to_idle() {
    let app = app();

    call(&app, "POST", "/start", Some(json!({ "minutes": 5 }))).await;
    let (status, body) = call(&app, "POST", "/end", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "idle");
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app();

    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
