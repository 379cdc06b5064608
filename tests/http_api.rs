//! End-to-end tests for the task API, driven through the router with a stub generator

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tower::ServiceExt;

use tokenrelay::config::{RelayConfig, ServerConfig};
use tokenrelay::engine::{StubGenerator, TextGenerator, TokenCallback};
use tokenrelay::server::{router, AppState};
use tokenrelay::tasks::TaskStatus;

fn app_with(generator: Arc<dyn TextGenerator>) -> (Router, Arc<AppState>) {
    let mut config = RelayConfig::default();
    config.tasks.poll_interval_ms = 10;
    let state = Arc::new(AppState::new(generator, &config));
    (router(Arc::clone(&state), &ServerConfig::default()), state)
}

fn scripted(tokens: &[&str]) -> (Router, Arc<AppState>) {
    app_with(Arc::new(StubGenerator::scripted(tokens.iter().copied())))
}

async fn submit(app: &Router, body: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::post("/generate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response.into_body()).await;
    json["task_id"].as_str().unwrap().to_string()
}

async fn body_bytes(body: Body) -> Vec<u8> {
    tokio::time::timeout(Duration::from_secs(10), body.collect())
        .await
        .expect("body did not finish")
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn body_json(body: Body) -> Value {
    serde_json::from_slice(&body_bytes(body).await).unwrap()
}

async fn get(app: &Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn read_stream(app: &Router, task_id: &str) -> String {
    let response = get(app, &format!("/stream/{}", task_id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    String::from_utf8(body_bytes(response.into_body()).await).unwrap()
}

async fn wait_for_status(app: &Router, task_id: &str, expected: &str) -> Value {
    for _ in 0..200 {
        let response = get(app, &format!("/tasks/{}", task_id)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response.into_body()).await;
        if json["status"] == expected {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {} never reached status {}", task_id, expected);
}

struct FailingGenerator;

impl TextGenerator for FailingGenerator {
    fn generate(&self, _prompt: &str, callbacks: &[&dyn TokenCallback]) -> anyhow::Result<()> {
        for callback in callbacks {
            callback.on_new_token("partial");
        }
        anyhow::bail!("out of memory")
    }
}

/// Emits "first", blocks until released, then emits "second"
#[derive(Default)]
struct GatedGenerator {
    released: Mutex<bool>,
    gate: Condvar,
}

impl GatedGenerator {
    fn release(&self) {
        *self.released.lock().unwrap() = true;
        self.gate.notify_all();
    }
}

impl TextGenerator for GatedGenerator {
    fn generate(&self, _prompt: &str, callbacks: &[&dyn TokenCallback]) -> anyhow::Result<()> {
        for callback in callbacks {
            callback.on_new_token("first");
        }

        let released = self.released.lock().unwrap();
        let (released, _) = self
            .gate
            .wait_timeout_while(released, Duration::from_secs(10), |released| !*released)
            .unwrap();
        anyhow::ensure!(*released, "gate never opened");
        drop(released);

        for callback in callbacks {
            callback.on_new_token("second");
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_health() {
    let (app, _) = scripted(&[]);
    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response.into_body()).await, b"OK");
}

#[tokio::test]
async fn test_generate_returns_distinct_ids() {
    let (app, state) = scripted(&["x"]);
    let first = submit(&app, r#"{"description": "sort a list"}"#).await;
    let second = submit(&app, r#"{"description": "sort a list"}"#).await;

    assert_ne!(first, second);
    assert!(first.parse::<uuid::Uuid>().is_ok());
    assert_eq!(state.registry.len().await, 2);
}

#[tokio::test]
async fn test_generate_accepts_missing_description() {
    let (app, _) = scripted(&["ok"]);
    let task_id = submit(&app, "{}").await;
    let body = read_stream(&app, &task_id).await;
    assert_eq!(body, "data: ok\n\nevent: done\ndata: [DONE]\n\n");
}

#[tokio::test]
async fn test_stream_relays_tokens_then_done() {
    let (app, _) = scripted(&["fn", " main", "()", " {}"]);
    let task_id = submit(&app, r#"{"description": "an empty program"}"#).await;

    let body = read_stream(&app, &task_id).await;
    assert_eq!(
        body,
        "data: fn\n\ndata:  main\n\ndata: ()\n\ndata:  {}\n\nevent: done\ndata: [DONE]\n\n"
    );
}

#[tokio::test]
async fn test_stream_after_generation_finished() {
    let (app, _) = scripted(&["a", "b"]);
    let task_id = submit(&app, r#"{"description": "x"}"#).await;

    let status = wait_for_status(&app, &task_id, "completed").await;
    assert_eq!(status["tokens_generated"], 2);
    assert_eq!(status["tokens_pending"], 2);

    let body = read_stream(&app, &task_id).await;
    assert_eq!(body, "data: a\n\ndata: b\n\nevent: done\ndata: [DONE]\n\n");
}

#[tokio::test]
async fn test_multiline_token_splits_into_data_lines() {
    let (app, _) = scripted(&["line one\nline two"]);
    let task_id = submit(&app, r#"{"description": "x"}"#).await;

    let body = read_stream(&app, &task_id).await;
    assert!(body.starts_with("data: line one\ndata: line two\n\n"));
}

#[tokio::test]
async fn test_unknown_task_is_404() {
    let (app, _) = scripted(&[]);
    let response = get(&app, "/stream/00000000-0000-4000-8000-000000000000").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response.into_body()).await;
    assert_eq!(json["error"]["type"], "not_found");
}

#[tokio::test]
async fn test_malformed_task_id_is_404() {
    let (app, _) = scripted(&[]);
    for uri in ["/stream/not-a-uuid", "/tasks/not-a-uuid"] {
        let response = get(&app, uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn test_consumed_task_is_evicted() {
    let (app, state) = scripted(&["only"]);
    let task_id = submit(&app, r#"{"description": "x"}"#).await;

    read_stream(&app, &task_id).await;

    assert!(state.registry.is_empty().await);
    let response = get(&app, &format!("/stream/{}", task_id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_generation_ends_with_error_event() {
    let (app, _) = app_with(Arc::new(FailingGenerator));
    let task_id = submit(&app, r#"{"description": "x"}"#).await;

    let status = wait_for_status(&app, &task_id, "failed").await;
    assert_eq!(status["error"], "out of memory");

    let body = read_stream(&app, &task_id).await;
    assert_eq!(body, "data: partial\n\nevent: error\ndata: out of memory\n\n");
}

#[tokio::test]
async fn test_tokens_stream_while_generation_runs() {
    let generator = Arc::new(GatedGenerator::default());
    let (app, _) = app_with(Arc::clone(&generator) as Arc<dyn TextGenerator>);

    // The generator is blocked, so only a non-blocking submit returns here.
    let task_id = tokio::time::timeout(
        Duration::from_secs(2),
        submit(&app, r#"{"description": "x"}"#),
    )
    .await
    .expect("generate waited for generation");

    let mut status = Value::Null;
    for _ in 0..200 {
        let response = get(&app, &format!("/tasks/{}", task_id)).await;
        status = body_json(response.into_body()).await;
        if status["tokens_generated"] == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status["status"], "running");
    assert_eq!(status["tokens_generated"], 1);

    let response = get(&app, &format!("/stream/{}", task_id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut frames = response.into_body().into_data_stream();

    let first = tokio::time::timeout(Duration::from_secs(5), frames.next())
        .await
        .expect("first frame not relayed while generation was blocked")
        .unwrap()
        .unwrap();
    assert_eq!(&first[..], b"data: first\n\n");

    generator.release();

    let mut rest = Vec::new();
    while let Some(frame) = tokio::time::timeout(Duration::from_secs(5), frames.next())
        .await
        .expect("stream did not finish")
    {
        rest.extend_from_slice(&frame.unwrap());
    }
    assert_eq!(
        String::from_utf8(rest).unwrap(),
        "data: second\n\nevent: done\ndata: [DONE]\n\n"
    );
}

#[tokio::test]
async fn test_cancel_task() {
    let tokens: Vec<String> = (0..1000).map(|i| format!("t{} ", i)).collect();
    let generator = StubGenerator::scripted(tokens).with_delay(Duration::from_millis(5));
    let (app, state) = app_with(Arc::new(generator));
    let task_id = submit(&app, r#"{"description": "x"}"#).await;
    let (_, entry) = state.registry.lookup(&task_id).await.unwrap();
    for _ in 0..200 {
        if entry.buffer.total_tokens() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(entry.buffer.total_tokens() > 0, "generation never started");
    assert_eq!(state.generation_slots.available_permits(), 0);

    let response = app
        .clone()
        .oneshot(
            Request::delete(format!("/tasks/{}", task_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(state.registry.is_empty().await);

    // The full script takes 5 s; the slot comes back long before that once
    // the generator sees the cancellation.
    assert_eq!(entry.buffer.status(), TaskStatus::Cancelled);
    let mut freed = false;
    for _ in 0..100 {
        if state.generation_slots.available_permits() == 1 {
            freed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(freed, "generation kept running after cancel");
    assert!(entry.buffer.total_tokens() < 100);

    let response = get(&app, &format!("/stream/{}", task_id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(
            Request::delete(format!("/tasks/{}", task_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_echo_backend_streams_prompt() {
    let mut config = RelayConfig::default();
    config.tasks.poll_interval_ms = 10;
    let generator = Arc::new(StubGenerator::echo(Duration::ZERO));
    let state = Arc::new(AppState::new(generator, &config));
    let app = router(state, &ServerConfig::default());

    let task_id = submit(&app, r#"{"description": "print hello"}"#).await;
    let body = read_stream(&app, &task_id).await;
    assert_eq!(body, "data: print\n\ndata:  hello\n\nevent: done\ndata: [DONE]\n\n");
}
