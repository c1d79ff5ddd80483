//! Integration tests for the sync HTTP API
//!
//! Requests go through the full router (tracing and CORS layers included)
//! with `tower::ServiceExt::oneshot`; no socket is opened.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use common::{settle, start, test_config, ScriptedService, TestPipeline};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use sublime_sync::api::{create_router, AppState};
use sublime_sync::audio::object_url::id_of;
use sublime_sync::audio::HandleId;
use tower::ServiceExt;

fn setup(themes: &[&str]) -> (Router, TestPipeline) {
    let service = Arc::new(ScriptedService::default());
    service.push_themes(themes);
    let pipeline = start(&test_config(), service.clone());
    let app = create_router(AppState {
        pipeline: pipeline.handle.clone(),
        service,
    });
    (app, pipeline)
}

async fn send(
    app: &Router,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(path);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn send_json(
    app: &Router,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, path, body).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let (app, _pipeline) = setup(&[]);
    let (status, body) = send_json(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "sublime-sync");
}

#[tokio::test(start_paused = true)]
async fn test_status_follows_session() {
    let (app, _pipeline) = setup(&["c1", "c2"]);

    let (status, body) = send_json(&app, Method::GET, "/api/v1/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");
    assert_eq!(body["api_calls"], 0);

    let (status, body) = send_json(&app, Method::POST, "/api/v1/enable", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "enabled");
    settle(10).await;

    let (_, body) = send_json(&app, Method::GET, "/api/v1/status", None).await;
    assert_eq!(body["state"], "playing");
    assert_eq!(body["current"]["content_id"], "c1");
    assert_eq!(body["next"]["status"], "ready");
    assert_eq!(body["api_calls"], 2);
    assert_eq!(body["live_object_urls"], 2);
    assert!(body["impact"]["co2_grams"].as_f64().unwrap() > 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_enable_after_disable_conflicts() {
    let (app, _pipeline) = setup(&["c1", "c2"]);

    send(&app, Method::POST, "/api/v1/enable", None).await;
    settle(10).await;
    let (status, body) = send_json(&app, Method::POST, "/api/v1/disable", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "disabled");

    let (status, body) = send_json(&app, Method::POST, "/api/v1/enable", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("disposed"));
}

#[tokio::test(start_paused = true)]
async fn test_skip_reports_whether_promoted() {
    let (app, _pipeline) = setup(&["c1", "c2"]);
    send(&app, Method::POST, "/api/v1/enable", None).await;
    settle(10).await;

    let (status, body) = send_json(&app, Method::POST, "/api/v1/skip", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["promoted"], true);

    // Nothing prefetched after c2
    let (_, body) = send_json(&app, Method::POST, "/api/v1/skip", None).await;
    assert_eq!(body["promoted"], false);
}

#[tokio::test]
async fn test_language_validation() {
    let (app, _pipeline) = setup(&[]);

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/api/v1/language",
        Some(json!({ "language": "klingon" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/api/v1/language",
        Some(json!({ "language": "ko" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["language"], "ko");
}

#[tokio::test(start_paused = true)]
async fn test_mute_round_trips_request() {
    let (app, pipeline) = setup(&[]);
    let (status, body) =
        send_json(&app, Method::POST, "/api/v1/mute", Some(json!({ "muted": true }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["muted"], true);

    settle(1).await;
    assert!(pipeline.handle.snapshot().await.ui.muted);
}

/// **Given** a bundle whose audio arrived inline
/// **When** a client fetches the blob behind its object URL
/// **Then** the bytes are served until the element is released
#[tokio::test(start_paused = true)]
async fn test_blob_served_until_revoked() {
    let (app, pipeline) = setup(&["c1", "c2"]);
    send(&app, Method::POST, "/api/v1/enable", None).await;
    settle(10).await;

    let snapshot = pipeline.handle.snapshot().await;
    let url = snapshot.current.unwrap().audio.url().to_string();
    let id = id_of(&url).unwrap().to_string();
    let path = format!("/api/v1/blobs/{}", id);

    let (status, bytes) = send(&app, Method::GET, &path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"c1".to_vec());

    send(&app, Method::POST, "/api/v1/disable", None).await;
    let (status, _) = send(&app, Method::GET, &path, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_audio_ended_accepted() {
    let (app, _pipeline) = setup(&["c1", "c2"]);
    send(&app, Method::POST, "/api/v1/enable", None).await;
    settle(10).await;

    let (status, bytes) = send(&app, Method::POST, "/api/v1/audio/1/ended", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(bytes.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_first_event_subscriber_starts_session() {
    let (app, _pipeline) = setup(&["c1", "c2"]);
    settle(10).await;
    let (_, body) = send_json(&app, Method::GET, "/api/v1/status", None).await;
    assert_eq!(body["state"], "idle");

    let request = Request::builder()
        .uri("/api/v1/events")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    settle(10).await;

    let (_, body) = send_json(&app, Method::GET, "/api/v1/status", None).await;
    assert_eq!(body["state"], "playing");
    assert!(body["ui"]["loading_phrase"].is_string());
    drop(response);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_playback_replayed_on_gesture() {
    let (app, pipeline) = setup(&["c1", "c2"]);
    send(&app, Method::POST, "/api/v1/enable", None).await;
    send(&app, Method::POST, "/api/v1/gesture", None).await;
    settle(10).await;
    assert!(pipeline.backend.is_running(HandleId(1)));

    let (status, bytes) = send(&app, Method::POST, "/api/v1/audio/1/rejected", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(bytes.is_empty());

    let (status, _) = send(&app, Method::POST, "/api/v1/gesture", None).await;
    assert_eq!(status, StatusCode::OK);
    settle(10).await;
    assert!(pipeline.backend.is_running(HandleId(1)));
}

#[tokio::test(start_paused = true)]
async fn test_prompt_forwards_language_and_current_audio() {
    let (app, pipeline) = setup(&["c1", "c2"]);

    let blank = Some(json!({ "prompt": "   " }));
    let (status, _) = send_json(&app, Method::POST, "/api/v1/prompt", blank).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    send(&app, Method::POST, "/api/v1/enable", None).await;
    settle(10).await;

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/api/v1/prompt",
        Some(json!({ "prompt": "rain on a tin roof" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "text");
    assert_eq!(body["content"], "echo: rain on a tin roof");

    let prompts = pipeline.service.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0]
        .current_audio
        .as_deref()
        .unwrap()
        .starts_with("blob:sublime/"));
    // Two fetches plus the prompt
    assert_eq!(pipeline.handle.state().api_calls.total(), 3);
}
