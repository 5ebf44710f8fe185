//! Route tests for the token and call-metrics endpoints.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use finbot_api::{
    config::{Config, TokenPolicy},
    router::create_router,
    state::AppState,
};
use finbot_core::{
    metrics::{LatencyRow, MetricsSink},
    metrics_log::CsvMetricsLog,
    token::LiveKitConfig,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt; // for oneshot
use tracing::Level;

const SECRET: &str = "route-test-secret-long-enough";

fn test_config(log_path: &Path) -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        livekit: LiveKitConfig::new("wss://example.livekit.cloud", "devkey", SECRET),
        token_policy: TokenPolicy {
            default_identity: "identity".into(),
            default_name: "name".into(),
            default_room: "my-room".into(),
            allowed_identities: vec!["identity".into(), "alice".into()],
            allowed_rooms: vec!["my-room".into()],
        },
        metrics_log_path: log_path.to_path_buf(),
        log_level: Level::INFO,
    }
}

fn app(log_path: &Path) -> Router {
    create_router(Arc::new(AppState::new(test_config(log_path))))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let (parts, body) = resp.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or_default();
    (parts.status, json)
}

#[derive(Deserialize)]
struct Claims {
    sub: String,
    video: VideoClaims,
}

#[derive(Deserialize)]
struct VideoClaims {
    room: String,
}

#[tokio::test]
async fn test_end_call_before_any_log_is_not_found() {
    let dir = tempdir().unwrap();
    let app = app(&dir.path().join("metrics_log.csv"));

    let (status, body) = get(&app, "/end-call").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "metrics_log.csv not found");
}

#[tokio::test]
async fn test_start_call_clears_log() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("metrics_log.csv");
    std::fs::write(&log_path, "stale,data\n").unwrap();
    let app = app(&log_path);

    let (status, body) = get(&app, "/start-call").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "metrics_log.csv cleared");

    let (status, body) = get(&app, "/end-call").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metrics"], serde_json::json!([]));
    assert!(body["summary"].is_null());
}

#[tokio::test]
async fn test_end_call_returns_rows_and_summary() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("metrics_log.csv");
    let app = app(&log_path);
    get(&app, "/start-call").await;

    let writer = CsvMetricsLog::new(&log_path);
    writer
        .append(&LatencyRow::new("speech_1".into(), 0.5, 0.3, 0.2))
        .unwrap();
    writer
        .append(&LatencyRow::new("speech_2".into(), 0.7, 0.5, 0.3))
        .unwrap();

    let (status, body) = get(&app, "/end-call").await;
    assert_eq!(status, StatusCode::OK);

    let metrics = body["metrics"].as_array().unwrap();
    assert_eq!(metrics.len(), 3);
    assert_eq!(metrics[0][0], "Timestamp");
    assert_eq!(metrics[1][1], "speech_1");
    assert_eq!(metrics[2][5], "1.500");

    assert_eq!(body["summary"]["turns"], 2);
    let avg_total = body["summary"]["avg_total_latency"].as_f64().unwrap();
    assert!((avg_total - 1.25).abs() < 1e-9);
}

#[tokio::test]
async fn test_token_uses_defaults() {
    let dir = tempdir().unwrap();
    let app = app(&dir.path().join("metrics_log.csv"));

    let (status, body) = get(&app, "/token").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["livekit_url"], "wss://example.livekit.cloud");

    let token = body["token"].as_str().unwrap();
    let key = DecodingKey::from_secret(SECRET.as_bytes());
    let data = decode::<Claims>(token, &key, &Validation::new(Algorithm::HS256)).unwrap();
    assert_eq!(data.claims.sub, "identity");
    assert_eq!(data.claims.video.room, "my-room");
}

#[tokio::test]
async fn test_token_for_allowed_identity() {
    let dir = tempdir().unwrap();
    let app = app(&dir.path().join("metrics_log.csv"));

    let (status, body) = get(&app, "/token?identity=alice&name=Alice").await;
    assert_eq!(status, StatusCode::OK);

    let key = DecodingKey::from_secret(SECRET.as_bytes());
    let data = decode::<Claims>(
        body["token"].as_str().unwrap(),
        &key,
        &Validation::new(Algorithm::HS256),
    )
    .unwrap();
    assert_eq!(data.claims.sub, "alice");
}

#[tokio::test]
async fn test_token_refuses_unknown_identity_or_room() {
    let dir = tempdir().unwrap();
    let app = app(&dir.path().join("metrics_log.csv"));

    let (status, body) = get(&app, "/token?identity=mallory").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("mallory"));

    let (status, _) = get(&app, "/token?room=other-room").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get(&app, "/token?identity=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
