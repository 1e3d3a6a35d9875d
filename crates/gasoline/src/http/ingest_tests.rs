// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::routing::post;
use axum::Router;
use axum_test::TestServer;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::config::GasolineConfig;

fn test_server() -> TestServer {
    let config = GasolineConfig { max_batch_entries: 3, ..GasolineConfig::default() };
    let state = Arc::new(GasolineState::new(config, CancellationToken::new()));
    let router = Router::new()
        .route("/logs", post(ingest_logs).delete(clear_logs))
        .route("/network-bodies", post(ingest_network_bodies))
        .route("/websocket-events", post(ingest_websocket_events))
        .route("/enhanced-actions", post(ingest_actions))
        .route("/web-vitals", post(ingest_web_vitals))
        .route("/test-boundary", post(ingest_test_boundary))
        .route("/clear", post(clear_all))
        .with_state(state);
    TestServer::new(router).unwrap()
}

#[tokio::test]
async fn logs_batch_is_accepted_and_redacts_nothing_itself() {
    let server = test_server();
    let resp = server
        .post("/logs")
        .json(&json!({
            "entries": [{
                "ts": 1_700_000_000_000u64,
                "level": "error",
                "source": "console",
                "message": "boom",
                "url": "https://example.com",
                "tabId": 1,
            }]
        }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["accepted"], 1);
    assert_eq!(body["dropped"], 0);
}

#[tokio::test]
async fn logs_batch_over_cap_is_rejected_with_413() {
    let server = test_server();
    let entries: Vec<Value> = (0..5)
        .map(|i| {
            json!({
                "ts": 1_700_000_000_000u64 + i,
                "level": "info",
                "source": "console",
                "message": "x",
                "url": "https://example.com",
                "tabId": 1,
            })
        })
        .collect();
    let resp = server.post("/logs").json(&json!({ "entries": entries })).await;
    resp.assert_status(axum::http::StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = resp.json();
    assert_eq!(body["error"], "buffer_overflow");
}

#[tokio::test]
async fn network_body_batch_is_accepted() {
    let server = test_server();
    let resp = server
        .post("/network-bodies")
        .json(&json!({
            "bodies": [{
                "ts": 1_700_000_000_000u64,
                "method": "GET",
                "url": "https://example.com/api",
                "status": 200,
                "requestHeaders": { "Authorization": "Bearer secret" },
                "responseHeaders": {},
                "durationMs": 12,
                "tabId": 1,
            }]
        }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["accepted"], 1);
}

#[tokio::test]
async fn second_close_event_on_same_connection_is_dropped() {
    let server = test_server();
    let event = |kind: &str| {
        json!({
            "ts": 1_700_000_000_000u64,
            "connectionId": "ws-1",
            "event": kind,
            "url": "wss://example.com",
            "tabId": 1,
        })
    };
    let resp = server.post("/websocket-events").json(&json!({ "events": [event("close")] })).await;
    let body: Value = resp.json();
    assert_eq!(body["accepted"], 1);

    let resp = server.post("/websocket-events").json(&json!({ "events": [event("close")] })).await;
    let body: Value = resp.json();
    assert_eq!(body["accepted"], 0);
    assert_eq!(body["dropped"], 1);
}

#[tokio::test]
async fn clear_rotates_session_and_clear_logs_only_touches_logs() {
    let server = test_server();
    server
        .post("/logs")
        .json(&json!({
            "entries": [{
                "ts": 1_700_000_000_000u64,
                "level": "info",
                "source": "console",
                "message": "hi",
                "url": "https://example.com",
                "tabId": 1,
            }]
        }))
        .await
        .assert_status_ok();

    let resp = server.delete("/logs").await;
    resp.assert_status_ok();

    let resp = server.post("/clear").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["cleared"], true);
}
