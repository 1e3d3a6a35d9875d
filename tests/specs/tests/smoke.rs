// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios from spec §8 (S1–S6), driven against the real
//! `gasoline::http::build_router` output rather than any single handler.

use std::time::Duration;

use serde_json::json;

use gasoline::config::GasolineConfig;
use gasoline_specs::Harness;

#[tokio::test]
async fn s1_logs_round_trip() {
    let h = Harness::default();
    h.server
        .post("/logs")
        .json(&json!({
            "entries": [{
                "ts": 1_700_000_000_000u64,
                "level": "error",
                "source": "console",
                "message": "boom",
                "url": "http://x",
                "tabId": 1,
            }]
        }))
        .await
        .assert_status_ok();

    let view = h.observe("logs", json!({ "level": "error" })).await;
    let entries = view["entries"].as_array().expect("entries array");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["message"], "boom");
}

#[tokio::test]
async fn s2_header_redaction() {
    let h = Harness::default();
    h.server
        .post("/network-bodies")
        .json(&json!({
            "bodies": [{
                "ts": 1_700_000_000_000u64,
                "method": "GET",
                "url": "https://api.example.com/token",
                "status": 200,
                "requestHeaders": { "Authorization": "Bearer sk_secret" },
                "responseHeaders": { "Set-Cookie": "session=sk_secret_cookie" },
                "durationMs": 5,
                "tabId": 1,
            }]
        }))
        .await
        .assert_status_ok();

    let view = h.observe("network_bodies", json!({})).await;
    let entry = &view["entries"][0];
    assert_eq!(entry["requestHeaders"]["Authorization"], "[REDACTED]");
    assert_eq!(entry["responseHeaders"]["Set-Cookie"], "[REDACTED]");

    let rendered = serde_json::to_string(&view).unwrap();
    assert!(!rendered.contains("sk_secret"));
}

#[tokio::test]
async fn s3_long_poll_then_async_result_resolves_interact() {
    let h = Harness::new(GasolineConfig { long_poll_timeout_ms: 2_000, ..GasolineConfig::default() });
    h.state.session.touch_tab(&h.state.stores, 1, Some("https://example.com".to_owned())).await;
    h.state.session.note_action_tab(1).await;

    let interact = {
        let server = h.server.clone();
        tokio::spawn(async move {
            server
                .post("/mcp")
                .json(&json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "method": "tools/call",
                    "params": { "name": "interact", "arguments": { "command": "navigate", "params": { "url": "/x" } } },
                }))
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    let poll = h.server.get("/sync").await;
    poll.assert_status_ok();
    let poll_body: serde_json::Value = poll.json();
    let queries = poll_body["queries"].as_array().expect("queries array");
    assert_eq!(queries.len(), 1);
    let query_id = queries[0]["id"].as_str().unwrap().to_owned();

    h.server
        .post("/sync")
        .json(&json!({ "queryId": query_id, "result": { "ok": true } }))
        .await
        .assert_status_ok();

    let resp = interact.await.unwrap();
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    let text = body["result"]["content"][0]["text"].as_str().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(text).unwrap();
    assert_eq!(parsed["ok"], true);
    assert_eq!(parsed["targetTabId"], 1);
    assert_eq!(parsed["targetSource"], "tracked_tab");
}

#[tokio::test]
async fn s4_at_most_once_terminal_delivery() {
    let h = Harness::default();
    let id = h.state.bus.enqueue(gasoline::command::CommandKind::Click, json!({}), Some(1)).await;
    h.state.bus.poll_next(Duration::from_millis(50)).await;

    let first = h.server.post("/sync").json(&json!({ "queryId": id, "result": { "ok": true } })).await;
    first.assert_status_ok();
    let first_body: serde_json::Value = first.json();
    assert!(first_body.get("noop").is_none());

    let replay = h.server.post("/sync").json(&json!({ "queryId": id, "result": { "ok": true } })).await;
    replay.assert_status_ok();
    let replay_body: serde_json::Value = replay.json();
    assert_eq!(replay_body["noop"], true);
}

#[tokio::test]
async fn s5_restricted_page_blocks_without_dispatch() {
    let h = Harness::default();
    h.state.session.touch_tab(&h.state.stores, 9, Some("chrome://settings".to_owned())).await;
    h.state.session.note_action_tab(9).await;

    let view = h.interact("click", json!({ "selector": "#x" })).await;
    assert_eq!(view["success"], false);
    assert_eq!(view["error"], "csp_blocked_page");
    assert_eq!(view["cspBlocked"], true);

    assert!(h.state.bus.poll_next(Duration::from_millis(20)).await.is_none());
}

#[tokio::test]
async fn s6_buffer_overflow_retains_newest_and_reports_dropped() {
    let h = Harness::new(GasolineConfig { logs_cap: 3, ..GasolineConfig::default() });
    let entries: Vec<serde_json::Value> = (0..5)
        .map(|i| {
            json!({
                "ts": 1_700_000_000_000u64 + i,
                "level": "info",
                "source": "console",
                "message": format!("entry-{i}"),
                "url": "http://x",
                "tabId": 1,
            })
        })
        .collect();
    h.server.post("/logs").json(&json!({ "entries": entries })).await.assert_status_ok();

    let view = h.observe("logs", json!({})).await;
    let entries = view["entries"].as_array().expect("entries array");
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["message"], "entry-2");
    assert_eq!(entries[2]["message"], "entry-4");
    assert!(view["dropped"].as_u64().unwrap() >= 2);
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let h = Harness::default();
    let resp = h.server.get("/health").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "ok");
}
