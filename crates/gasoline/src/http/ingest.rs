// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ingest endpoints (C1): one handler per telemetry stream, plus the
//! `/clear` and `DELETE /logs` reset endpoints.
//!
//! Every handler here returns 2xx for a structurally valid batch — per
//! spec §7, retrying browser telemetry is rarely useful, so per-entry
//! validation failures are just counted in `dropped` rather than failing
//! the request. A batch that exceeds the configured entry cap is the one
//! case that *does* fail the request outright (spec §4.1).

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::GasolineError;
use crate::model::{
    epoch_ms, normalize_ts, Action, ActionIn, BoundaryAction, LogEntry, LogEntryIn, NetworkBody,
    NetworkBodyIn, TestBoundary, WebSocketEvent, WebSocketEventIn, WebVital, WebVitalIn,
};
use crate::redact::redact_headers;
use crate::state::GasolineState;

/// `{accepted, dropped}` — the contract every ingest endpoint returns.
#[derive(Debug, Clone, serde::Serialize)]
struct IngestAck {
    accepted: u64,
    dropped: u64,
}

fn ack(accepted: u64, dropped: u64) -> Response {
    Json(IngestAck { accepted, dropped }).into_response()
}

/// Pull `body[field]` as a JSON array, enforce the batch cap, then
/// deserialize each element independently — one malformed element drops
/// only itself, not the whole batch.
fn parse_batch<T: DeserializeOwned>(
    body: &Value,
    field: &str,
    max_batch: usize,
) -> Result<(Vec<T>, u64), Response> {
    let Some(raw) = body.get(field).and_then(Value::as_array) else {
        return Err(GasolineError::InvalidRequest
            .to_http_response(format!("missing or non-array field `{field}`"))
            .into_response());
    };
    if raw.len() > max_batch {
        let body = GasolineError::BufferOverflow
            .to_error_body(format!("batch of {} entries exceeds cap of {max_batch}", raw.len()))
            .with_extra("retryAfterMs", json!(1000));
        return Err((axum::http::StatusCode::PAYLOAD_TOO_LARGE, Json(body)).into_response());
    }
    let mut items = Vec::with_capacity(raw.len());
    let mut dropped = 0u64;
    for entry in raw {
        match serde_json::from_value::<T>(entry.clone()) {
            Ok(v) => items.push(v),
            Err(_) => dropped += 1,
        }
    }
    Ok((items, dropped))
}

/// The test id to stamp an ingested record with, absent an explicit one
/// on the record itself: the active test boundary, then the CI hint from
/// config (spec §4.1 "stamp ... test_id (if known from C5)").
async fn test_id_fallback(state: &GasolineState) -> Option<String> {
    if let Some(id) = state.session.current_test_id().await {
        return Some(id);
    }
    state.config.test_id_hint.clone()
}

/// `POST /logs`
pub async fn ingest_logs(State(state): State<Arc<GasolineState>>, Json(body): Json<Value>) -> Response {
    let (items, dropped) = match parse_batch::<LogEntryIn>(&body, "entries", state.config.max_batch_entries) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let session_id = state.session.session_id().await;
    let fallback_test_id = test_id_fallback(&state).await;
    let mut accepted = 0u64;
    for entry in items {
        let test_id = entry.test_id.clone().or_else(|| fallback_test_id.clone());
        state.session.touch_tab(&state.stores, entry.tab_id, Some(entry.url.clone())).await;
        state
            .stores
            .logs
            .push_with(|id| LogEntry {
                id,
                ts: normalize_ts(entry.ts),
                level: entry.level,
                source: entry.source,
                message: entry.message,
                args: entry.args,
                stack: entry.stack,
                url: entry.url,
                tab_id: entry.tab_id,
                test_id,
                session_id: session_id.clone(),
            })
            .await;
        accepted += 1;
    }
    tracing::debug!(accepted, dropped, "ingested logs batch");
    ack(accepted, dropped)
}

/// `POST /network-bodies`
pub async fn ingest_network_bodies(
    State(state): State<Arc<GasolineState>>,
    Json(body): Json<Value>,
) -> Response {
    let (items, dropped) =
        match parse_batch::<NetworkBodyIn>(&body, "bodies", state.config.max_batch_entries) {
            Ok(v) => v,
            Err(resp) => return resp,
        };
    let session_id = state.session.session_id().await;
    let fallback_test_id = test_id_fallback(&state).await;
    let mut accepted = 0u64;
    for mut entry in items {
        redact_headers(&mut entry.request_headers);
        redact_headers(&mut entry.response_headers);
        let test_id = entry.test_id.clone().or_else(|| fallback_test_id.clone());
        state.session.touch_tab(&state.stores, entry.tab_id, None).await;
        state
            .stores
            .network_bodies
            .push_with(|id| NetworkBody {
                id,
                ts: normalize_ts(entry.ts),
                method: entry.method,
                url: entry.url,
                status: entry.status,
                request_headers: entry.request_headers,
                response_headers: entry.response_headers,
                request_body: entry.request_body,
                response_body: entry.response_body,
                content_type: entry.content_type,
                duration_ms: entry.duration_ms,
                tab_id: entry.tab_id,
                test_id,
                session_id: session_id.clone(),
            })
            .await;
        accepted += 1;
    }
    tracing::debug!(accepted, dropped, "ingested network-bodies batch");
    ack(accepted, dropped)
}

/// `POST /websocket-events`
pub async fn ingest_websocket_events(
    State(state): State<Arc<GasolineState>>,
    Json(body): Json<Value>,
) -> Response {
    let (items, mut dropped) =
        match parse_batch::<WebSocketEventIn>(&body, "events", state.config.max_batch_entries) {
            Ok(v) => v,
            Err(resp) => return resp,
        };
    let session_id = state.session.session_id().await;
    let fallback_test_id = test_id_fallback(&state).await;
    let mut accepted = 0u64;
    for entry in items {
        let test_id = entry.test_id.clone().or_else(|| fallback_test_id.clone());
        state.session.touch_tab(&state.stores, entry.tab_id, Some(entry.url.clone())).await;
        let connection_id = entry.connection_id.clone();
        let pushed = state
            .stores
            .ws_events
            .push_with(&connection_id, |id| WebSocketEvent {
                id,
                ts: normalize_ts(entry.ts),
                connection_id: entry.connection_id,
                event: entry.event,
                direction: entry.direction,
                data: entry.data,
                size: entry.size,
                code: entry.code,
                reason: entry.reason,
                url: entry.url,
                tab_id: entry.tab_id,
                test_id,
                session_id: session_id.clone(),
            })
            .await;
        match pushed {
            Ok(_) => accepted += 1,
            // Connection already closed — spec invariant 5 rejects any
            // later event for it.
            Err(()) => dropped += 1,
        }
    }
    tracing::debug!(accepted, dropped, "ingested websocket-events batch");
    ack(accepted, dropped)
}

/// `POST /enhanced-actions`
pub async fn ingest_actions(State(state): State<Arc<GasolineState>>, Json(body): Json<Value>) -> Response {
    let (items, dropped) = match parse_batch::<ActionIn>(&body, "actions", state.config.max_batch_entries) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let session_id = state.session.session_id().await;
    let fallback_test_id = test_id_fallback(&state).await;
    let mut accepted = 0u64;
    for entry in items {
        let test_id = entry.test_id.clone().or_else(|| fallback_test_id.clone());
        state.session.touch_tab(&state.stores, entry.tab_id, entry.url.clone()).await;
        // An observed user action is what makes its tab the "last
        // tracked tab" for target resolution (spec §4.5).
        state.session.note_action_tab(entry.tab_id).await;
        state
            .stores
            .actions
            .push_with(|id| Action {
                id,
                ts: normalize_ts(entry.ts),
                kind: entry.kind,
                selectors: entry.selectors,
                url: entry.url,
                to_url: entry.to_url,
                tab_id: entry.tab_id,
                test_id,
                session_id: session_id.clone(),
            })
            .await;
        accepted += 1;
    }
    tracing::debug!(accepted, dropped, "ingested enhanced-actions batch");
    ack(accepted, dropped)
}

/// `POST /web-vitals`
pub async fn ingest_web_vitals(State(state): State<Arc<GasolineState>>, Json(body): Json<Value>) -> Response {
    let (items, dropped) = match parse_batch::<WebVitalIn>(&body, "vitals", state.config.max_batch_entries) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let session_id = state.session.session_id().await;
    let fallback_test_id = test_id_fallback(&state).await;
    let mut accepted = 0u64;
    for entry in items {
        let test_id = entry.test_id.clone().or_else(|| fallback_test_id.clone());
        state.session.touch_tab(&state.stores, entry.tab_id, Some(entry.url.clone())).await;
        state
            .stores
            .vitals
            .push_with(|id| WebVital {
                id,
                ts: normalize_ts(entry.ts),
                metric: entry.metric,
                value: entry.value,
                url: entry.url,
                tab_id: entry.tab_id,
                test_id,
                session_id: session_id.clone(),
            })
            .await;
        accepted += 1;
    }
    tracing::debug!(accepted, dropped, "ingested web-vitals batch");
    ack(accepted, dropped)
}

/// `POST /test-boundary`
pub async fn ingest_test_boundary(
    State(state): State<Arc<GasolineState>>,
    Json(boundary): Json<TestBoundary>,
) -> Response {
    match boundary.action {
        BoundaryAction::Start => state.session.start_test(boundary.test_id.clone()).await,
        BoundaryAction::End => state.session.end_test().await,
    }
    state.stores.test_boundaries.write().await.push(boundary.clone());
    tracing::debug!(test_id = %boundary.test_id, action = ?boundary.action, "test boundary");
    ack(1, 0)
}

/// `POST /clear` — resets all buffers and rotates the session id.
pub async fn clear_all(State(state): State<Arc<GasolineState>>) -> Response {
    let session_id = state.clear().await;
    tracing::info!(%session_id, "session cleared");
    Json(json!({ "cleared": true, "sessionId": session_id })).into_response()
}

/// `DELETE /logs` — resets only the logs buffer.
pub async fn clear_logs(State(state): State<Arc<GasolineState>>) -> Response {
    state.stores.clear_logs(&state.config).await;
    Json(json!({ "cleared": true })).into_response()
}

/// `GET /health`
pub async fn health() -> Response {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "ts": epoch_ms(),
    }))
    .into_response()
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
