// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The browser-facing control channel: long-poll command delivery,
//! result delivery, and the CI-fixture snapshot view (spec §4.1).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::command::SubmitError;
use crate::error::GasolineError;
use crate::model::epoch_ms;
use crate::query::{self, QueryParams};
use crate::state::GasolineState;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncPollParams {
    pub since: Option<u64>,
    /// Active tab advertised by the polling extension, consulted by C5
    /// target resolution as the lowest-precedence fallback.
    pub tab_id: Option<u64>,
}

/// `GET /sync?since=&tabId=` — long-poll for the next dispatchable
/// command. Blocks up to `long_poll_timeout_ms`, returning `{queries:
/// [], cursor}` on a timeout rather than an error (spec §5).
pub async fn sync_poll(
    State(state): State<Arc<GasolineState>>,
    Query(params): Query<SyncPollParams>,
) -> Response {
    if let Some(tab_id) = params.tab_id {
        state.session.set_active_tab(tab_id).await;
    }
    let dispatched = state.bus.poll_next(state.config.long_poll_timeout()).await;
    let queries: Vec<_> = dispatched.into_iter().collect();
    Json(json!({ "queries": queries, "cursor": epoch_ms() })).into_response()
}

/// Result delivery body. Covers both `POST /sync` shapes from spec
/// §4.1: `{query_id, result}` for synchronous completion, and
/// `{query_id, correlation_id, status, result?, error?}` for async
/// completion.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResultBody {
    pub query_id: String,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// `POST /sync` — deliver a command's result. Routes through the
/// at-most-once lifecycle (spec §4.4): a replayed terminal for the same
/// `query_id` is a 2xx no-op, never a transport error (S4).
pub async fn sync_result(
    State(state): State<Arc<GasolineState>>,
    Json(body): Json<SyncResultBody>,
) -> Response {
    let is_error = body.error.is_some() || body.status.as_deref() == Some("error");
    let outcome: Result<Value, GasolineError> = if is_error {
        Err(GasolineError::QueryHandlerError)
    } else {
        Ok(body.result.clone().unwrap_or_else(|| json!({})))
    };

    match state
        .bus
        .submit_result_logged(&body.query_id, body.correlation_id.as_deref(), "post_sync", outcome)
        .await
    {
        Ok(()) => Json(json!({ "ok": true })).into_response(),
        Err(SubmitError::AlreadyTerminal) => Json(json!({ "ok": true, "noop": true })).into_response(),
        Err(SubmitError::UnknownQuery) => GasolineError::InvalidRequest
            .to_http_response(format!("unknown query_id `{}`", body.query_id))
            .into_response(),
    }
}

/// `GET /snapshot?test_id=&since=` — composite view used by CI fixtures:
/// every stream's page for the window plus aggregate stats.
pub async fn snapshot(State(state): State<Arc<GasolineState>>, Query(params): Query<QueryParams>) -> Response {
    let stores = &state.stores;
    Json(json!({
        "sessionId": state.session.session_id().await,
        "logs": query::logs(stores, &params).await,
        "networkBodies": query::network_bodies(stores, &params).await,
        "websocketEvents": query::websocket_events(stores, &params).await,
        "actions": query::actions(stores, &params).await,
        "webVitals": query::web_vitals(stores, &params).await,
        "testBoundaries": query::test_boundaries(stores, &params).await,
        "streamStats": query::stream_stats(stores).await,
    }))
    .into_response()
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
