// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface: the browser-facing ingest/control channel (C1) and the
//! agent-facing MCP endpoint (§6), wired onto one axum `Router`.

pub mod ingest;
pub mod mcp;
pub mod sync;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::GasolineState;

/// Build the axum `Router` serving every endpoint in spec §4.1 and §6.
///
/// `CorsLayer::permissive()` mirrors the teacher's router: the capture
/// script runs inside arbitrary page origins, so the loopback bind (spec
/// §6) is the access boundary, not CORS.
pub fn build_router(state: Arc<GasolineState>) -> Router {
    Router::new()
        .route("/logs", post(ingest::ingest_logs).delete(ingest::clear_logs))
        .route("/network-bodies", post(ingest::ingest_network_bodies))
        .route("/websocket-events", post(ingest::ingest_websocket_events))
        .route("/enhanced-actions", post(ingest::ingest_actions))
        .route("/web-vitals", post(ingest::ingest_web_vitals))
        .route("/test-boundary", post(ingest::ingest_test_boundary))
        .route("/clear", post(ingest::clear_all))
        .route("/sync", get(sync::sync_poll).post(sync::sync_result))
        .route("/snapshot", get(sync::snapshot))
        .route("/health", get(ingest::health))
        .route("/mcp", post(mcp::mcp_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
