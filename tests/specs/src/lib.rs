// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Black-box harness for the broker's concrete scenarios (spec §8, S1–S6).
//!
//! Unlike the per-module tests inside the `gasoline` crate (each of which
//! drives a handful of routes in isolation), this harness builds the real
//! `gasoline::http::build_router` output and drives it end to end — an
//! ingest through `/logs` followed by a read through `/mcp`'s `observe`
//! tool exercises the same router a real capture script and a real agent
//! would talk to.

use std::sync::Arc;

use axum_test::TestServer;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use gasoline::config::GasolineConfig;
use gasoline::state::GasolineState;

/// One broker instance wired to an in-process `TestServer`.
pub struct Harness {
    pub server: TestServer,
    pub state: Arc<GasolineState>,
}

impl Harness {
    pub fn new(config: GasolineConfig) -> Self {
        let state = Arc::new(GasolineState::new(config, CancellationToken::new()));
        let router = gasoline::http::build_router(state.clone());
        let server = TestServer::new(router).expect("build in-process test server");
        Self { server, state }
    }

    /// `observe(what, params)` through the MCP `tools/call` envelope,
    /// returning the tool's embedded JSON payload (already unwrapped from
    /// the `{content:[{type:"text", text:...}]}` envelope).
    pub async fn observe(&self, what: &str, params: Value) -> Value {
        self.mcp_tool("observe", json!({ "what": what, "params": params })).await
    }

    /// `interact(command, params)` through the MCP `tools/call` envelope.
    pub async fn interact(&self, command: &str, params: Value) -> Value {
        self.mcp_tool("interact", json!({ "command": command, "params": params })).await
    }

    async fn mcp_tool(&self, name: &str, arguments: Value) -> Value {
        let resp = self
            .server
            .post("/mcp")
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": { "name": name, "arguments": arguments },
            }))
            .await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        let text = body["result"]["content"][0]["text"]
            .as_str()
            .unwrap_or_else(|| panic!("malformed tool response: {body}"));
        serde_json::from_str(text).expect("tool response is valid JSON")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(GasolineConfig::default())
    }
}
