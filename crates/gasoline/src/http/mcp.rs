// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent-facing MCP interface: JSON-RPC 2.0 over `POST /mcp`,
//! exposing four tools (`observe`, `configure`, `generate`, `interact`)
//! per spec §6. Tool schemas and report formatters live outside this
//! crate's scope — this module dispatches and shapes responses, it does
//! not render them for a particular agent UI.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::command::registry::{is_browser_escape, requires_target_tab};
use crate::command::{CommandKind, QueryState};
use crate::error::GasolineError;
use crate::query::{self, QueryMode, QueryParams};
use crate::session::{TargetError, TargetResolution};
use crate::state::GasolineState;

const JSONRPC_PARSE_ERROR: i64 = -32700;
const JSONRPC_METHOD_NOT_FOUND: i64 = -32601;
const JSONRPC_INVALID_PARAMS: i64 = -32602;
const JSONRPC_INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

fn rpc_result(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn rpc_error(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": JsonRpcError { code, message: message.into() } })
}

/// Wrap a tool's JSON value in the MCP-standard tool-result envelope.
fn tool_content(value: Value) -> Value {
    let text = serde_json::to_string(&value).unwrap_or_else(|_| "{}".to_owned());
    json!({ "content": [{ "type": "text", "text": text }] })
}

/// `POST /mcp`
pub async fn mcp_handler(State(state): State<Arc<GasolineState>>, Json(body): Json<Value>) -> Response {
    let req: JsonRpcRequest = match serde_json::from_value(body) {
        Ok(req) => req,
        Err(e) => {
            return Json(rpc_error(Value::Null, JSONRPC_PARSE_ERROR, format!("invalid request: {e}")))
                .into_response();
        }
    };
    let id = req.id.clone();

    let response = match req.method.as_str() {
        "initialize" => rpc_result(id, initialize_result()),
        "tools/list" => rpc_result(id, tools_list_result()),
        "tools/call" => match tools_call(&state, &req.params).await {
            Ok(value) => rpc_result(id, tool_content(value)),
            Err((code, message)) => rpc_error(id, code, message),
        },
        other => rpc_error(id, JSONRPC_METHOD_NOT_FOUND, format!("unknown method `{other}`")),
    };
    Json(response).into_response()
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "serverInfo": { "name": "gasoline", "version": env!("CARGO_PKG_VERSION") },
        "capabilities": { "tools": {} },
    })
}

fn tools_list_result() -> Value {
    json!({
        "tools": [
            {
                "name": "observe",
                "description": "Query ingested browser telemetry (logs, network, actions, vitals, timeline, error clusters, ...).",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "what": { "type": "string" },
                        "params": { "type": "object" },
                    },
                    "required": ["what"],
                },
            },
            {
                "name": "configure",
                "description": "Adjust a broker setting for the active session.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "setting": { "type": "string" },
                        "value": {},
                    },
                    "required": ["setting", "value"],
                },
            },
            {
                "name": "generate",
                "description": "Render a derived artifact (e.g. a Playwright script) from captured telemetry.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "format": { "type": "string" },
                        "params": { "type": "object" },
                    },
                    "required": ["format"],
                },
            },
            {
                "name": "interact",
                "description": "Dispatch a command to the tracked browser tab and wait for its result.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "command": { "type": "string" },
                        "params": { "type": "object" },
                    },
                    "required": ["command"],
                },
            },
        ]
    })
}

async fn tools_call(state: &GasolineState, params: &Value) -> Result<Value, (i64, String)> {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| (JSONRPC_INVALID_PARAMS, "missing `name`".to_owned()))?;
    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

    match name {
        "observe" => Ok(observe_tool(state, &arguments).await),
        "configure" => Ok(configure_tool(state, &arguments).await),
        "generate" => Ok(generate_tool(&arguments)),
        "interact" => Ok(interact_tool(state, &arguments).await),
        other => Err((JSONRPC_METHOD_NOT_FOUND, format!("unknown tool `{other}`"))),
    }
}

async fn observe_tool(state: &GasolineState, args: &Value) -> Value {
    let what = args.get("what").and_then(Value::as_str).unwrap_or("");
    let mode = QueryMode::from_str(what);
    let params: QueryParams = args
        .get("params")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    query::observe(&state.stores, &mode, &params).await
}

/// `configure` adjusts session-scoped runtime knobs. Static config (ring
/// caps, timeouts) is process-lifetime and set only via `GasolineConfig`
/// at startup — not reachable here, since re-sizing a live ring buffer
/// is out of scope for this broker.
async fn configure_tool(state: &GasolineState, args: &Value) -> Value {
    let setting = args.get("setting").and_then(Value::as_str).unwrap_or("");
    let value = args.get("value").cloned().unwrap_or(Value::Null);
    match setting {
        "activeTab" => {
            if let Some(tab_id) = value.as_u64() {
                state.session.set_active_tab(tab_id).await;
                return json!({ "accepted": true, "setting": setting, "value": tab_id });
            }
            json!({ "accepted": false, "setting": setting, "message": "activeTab requires a numeric tab id" })
        }
        other => json!({ "accepted": false, "setting": other, "message": "unknown setting" }),
    }
}

/// Report generation (Playwright script synthesis, etc.) is an external
/// collaborator per spec §1 non-goals; stub consistently with the
/// `observe` not-implemented contract rather than erroring.
fn generate_tool(args: &Value) -> Value {
    let format = args.get("format").and_then(Value::as_str).unwrap_or("unknown");
    json!({ "status": "not_implemented", "format": format })
}

fn default_error_message(err: GasolineError) -> &'static str {
    match err {
        GasolineError::UnknownQueryType => "command is outside the supported catalog",
        GasolineError::TargetResolutionFailed => "no tracked or active tab to target",
        GasolineError::MissingTarget => "resolved target tab id was 0",
        GasolineError::CspBlockedPage => "target page is restricted",
        GasolineError::QueryHandlerError => "the browser reported a handler error",
        GasolineError::NoResult => "command completed without a result",
        GasolineError::NotImplemented => "not implemented",
        GasolineError::InvalidRequest => "invalid request",
        GasolineError::BufferOverflow => "buffer overflow",
        GasolineError::Internal => "internal error",
    }
}

/// Attach `{targetTabId, targetUrl, targetSource}` to a command result
/// object (spec §4.4 `withTargetContext`).
fn with_target_context(value: &mut Value, target: &TargetResolution) {
    if let Value::Object(map) = value {
        map.insert("targetTabId".to_owned(), json!(target.tab_id));
        map.insert("targetUrl".to_owned(), json!(target.url));
        map.insert("targetSource".to_owned(), json!(target.source));
    }
}

fn csp_blocked_response(message: impl Into<String>) -> Value {
    json!({
        "success": false,
        "error": GasolineError::CspBlockedPage.as_str(),
        "cspBlocked": true,
        "failureCause": "csp",
        "retryable": false,
        "message": message.into(),
    })
}

fn target_error_response(err: TargetError) -> Value {
    let kind = match err {
        TargetError::ResolutionFailed => GasolineError::TargetResolutionFailed,
        TargetError::MissingTarget => GasolineError::MissingTarget,
    };
    json!({
        "success": false,
        "error": kind.as_str(),
        "message": default_error_message(kind),
    })
}

/// Interact dispatches a command, waits for its terminal result (the
/// MCP call is itself the agent's synchronous boundary — `interact`
/// never returns before the command finishes), and shapes the response
/// per spec §4.4: `complete` becomes the payload itself, every other
/// terminal state is wrapped into `{success:false, status, error,
/// message, result}`.
async fn interact_tool(state: &GasolineState, args: &Value) -> Value {
    let command = args.get("command").and_then(Value::as_str).unwrap_or("");
    let kind = CommandKind::from_str(command);
    let params = args.get("params").cloned().unwrap_or_else(|| json!({}));
    let explicit_tab_id = params.get("tabId").and_then(Value::as_u64);

    let target = if requires_target_tab(&kind) {
        match state.session.resolve_target(&state.stores, explicit_tab_id).await {
            Ok(target) => Some(target),
            Err(err) => return target_error_response(err),
        }
    } else {
        None
    };

    if let Some(target) = &target {
        let restricted = state.session.is_restricted(&target.url);
        if restricted && !is_browser_escape(&kind) {
            return csp_blocked_response(format!("{} is a restricted page", target.url));
        }
    }

    let tab_id = target.as_ref().map(|t| t.tab_id).or(explicit_tab_id);
    let id = state.bus.enqueue(kind, params, tab_id).await;
    let query = match state.bus.await_result(&id, state.config.command_deadline()).await {
        Some(query) => query,
        None => return json!({ "success": false, "error": "no_result", "message": "query vanished" }),
    };

    let mut value = match query.state {
        QueryState::Complete => query.result.unwrap_or_else(|| json!({})),
        other => {
            let error = query.error.unwrap_or(GasolineError::NoResult);
            json!({
                "success": false,
                "status": other,
                "error": error.as_str(),
                "message": default_error_message(error),
                "result": query.result,
            })
        }
    };
    if let Some(target) = &target {
        with_target_context(&mut value, target);
    }
    value
}

#[cfg(test)]
#[path = "mcp_tests.rs"]
mod tests;
