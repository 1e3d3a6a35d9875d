// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire entities ingested from the browser and served back to the agent.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Severity of a [`LogEntry`]. Ordered so `level >= X` filters compare directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Origin of a [`LogEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSource {
    Console,
    Exception,
    Network,
    GasolineCi,
    Unhandledrejection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: u64,
    pub ts: u64,
    pub level: LogLevel,
    pub source: LogSource,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub url: String,
    pub tab_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    pub session_id: String,
}

/// Raw ingest payload for one `/logs` entry, before id/session stamping.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntryIn {
    pub ts: u64,
    pub level: LogLevel,
    pub source: LogSource,
    pub message: String,
    #[serde(default)]
    pub args: Option<serde_json::Value>,
    #[serde(default)]
    pub stack: Option<String>,
    pub url: String,
    pub tab_id: u64,
    #[serde(default)]
    pub test_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkBody {
    pub id: u64,
    pub ts: u64,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub request_headers: HashMap<String, String>,
    pub response_headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub duration_ms: u64,
    pub tab_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkBodyIn {
    pub ts: u64,
    pub method: String,
    pub url: String,
    pub status: u16,
    #[serde(default)]
    pub request_headers: HashMap<String, String>,
    #[serde(default)]
    pub response_headers: HashMap<String, String>,
    #[serde(default)]
    pub request_body: Option<String>,
    #[serde(default)]
    pub response_body: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    pub duration_ms: u64,
    pub tab_id: u64,
    #[serde(default)]
    pub test_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebSocketEventKind {
    Connecting,
    Open,
    Message,
    Close,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WsDirection {
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketEvent {
    pub id: u64,
    pub ts: u64,
    pub connection_id: String,
    pub event: WebSocketEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<WsDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub url: String,
    pub tab_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketEventIn {
    pub ts: u64,
    pub connection_id: String,
    pub event: WebSocketEventKind,
    #[serde(default)]
    pub direction: Option<WsDirection>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub reason: Option<String>,
    pub url: String,
    pub tab_id: u64,
    #[serde(default)]
    pub test_id: Option<String>,
}

/// Action type. `Other` absorbs any kind the browser capture script sends
/// that this crate doesn't special-case (spec lists the set with "...").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Navigate,
    Click,
    Input,
    Keypress,
    Scroll,
    Submit,
    Other(String),
}

impl ActionKind {
    fn as_str(&self) -> &str {
        match self {
            Self::Navigate => "navigate",
            Self::Click => "click",
            Self::Input => "input",
            Self::Keypress => "keypress",
            Self::Scroll => "scroll",
            Self::Submit => "submit",
            Self::Other(s) => s,
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "navigate" => Self::Navigate,
            "click" => Self::Click,
            "input" => Self::Input,
            "keypress" => Self::Keypress,
            "scroll" => Self::Scroll,
            "submit" => Self::Submit,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl Serialize for ActionKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActionKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_str(&s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: u64,
    pub ts: u64,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_url: Option<String>,
    pub tab_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionIn {
    pub ts: u64,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default)]
    pub selectors: Option<Vec<String>>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub to_url: Option<String>,
    pub tab_id: u64,
    #[serde(default)]
    pub test_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebVitalMetric {
    Lcp,
    Cls,
    Inp,
    Fcp,
    Ttfb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebVital {
    pub id: u64,
    pub ts: u64,
    pub metric: WebVitalMetric,
    pub value: f64,
    pub url: String,
    pub tab_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebVitalIn {
    pub ts: u64,
    pub metric: WebVitalMetric,
    pub value: f64,
    pub url: String,
    pub tab_id: u64,
    #[serde(default)]
    pub test_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryAction {
    Start,
    End,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestBoundary {
    pub test_id: String,
    pub action: BoundaryAction,
    pub ts: u64,
}

/// Tracked browser tab, maintained by the session tracker (C5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabRecord {
    pub tab_id: u64,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub tracked: bool,
    pub last_seen_ts: u64,
    pub restricted: bool,
}

/// Current wall-clock time in milliseconds since epoch.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Normalize a capture-script timestamp to milliseconds (spec §4.1).
/// Older producers occasionally send unix seconds; anything below the
/// year-2001-in-milliseconds threshold is assumed to be seconds and
/// scaled up, since no real browser session predates that.
const SECONDS_VS_MILLIS_THRESHOLD: u64 = 10_000_000_000;

pub fn normalize_ts(ts: u64) -> u64 {
    if ts < SECONDS_VS_MILLIS_THRESHOLD {
        ts * 1_000
    } else {
        ts
    }
}
