// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

use crate::error::GasolineError;

/// Closed catalog of commands the agent can dispatch to a tab (spec
/// REDESIGN FLAGS: a static enum instead of a dynamic string-keyed table).
/// `Other` absorbs anything the capture script advertises support for that
/// this crate doesn't special-case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Navigate,
    Reload,
    GoBack,
    GoForward,
    Click,
    QueryDom,
    EvaluateScript,
    A11yAudit,
    Screenshot,
    State,
    Other(String),
}

impl CommandKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Navigate => "navigate",
            Self::Reload => "reload",
            Self::GoBack => "go_back",
            Self::GoForward => "go_forward",
            Self::Click => "click",
            Self::QueryDom => "query_dom",
            Self::EvaluateScript => "evaluate_script",
            Self::A11yAudit => "a11y_audit",
            Self::Screenshot => "screenshot",
            Self::State => "state",
            Self::Other(s) => s,
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "navigate" => Self::Navigate,
            "reload" => Self::Reload,
            "go_back" => Self::GoBack,
            "go_forward" => Self::GoForward,
            "click" => Self::Click,
            "query_dom" => Self::QueryDom,
            "evaluate_script" => Self::EvaluateScript,
            "a11y_audit" => Self::A11yAudit,
            "screenshot" => Self::Screenshot,
            "state" => Self::State,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Outside the closed catalog — resolves to `unknown_query_type` at
    /// dispatch rather than being delivered to the browser.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Other(_))
    }
}

impl Serialize for CommandKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CommandKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_str(&s))
    }
}

/// Lifecycle of a dispatched command (spec §4.4): a command is queued,
/// delivered to the browser at most once, then resolved exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryState {
    Queued,
    Dispatched,
    Complete,
    Error,
    Timeout,
    Cancelled,
}

/// A command awaiting delivery or resolution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingQuery {
    pub id: String,
    pub kind: CommandKind,
    pub params: serde_json::Value,
    pub tab_id: Option<u64>,
    pub state: QueryState,
    pub created_ts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<GasolineError>,
}

/// The shape delivered to the browser over `GET /sync` for a dispatched
/// command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchedCommand {
    pub id: String,
    pub command: CommandKind,
    pub params: serde_json::Value,
    pub tab_id: Option<u64>,
}
