// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Query engine (C3): serves the `observe` facet — filtering, pagination,
//! correlation, clustering, and timeline fusion over the telemetry store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::model::{LogEntry, LogLevel, LogSource, NetworkBody, WebSocketEvent};
use crate::signature;
use crate::store::{Stores, StreamKeys};

pub const DEFAULT_LIMIT: usize = 200;
pub const MAX_LIMIT: usize = 2_000;

/// `observe` mode catalog (spec §4.3). `Unknown` covers any mode name the
/// agent requests that this crate doesn't implement — served as a
/// `not_implemented` stub rather than a transport error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryMode {
    Logs,
    NetworkBodies,
    WebsocketEvents,
    Actions,
    WebVitals,
    TestBoundaries,
    Tabs,
    CorrelateNetwork,
    ErrorClusters,
    Timeline,
    StreamStats,
    Unknown(String),
}

impl QueryMode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Logs => "logs",
            Self::NetworkBodies => "network_bodies",
            Self::WebsocketEvents => "websocket_events",
            Self::Actions => "actions",
            Self::WebVitals => "web_vitals",
            Self::TestBoundaries => "test_boundaries",
            Self::Tabs => "tabs",
            Self::CorrelateNetwork => "correlate_network",
            Self::ErrorClusters => "error_clusters",
            Self::Timeline => "timeline",
            Self::StreamStats => "stream_stats",
            Self::Unknown(s) => s,
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "logs" => Self::Logs,
            "network_bodies" => Self::NetworkBodies,
            "websocket_events" => Self::WebsocketEvents,
            "actions" => Self::Actions,
            "web_vitals" => Self::WebVitals,
            "test_boundaries" => Self::TestBoundaries,
            "tabs" => Self::Tabs,
            "correlate_network" => Self::CorrelateNetwork,
            "error_clusters" => Self::ErrorClusters,
            "timeline" => Self::Timeline,
            "stream_stats" => Self::StreamStats,
            other => Self::Unknown(other.to_owned()),
        }
    }
}

impl Serialize for QueryMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for QueryMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_str(&s))
    }
}

/// Common filter/pagination parameters accepted by every mode (spec
/// "pagination discipline" + "filtering").
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryParams {
    pub since: Option<u64>,
    pub limit: Option<usize>,
    pub test_id: Option<String>,
    pub tab_id: Option<u64>,
    pub source: Option<LogSource>,
    pub level: Option<LogLevel>,
    pub status: Option<u16>,
    pub from_ts: Option<u64>,
    pub to_ts: Option<u64>,
}

impl QueryParams {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    fn since(&self) -> u64 {
        self.since.unwrap_or(0)
    }
}

/// Dispatch one `observe` call. Every branch returns a well-formed JSON
/// value; nothing here raises a transport error.
pub async fn observe(stores: &Stores, mode: &QueryMode, params: &QueryParams) -> Value {
    match mode {
        QueryMode::Logs => logs(stores, params).await,
        QueryMode::NetworkBodies => network_bodies(stores, params).await,
        QueryMode::WebsocketEvents => websocket_events(stores, params).await,
        QueryMode::Actions => actions(stores, params).await,
        QueryMode::WebVitals => web_vitals(stores, params).await,
        QueryMode::TestBoundaries => test_boundaries(stores, params).await,
        QueryMode::Tabs => tabs(stores, params).await,
        QueryMode::CorrelateNetwork => correlate_network(stores, params).await,
        QueryMode::ErrorClusters => error_clusters(stores, params).await,
        QueryMode::Timeline => timeline(stores, params).await,
        QueryMode::StreamStats => stream_stats(stores).await,
        QueryMode::Unknown(mode) => json!({ "status": "not_implemented", "mode": mode }),
    }
}

/// Take up to `limit` items from `iter`. Returns the page plus the id of
/// the last item taken (as `next_cursor`) and whether more were available.
fn collect_page<T>(mut iter: impl Iterator<Item = (u64, T)>, limit: usize) -> (Vec<T>, Option<u64>, bool) {
    let mut entries = Vec::new();
    let mut last_id = None;
    while entries.len() < limit {
        match iter.next() {
            Some((id, value)) => {
                entries.push(value);
                last_id = Some(id);
            }
            None => return (entries, None, false),
        }
    }
    match iter.next() {
        Some(_) => (entries, last_id, true),
        None => (entries, None, false),
    }
}

fn page_json<T: Serialize>(entries: Vec<T>, next_cursor: Option<u64>, truncated: bool, dropped: u64) -> Value {
    json!({
        "entries": entries,
        "nextCursor": next_cursor,
        "truncated": truncated,
        "dropped": dropped,
    })
}

fn matches_keys<T: StreamKeys>(entry: &T, params: &QueryParams) -> bool {
    if let Some(test_id) = &params.test_id {
        if entry.test_id() != Some(test_id.as_str()) {
            return false;
        }
    }
    if let Some(tab_id) = params.tab_id {
        if entry.tab_id() != tab_id {
            return false;
        }
    }
    true
}

fn matches_log(entry: &LogEntry, params: &QueryParams) -> bool {
    if let Some(test_id) = &params.test_id {
        if entry.test_id.as_deref() != Some(test_id.as_str()) {
            return false;
        }
    }
    if let Some(tab_id) = params.tab_id {
        if entry.tab_id != tab_id {
            return false;
        }
    }
    if let Some(source) = params.source {
        if entry.source != source {
            return false;
        }
    }
    if let Some(level) = params.level {
        if entry.level < level {
            return false;
        }
    }
    in_time_window(entry.ts, params)
}

fn in_time_window(ts: u64, params: &QueryParams) -> bool {
    if let Some(from) = params.from_ts {
        if ts < from {
            return false;
        }
    }
    if let Some(to) = params.to_ts {
        if ts > to {
            return false;
        }
    }
    true
}

pub async fn logs(stores: &Stores, params: &QueryParams) -> Value {
    let ring = stores.logs.ring.read().await;
    let dropped = ring.dropped();
    let iter = ring
        .iter_since(params.since())
        .filter(|(_, entry)| matches_log(entry, params))
        .map(|(id, entry)| (id, entry.clone()));
    let (entries, next_cursor, truncated) = collect_page(iter, params.limit());
    page_json(entries, next_cursor, truncated, dropped)
}

pub async fn network_bodies(stores: &Stores, params: &QueryParams) -> Value {
    let ring = stores.network_bodies.ring.read().await;
    let dropped = ring.dropped();
    let iter = ring
        .iter_since(params.since())
        .filter(|(_, body)| {
            matches_keys(*body, params)
                && params.status.map_or(true, |min| body.status >= min)
                && in_time_window(body.ts, params)
        })
        .map(|(id, body)| (id, body.clone()));
    let (entries, next_cursor, truncated) = collect_page(iter, params.limit());
    page_json(entries, next_cursor, truncated, dropped)
}

/// Groups the page of events by `connection_id`, preserving submission
/// order both across connections (first-seen order) and within one
/// connection's event list (spec invariant 4).
pub async fn websocket_events(stores: &Stores, params: &QueryParams) -> Value {
    let ring = stores.ws_events.ring().read().await;
    let dropped = ring.dropped();
    let iter = ring
        .iter_since(params.since())
        .filter(|(_, event)| matches_keys(*event, params) && in_time_window(event.ts, params))
        .map(|(id, event)| (id, event.clone()));
    let (entries, next_cursor, truncated) = collect_page(iter, params.limit());

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<WebSocketEvent>> = HashMap::new();
    for event in entries {
        groups.entry(event.connection_id.clone()).or_insert_with(|| {
            order.push(event.connection_id.clone());
            Vec::new()
        }).push(event);
    }
    let connections: Vec<Value> = order
        .into_iter()
        .map(|connection_id| {
            let events = groups.remove(&connection_id).unwrap_or_default();
            json!({ "connectionId": connection_id, "events": events })
        })
        .collect();

    json!({
        "connections": connections,
        "nextCursor": next_cursor,
        "truncated": truncated,
        "dropped": dropped,
    })
}

pub async fn actions(stores: &Stores, params: &QueryParams) -> Value {
    let ring = stores.actions.ring.read().await;
    let dropped = ring.dropped();
    let iter = ring
        .iter_since(params.since())
        .filter(|(_, action)| matches_keys(*action, params) && in_time_window(action.ts, params))
        .map(|(id, action)| (id, action.clone()));
    let (entries, next_cursor, truncated) = collect_page(iter, params.limit());
    page_json(entries, next_cursor, truncated, dropped)
}

pub async fn web_vitals(stores: &Stores, params: &QueryParams) -> Value {
    let ring = stores.vitals.ring.read().await;
    let dropped = ring.dropped();
    let iter = ring
        .iter_since(params.since())
        .filter(|(_, vital)| matches_keys(*vital, params) && in_time_window(vital.ts, params))
        .map(|(id, vital)| (id, vital.clone()));
    let (entries, next_cursor, truncated) = collect_page(iter, params.limit());
    page_json(entries, next_cursor, truncated, dropped)
}

pub async fn test_boundaries(stores: &Stores, params: &QueryParams) -> Value {
    let boundaries = stores.test_boundaries.read().await;
    let since = params.since();
    let iter = boundaries
        .iter()
        .enumerate()
        .filter(|(i, boundary)| {
            *i as u64 > since
                && params.test_id.as_deref().map_or(true, |t| t == boundary.test_id)
        })
        .map(|(i, boundary)| (i as u64, boundary.clone()));
    let (entries, next_cursor, truncated) = collect_page(iter, params.limit());
    page_json(entries, next_cursor, truncated, 0)
}

pub async fn tabs(stores: &Stores, params: &QueryParams) -> Value {
    let tabs = stores.tabs.read().await;
    let mut records: Vec<_> = tabs.values().cloned().collect();
    records.sort_by_key(|tab| tab.tab_id);
    let since = params.since();
    let iter = records
        .into_iter()
        .enumerate()
        .filter(|(i, _)| *i as u64 > since)
        .map(|(i, tab)| (i as u64, tab));
    let (entries, next_cursor, truncated) = collect_page(iter, params.limit());
    page_json(entries, next_cursor, truncated, 0)
}

/// Joins `source=network` logs to their matching [`NetworkBody`] by `(url,
/// ts±100ms)`. `LogEntry` carries no structured method field, so matching
/// is by url and timestamp proximity only; misses emit the log alone.
pub async fn correlate_network(stores: &Stores, params: &QueryParams) -> Value {
    let logs_ring = stores.logs.ring.read().await;
    let bodies_ring = stores.network_bodies.ring.read().await;
    let dropped = logs_ring.dropped();
    let bodies: Vec<NetworkBody> = bodies_ring.iter().map(|(_, body)| body.clone()).collect();

    let iter = logs_ring
        .iter_since(params.since())
        .filter(|(_, log)| log.source == LogSource::Network && matches_log(log, params))
        .map(|(id, log)| {
            let matched = bodies.iter().find(|body| body.url == log.url && body.ts.abs_diff(log.ts) <= 100);
            (id, json!({ "log": log, "body": matched }))
        });
    let (entries, next_cursor, truncated) = collect_page(iter, params.limit());
    page_json(entries, next_cursor, truncated, dropped)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorCluster {
    signature: String,
    size: usize,
    first_ts: u64,
    last_ts: u64,
    sample: LogEntry,
}

/// Groups `level=error` logs by [`signature::signature`]. Iterating the
/// same ring contents always yields the same grouping (spec invariant 5).
pub async fn error_clusters(stores: &Stores, params: &QueryParams) -> Value {
    let ring = stores.logs.ring.read().await;
    let mut clusters: HashMap<String, ErrorCluster> = HashMap::new();

    for (_, log) in ring.iter_since(params.since()) {
        if log.level != LogLevel::Error || !matches_log(log, params) {
            continue;
        }
        let sig = signature::signature(&log.message, log.stack.as_deref());
        clusters
            .entry(sig.clone())
            .and_modify(|cluster| {
                cluster.size += 1;
                cluster.first_ts = cluster.first_ts.min(log.ts);
                cluster.last_ts = cluster.last_ts.max(log.ts);
            })
            .or_insert_with(|| ErrorCluster {
                signature: sig,
                size: 1,
                first_ts: log.ts,
                last_ts: log.ts,
                sample: log.clone(),
            });
    }

    let mut clusters: Vec<ErrorCluster> = clusters.into_values().collect();
    clusters.sort_by(|a, b| b.size.cmp(&a.size).then(a.first_ts.cmp(&b.first_ts)));
    clusters.truncate(params.limit());
    json!({ "clusters": clusters })
}

/// Tie-break order for equal `ts` in `timeline` (spec §4.3): actions,
/// then network, then logs, then vitals. Declaration order doubles as
/// derived `Ord` priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TimelinePriority {
    Action,
    Network,
    Log,
    Vital,
}

pub async fn timeline(stores: &Stores, params: &QueryParams) -> Value {
    let actions_ring = stores.actions.ring.read().await;
    let bodies_ring = stores.network_bodies.ring.read().await;
    let logs_ring = stores.logs.ring.read().await;
    let vitals_ring = stores.vitals.ring.read().await;

    let mut items: Vec<(u64, TimelinePriority, Value)> = Vec::new();
    let since = params.since();

    for (_, action) in actions_ring.iter_since(since) {
        if matches_keys(action, params) && in_time_window(action.ts, params) {
            items.push((action.ts, TimelinePriority::Action, json!({ "source": "action", "entry": action })));
        }
    }
    for (_, body) in bodies_ring.iter_since(since) {
        if matches_keys(body, params) && in_time_window(body.ts, params) {
            items.push((body.ts, TimelinePriority::Network, json!({ "source": "network", "entry": body })));
        }
    }
    for (_, log) in logs_ring.iter_since(since) {
        if matches_log(log, params) {
            items.push((log.ts, TimelinePriority::Log, json!({ "source": "log", "entry": log })));
        }
    }
    for (_, vital) in vitals_ring.iter_since(since) {
        if matches_keys(vital, params) && in_time_window(vital.ts, params) {
            items.push((vital.ts, TimelinePriority::Vital, json!({ "source": "vital", "entry": vital })));
        }
    }

    items.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    let limit = params.limit();
    let truncated = items.len() > limit;
    items.truncate(limit);
    let entries: Vec<Value> = items.into_iter().map(|(_, _, value)| value).collect();
    json!({ "entries": entries, "truncated": truncated })
}

pub async fn stream_stats(stores: &Stores) -> Value {
    json!({
        "logs": stores.logs.stats().await,
        "networkBodies": stores.network_bodies.stats().await,
        "websocketEvents": stores.ws_events.stats().await,
        "actions": stores.actions.stats().await,
        "webVitals": stores.vitals.stats().await,
    })
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
