// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The telemetry store (C2): one bounded ring buffer per stream, plus the
//! auxiliary `by_test`/`by_tab`/`by_severity` indices.

pub mod ring;

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use crate::config::GasolineConfig;
use crate::model::{
    Action, LogEntry, LogLevel, NetworkBody, TabRecord, WebSocketEvent, WebSocketEventKind,
    WebVital, epoch_ms,
};
use ring::{Index, RingStore, StreamStats, Timestamped};

impl Timestamped for LogEntry {
    fn ts(&self) -> u64 {
        self.ts
    }
}
impl Timestamped for NetworkBody {
    fn ts(&self) -> u64 {
        self.ts
    }
}
impl Timestamped for WebSocketEvent {
    fn ts(&self) -> u64 {
        self.ts
    }
}
impl Timestamped for Action {
    fn ts(&self) -> u64 {
        self.ts
    }
}
impl Timestamped for WebVital {
    fn ts(&self) -> u64 {
        self.ts
    }
}

/// Implemented by entities indexed by `by_test`/`by_tab`.
pub trait StreamKeys {
    fn test_id(&self) -> Option<&str>;
    fn tab_id(&self) -> u64;
}

impl StreamKeys for NetworkBody {
    fn test_id(&self) -> Option<&str> {
        self.test_id.as_deref()
    }
    fn tab_id(&self) -> u64 {
        self.tab_id
    }
}
impl StreamKeys for WebSocketEvent {
    fn test_id(&self) -> Option<&str> {
        self.test_id.as_deref()
    }
    fn tab_id(&self) -> u64 {
        self.tab_id
    }
}
impl StreamKeys for Action {
    fn test_id(&self) -> Option<&str> {
        self.test_id.as_deref()
    }
    fn tab_id(&self) -> u64 {
        self.tab_id
    }
}
impl StreamKeys for WebVital {
    fn test_id(&self) -> Option<&str> {
        self.test_id.as_deref()
    }
    fn tab_id(&self) -> u64 {
        self.tab_id
    }
}

/// One stream's ring buffer plus its auxiliary indices.
pub struct LogStream {
    pub ring: RwLock<RingStore<LogEntry>>,
    by_test: RwLock<Index<String>>,
    by_tab: RwLock<Index<u64>>,
    by_severity: RwLock<Index<LogLevel>>,
}

impl LogStream {
    fn new(cap: usize) -> Self {
        Self {
            ring: RwLock::new(RingStore::new(cap)),
            by_test: RwLock::new(Index::new()),
            by_tab: RwLock::new(Index::new()),
            by_severity: RwLock::new(Index::new()),
        }
    }

    /// Build and append an entry. `build` receives the id that will be
    /// assigned, so the stored entry's `id` field and the ring's internal
    /// id sequence never drift apart.
    pub async fn push_with(&self, build: impl FnOnce(u64) -> LogEntry) -> u64 {
        let now = epoch_ms();
        let mut ring = self.ring.write().await;
        let entry = build(ring.next_id());
        let test_id = entry.test_id.clone();
        let tab_id = entry.tab_id;
        let level = entry.level;
        let id = ring.push(entry);
        drop(ring);

        if let Some(test_id) = test_id {
            self.by_test.write().await.record(test_id, id, now);
        }
        self.by_tab.write().await.record(tab_id, id, now);
        self.by_severity.write().await.record(level, id, now);
        id
    }

    pub async fn stats(&self) -> StreamStats {
        self.ring.read().await.stats()
    }

    /// Ids recorded for `test_id`, with stale entries dropped.
    pub async fn ids_for_test(&self, test_id: &str) -> Vec<u64> {
        let base = self.ring.read().await.base_id();
        self.by_test.write().await.ids_for(&test_id.to_owned(), base).to_vec()
    }

    pub async fn ids_for_level(&self, level: LogLevel) -> Vec<u64> {
        let base = self.ring.read().await.base_id();
        self.by_severity.write().await.ids_for(&level, base).to_vec()
    }

    pub async fn gc_test_index(&self, ttl_ms: u64) {
        let base = self.ring.read().await.base_id();
        self.by_test.write().await.gc(base, epoch_ms(), ttl_ms);
    }
}

/// Generic stream wrapper for entities with only a `by_test`/`by_tab` index
/// need (network bodies, actions, web vitals).
pub struct EntityStream<T> {
    pub ring: RwLock<RingStore<T>>,
    by_test: RwLock<Index<String>>,
    by_tab: RwLock<Index<u64>>,
}

impl<T: Timestamped + StreamKeys> EntityStream<T> {
    fn new(cap: usize) -> Self {
        Self {
            ring: RwLock::new(RingStore::new(cap)),
            by_test: RwLock::new(Index::new()),
            by_tab: RwLock::new(Index::new()),
        }
    }

    pub async fn push_with(&self, build: impl FnOnce(u64) -> T) -> u64 {
        let now = epoch_ms();
        let mut ring = self.ring.write().await;
        let value = build(ring.next_id());
        let test_id = value.test_id().map(str::to_owned);
        let tab_id = value.tab_id();
        let id = ring.push(value);
        drop(ring);

        if let Some(test_id) = test_id {
            self.by_test.write().await.record(test_id, id, now);
        }
        self.by_tab.write().await.record(tab_id, id, now);
        id
    }

    pub async fn stats(&self) -> StreamStats {
        self.ring.read().await.stats()
    }

    pub async fn gc_test_index(&self, ttl_ms: u64) {
        let base = self.ring.read().await.base_id();
        self.by_test.write().await.gc(base, epoch_ms(), ttl_ms);
    }
}

/// Websocket-event stream. Tracks which `connection_id`s have already seen
/// a terminal `close` event (spec invariant 5: later events for that
/// connection are rejected).
pub struct WsStream {
    inner: EntityStream<WebSocketEvent>,
    closed_connections: RwLock<HashSet<String>>,
}

impl WsStream {
    fn new(cap: usize) -> Self {
        Self {
            inner: EntityStream::new(cap),
            closed_connections: RwLock::new(HashSet::new()),
        }
    }

    /// Build and append an event, unless its connection already received a
    /// `close`. Returns `Ok(id)`, or `Err(())` if the event was rejected
    /// (the connection is already terminal — spec invariant 5) without
    /// ever calling `build`.
    pub async fn push_with(
        &self,
        connection_id: &str,
        build: impl FnOnce(u64) -> WebSocketEvent,
    ) -> Result<u64, ()> {
        if self.closed_connections.read().await.contains(connection_id) {
            return Err(());
        }
        let mut is_close = false;
        let id = self
            .inner
            .push_with(|id| {
                let event = build(id);
                is_close = event.event == WebSocketEventKind::Close;
                event
            })
            .await;
        if is_close {
            self.closed_connections.write().await.insert(connection_id.to_owned());
        }
        Ok(id)
    }

    pub async fn stats(&self) -> StreamStats {
        self.inner.stats().await
    }

    pub async fn gc_test_index(&self, ttl_ms: u64) {
        self.inner.gc_test_index(ttl_ms).await;
    }

    pub fn ring(&self) -> &RwLock<RingStore<WebSocketEvent>> {
        &self.inner.ring
    }
}

/// All per-stream buffers for one session.
pub struct Stores {
    pub logs: LogStream,
    pub network_bodies: EntityStream<NetworkBody>,
    pub ws_events: WsStream,
    pub actions: EntityStream<Action>,
    pub vitals: EntityStream<WebVital>,
    pub tabs: RwLock<HashMap<u64, TabRecord>>,
    pub test_boundaries: RwLock<Vec<crate::model::TestBoundary>>,
}

impl Stores {
    pub fn new(config: &GasolineConfig) -> Self {
        Self {
            logs: LogStream::new(config.logs_cap),
            network_bodies: EntityStream::new(config.network_bodies_cap),
            ws_events: WsStream::new(config.ws_events_cap),
            actions: EntityStream::new(config.actions_cap),
            vitals: EntityStream::new(config.vitals_cap),
            tabs: RwLock::new(HashMap::new()),
            test_boundaries: RwLock::new(Vec::new()),
        }
    }

    /// Reset all buffers for a new session (`POST /clear`).
    pub async fn clear(&self, config: &GasolineConfig) {
        *self.logs.ring.write().await = RingStore::new(config.logs_cap);
        *self.logs.by_test.write().await = Index::new();
        *self.logs.by_tab.write().await = Index::new();
        *self.logs.by_severity.write().await = Index::new();

        *self.network_bodies.ring.write().await = RingStore::new(config.network_bodies_cap);
        *self.network_bodies.by_test.write().await = Index::new();
        *self.network_bodies.by_tab.write().await = Index::new();

        *self.ws_events.inner.ring.write().await = RingStore::new(config.ws_events_cap);
        *self.ws_events.inner.by_test.write().await = Index::new();
        *self.ws_events.inner.by_tab.write().await = Index::new();
        self.ws_events.closed_connections.write().await.clear();

        *self.actions.ring.write().await = RingStore::new(config.actions_cap);
        *self.actions.by_test.write().await = Index::new();
        *self.actions.by_tab.write().await = Index::new();

        *self.vitals.ring.write().await = RingStore::new(config.vitals_cap);
        *self.vitals.by_test.write().await = Index::new();
        *self.vitals.by_tab.write().await = Index::new();

        self.tabs.write().await.clear();
        self.test_boundaries.write().await.clear();
    }

    /// Reset only the logs buffer (`DELETE /logs`).
    pub async fn clear_logs(&self, config: &GasolineConfig) {
        *self.logs.ring.write().await = RingStore::new(config.logs_cap);
        *self.logs.by_test.write().await = Index::new();
        *self.logs.by_tab.write().await = Index::new();
        *self.logs.by_severity.write().await = Index::new();
    }

    /// Run one GC sweep over every stream's `by_test` index.
    pub async fn gc_test_indices(&self, ttl_ms: u64) {
        self.logs.gc_test_index(ttl_ms).await;
        self.network_bodies.gc_test_index(ttl_ms).await;
        self.ws_events.gc_test_index(ttl_ms).await;
        self.actions.gc_test_index(ttl_ms).await;
        self.vitals.gc_test_index(ttl_ms).await;
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
