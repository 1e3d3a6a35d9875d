// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command bus (C4): queues commands for long-poll delivery to the
//! capture script and resolves their results back to the caller.
//!
//! Two independent one-shot capabilities guard the lifecycle so a command
//! is delivered at most once and resolved exactly once, even if the
//! long-poll endpoint and the deadline sweeper race each other.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::Instant;

use crate::error::GasolineError;
use crate::model::epoch_ms;

use super::types::{CommandKind, DispatchedCommand, PendingQuery, QueryState};

impl PendingQuery {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            QueryState::Complete | QueryState::Error | QueryState::Timeout | QueryState::Cancelled
        )
    }
}

/// A capability token that can be claimed exactly once.
struct DispatchGuard(AtomicBool);

impl DispatchGuard {
    fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Attempt to claim the guard. Returns `true` only for the caller that
    /// wins the race.
    fn claim(&self) -> bool {
        self.0.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }
}

struct QueryEntry {
    query: Mutex<PendingQuery>,
    dispatch_guard: DispatchGuard,
    terminal_guard: DispatchGuard,
    done: Notify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    UnknownQuery,
    AlreadyTerminal,
}

pub struct CommandBus {
    entries: RwLock<HashMap<String, Arc<QueryEntry>>>,
    queue: Mutex<VecDeque<String>>,
    notify_new: Notify,
}

impl CommandBus {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            queue: Mutex::new(VecDeque::new()),
            notify_new: Notify::new(),
        }
    }

    /// Queue a command for delivery. Returns the new query id.
    pub async fn enqueue(
        &self,
        kind: CommandKind,
        params: serde_json::Value,
        tab_id: Option<u64>,
    ) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let query = PendingQuery {
            id: id.clone(),
            kind,
            params,
            tab_id,
            state: QueryState::Queued,
            created_ts: epoch_ms(),
            result: None,
            error: None,
        };
        let entry = Arc::new(QueryEntry {
            query: Mutex::new(query),
            dispatch_guard: DispatchGuard::new(),
            terminal_guard: DispatchGuard::new(),
            done: Notify::new(),
        });
        self.entries.write().await.insert(id.clone(), entry);
        self.queue.lock().await.push_back(id.clone());
        self.notify_new.notify_waiters();
        id
    }

    /// Long-poll for the next dispatchable command (`GET /sync`), waiting
    /// up to `wait` for one to arrive.
    pub async fn poll_next(&self, wait: Duration) -> Option<DispatchedCommand> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(cmd) = self.try_dispatch_next().await {
                return Some(cmd);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let notified = self.notify_new.notified();
            let _ = tokio::time::timeout(remaining, notified).await;
        }
    }

    async fn try_dispatch_next(&self) -> Option<DispatchedCommand> {
        loop {
            let id = self.queue.lock().await.pop_front()?;
            let entry = self.entries.read().await.get(&id).cloned();
            let Some(entry) = entry else { continue };
            if !entry.dispatch_guard.claim() {
                continue;
            }
            let mut query = entry.query.lock().await;
            if query.state != QueryState::Queued {
                // cancelled before delivery
                continue;
            }
            // Commands outside the closed catalog are accepted at
            // submission time but rejected here, at dispatch (spec
            // REDESIGN FLAGS: a static registry never defers "unknown
            // command" to a browser round trip).
            if query.kind.is_unknown() {
                if entry.terminal_guard.claim() {
                    query.state = QueryState::Error;
                    query.error = Some(GasolineError::UnknownQueryType);
                    drop(query);
                    entry.done.notify_waiters();
                }
                continue;
            }
            query.state = QueryState::Dispatched;
            return Some(DispatchedCommand {
                id: query.id.clone(),
                command: query.kind.clone(),
                params: query.params.clone(),
                tab_id: query.tab_id,
            });
        }
    }

    /// Ids of every query not yet in a terminal state (used by `POST
    /// /clear` to cancel outstanding work on session reset, spec §5).
    pub async fn outstanding_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for (id, entry) in self.entries.read().await.iter() {
            if !entry.query.lock().await.is_terminal() {
                ids.push(id.clone());
            }
        }
        ids
    }

    /// Resolve a command's result, logging the at-most-once lifecycle
    /// transition (spec §4.4 point 3: `{query_id, correlation_id, via,
    /// status}`). Used by the `POST /sync` handler in place of calling
    /// [`Self::submit_result`] directly.
    pub async fn submit_result_logged(
        &self,
        id: &str,
        correlation_id: Option<&str>,
        via: &str,
        outcome: Result<serde_json::Value, GasolineError>,
    ) -> Result<(), SubmitError> {
        let status = match &outcome {
            Ok(_) => "complete",
            Err(_) => "error",
        };
        match self.submit_result(id, outcome).await {
            Ok(()) => {
                tracing::debug!(query_id = id, correlation_id, via, status, "command resolved");
                Ok(())
            }
            Err(SubmitError::AlreadyTerminal) => {
                tracing::debug!(
                    query_id = id,
                    correlation_id,
                    via,
                    status,
                    "ignoring terminal result for already-resolved command"
                );
                Err(SubmitError::AlreadyTerminal)
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve a command's result (`POST /sync`). Fails if the id is
    /// unknown or has already been resolved by another caller.
    pub async fn submit_result(
        &self,
        id: &str,
        outcome: Result<serde_json::Value, GasolineError>,
    ) -> Result<(), SubmitError> {
        let entry = self
            .entries
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(SubmitError::UnknownQuery)?;
        if !entry.terminal_guard.claim() {
            return Err(SubmitError::AlreadyTerminal);
        }
        let mut query = entry.query.lock().await;
        match outcome {
            Ok(result) => {
                query.state = QueryState::Complete;
                query.result = Some(result);
            }
            Err(err) => {
                query.state = QueryState::Error;
                query.error = Some(err);
            }
        }
        drop(query);
        entry.done.notify_waiters();
        Ok(())
    }

    /// Block until `id` reaches a terminal state, or `wait` elapses (in
    /// which case the query is itself marked `timeout`).
    pub async fn await_result(&self, id: &str, wait: Duration) -> Option<PendingQuery> {
        let entry = self.entries.read().await.get(id).cloned()?;
        let deadline = Instant::now() + wait;
        loop {
            let notified = entry.done.notified();
            {
                let query = entry.query.lock().await;
                if query.is_terminal() {
                    return Some(query.clone());
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || tokio::time::timeout(remaining, notified).await.is_err() {
                if entry.terminal_guard.claim() {
                    let mut query = entry.query.lock().await;
                    query.state = QueryState::Timeout;
                    return Some(query.clone());
                }
                let query = entry.query.lock().await;
                return Some(query.clone());
            }
        }
    }

    /// Cancel a command outright (e.g. on session rotation). Returns
    /// `false` if it had already reached a terminal state.
    pub async fn cancel(&self, id: &str) -> bool {
        let Some(entry) = self.entries.read().await.get(id).cloned() else {
            return false;
        };
        if !entry.terminal_guard.claim() {
            return false;
        }
        let mut query = entry.query.lock().await;
        query.state = QueryState::Cancelled;
        drop(query);
        entry.done.notify_waiters();
        true
    }

    pub async fn snapshot(&self, id: &str) -> Option<PendingQuery> {
        let entry = self.entries.read().await.get(id).cloned()?;
        Some(entry.query.lock().await.clone())
    }

    /// Time out any command still pending past `command_deadline_ms`, and
    /// drop entries that have been terminal for longer than `retain_ms` so
    /// the map doesn't grow without bound.
    pub async fn sweep(&self, command_deadline_ms: u64, retain_ms: u64) {
        let now = epoch_ms();
        let mut stale = Vec::new();
        {
            let entries = self.entries.read().await;
            for (id, entry) in entries.iter() {
                let mut query = entry.query.lock().await;
                let age = now.saturating_sub(query.created_ts);
                let was_terminal = query.is_terminal();
                if !was_terminal && age > command_deadline_ms && entry.terminal_guard.claim() {
                    query.state = QueryState::Timeout;
                    drop(query);
                    entry.done.notify_waiters();
                    if age > retain_ms {
                        stale.push(id.clone());
                    }
                } else if was_terminal && age > retain_ms {
                    stale.push(id.clone());
                }
            }
        }
        if !stale.is_empty() {
            let mut entries = self.entries.write().await;
            for id in stale {
                entries.remove(&id);
            }
        }
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
