// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session & boundary tracker (C5): the active session id, the current
//! test id, the tab table, and the restricted-page / target-resolution
//! policy that the command bus (C4) consults before dispatching.

use tokio::sync::RwLock;

use crate::model::{epoch_ms, TabRecord};
use crate::store::Stores;

/// Internal browser schemes that forbid content scripts, regardless of
/// configuration.
const RESTRICTED_SCHEMES: &[&str] = &["chrome://", "about:", "edge://", "view-source:"];

/// Where a resolved target tab id came from (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSource {
    ExplicitTab,
    TrackedTab,
    ActiveTab,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TargetResolution {
    pub tab_id: u64,
    pub url: String,
    pub source: TargetSource,
}

/// Why target resolution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetError {
    /// Neither a tracked tab nor an active tab is known.
    ResolutionFailed,
    /// The resolved tab id is `0`.
    MissingTarget,
}

pub struct SessionTracker {
    session_id: RwLock<String>,
    current_test_id: RwLock<Option<String>>,
    last_tracked_tab: RwLock<Option<u64>>,
    active_tab: RwLock<Option<u64>>,
    restricted_origins: Vec<String>,
}

impl SessionTracker {
    pub fn new(restricted_origins: Vec<String>) -> Self {
        Self {
            session_id: RwLock::new(uuid::Uuid::new_v4().to_string()),
            current_test_id: RwLock::new(None),
            last_tracked_tab: RwLock::new(None),
            active_tab: RwLock::new(None),
            restricted_origins,
        }
    }

    pub async fn session_id(&self) -> String {
        self.session_id.read().await.clone()
    }

    /// Rotate to a fresh session id, clearing test/tab tracking state
    /// (`POST /clear` or process restart).
    pub async fn rotate_session(&self) -> String {
        let new_id = uuid::Uuid::new_v4().to_string();
        *self.session_id.write().await = new_id.clone();
        *self.current_test_id.write().await = None;
        *self.last_tracked_tab.write().await = None;
        *self.active_tab.write().await = None;
        new_id
    }

    pub async fn current_test_id(&self) -> Option<String> {
        self.current_test_id.read().await.clone()
    }

    pub async fn start_test(&self, test_id: String) {
        *self.current_test_id.write().await = Some(test_id);
    }

    pub async fn end_test(&self) {
        *self.current_test_id.write().await = None;
    }

    /// Record that an `Action` was observed on `tab_id` — this is what
    /// makes it the "last tracked tab" for target resolution.
    pub async fn note_action_tab(&self, tab_id: u64) {
        *self.last_tracked_tab.write().await = Some(tab_id);
    }

    /// Record the polling extension's advertised active tab.
    pub async fn set_active_tab(&self, tab_id: u64) {
        *self.active_tab.write().await = Some(tab_id);
    }

    /// Upsert a tab's record from any ingested payload bearing a `tab_id`.
    pub async fn touch_tab(&self, stores: &Stores, tab_id: u64, url: Option<String>) {
        let restricted = url.as_deref().map(|u| self.is_restricted(u)).unwrap_or(false);
        let mut tabs = stores.tabs.write().await;
        let now = epoch_ms();
        match tabs.get_mut(&tab_id) {
            Some(record) => {
                if let Some(url) = url {
                    record.restricted = self.is_restricted(&url);
                    record.url = url;
                }
                record.last_seen_ts = now;
                record.tracked = true;
            }
            None => {
                tabs.insert(
                    tab_id,
                    TabRecord {
                        tab_id,
                        url: url.unwrap_or_default(),
                        title: None,
                        tracked: true,
                        last_seen_ts: now,
                        restricted,
                    },
                );
            }
        }
    }

    /// Whether `url` is a restricted page: an internal browser scheme, or
    /// a configured restricted origin.
    pub fn is_restricted(&self, url: &str) -> bool {
        if RESTRICTED_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
            return true;
        }
        self.restricted_origins.iter().any(|origin| url.starts_with(origin.as_str()))
    }

    /// Resolve a command's target tab with precedence: explicit tab id in
    /// params, then the last-tracked tab, then the active tab.
    pub async fn resolve_target(
        &self,
        stores: &Stores,
        explicit_tab_id: Option<u64>,
    ) -> Result<TargetResolution, TargetError> {
        if let Some(tab_id) = explicit_tab_id {
            return self.resolve_with_source(stores, tab_id, TargetSource::ExplicitTab).await;
        }
        if let Some(tab_id) = *self.last_tracked_tab.read().await {
            return self.resolve_with_source(stores, tab_id, TargetSource::TrackedTab).await;
        }
        if let Some(tab_id) = *self.active_tab.read().await {
            return self.resolve_with_source(stores, tab_id, TargetSource::ActiveTab).await;
        }
        Err(TargetError::ResolutionFailed)
    }

    async fn resolve_with_source(
        &self,
        stores: &Stores,
        tab_id: u64,
        source: TargetSource,
    ) -> Result<TargetResolution, TargetError> {
        if tab_id == 0 {
            return Err(TargetError::MissingTarget);
        }
        let url = stores.tabs.read().await.get(&tab_id).map(|t| t.url.clone()).unwrap_or_default();
        Ok(TargetResolution { tab_id, url, source })
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
