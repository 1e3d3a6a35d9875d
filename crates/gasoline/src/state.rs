// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared broker state: the union of C2 (telemetry store), C4 (command
//! bus), and C5 (session tracker) behind one `Arc`, following the
//! teacher's `MuxState` shape.

use tokio_util::sync::CancellationToken;

use crate::command::CommandBus;
use crate::config::GasolineConfig;
use crate::session::SessionTracker;
use crate::store::Stores;

pub struct GasolineState {
    pub config: GasolineConfig,
    pub stores: Stores,
    pub bus: CommandBus,
    pub session: SessionTracker,
    pub shutdown: CancellationToken,
}

impl GasolineState {
    pub fn new(config: GasolineConfig, shutdown: CancellationToken) -> Self {
        let session = SessionTracker::new(config.restricted_origins.clone());
        let stores = Stores::new(&config);
        Self { config, stores, bus: CommandBus::new(), session, shutdown }
    }

    /// `POST /clear`: rotate the session id and reset every buffer.
    pub async fn clear(&self) -> String {
        self.stores.clear(&self.config).await;
        let ids: Vec<String> = self.bus.outstanding_ids().await;
        for id in ids {
            self.bus.cancel(&id).await;
        }
        self.session.rotate_session().await
    }
}
