// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod command;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod query;
pub mod redact;
pub mod session;
pub mod signature;
pub mod state;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::GasolineConfig;
use state::GasolineState;

/// Initialize `tracing` from `RUST_LOG`, defaulting to `info` (spec
/// §6 "Logging"). Uses `try_init` so it's safe to call more than once,
/// e.g. from integration tests that construct several servers.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// A running broker: its bound address and the handle needed to ask it to
/// stop and wait for that to finish.
pub struct RunningBroker {
    pub state: Arc<GasolineState>,
    pub local_addr: std::net::SocketAddr,
    server: tokio::task::JoinHandle<std::io::Result<()>>,
    sweeper: tokio::task::JoinHandle<()>,
}

impl RunningBroker {
    /// Signal shutdown and wait for the server and background sweepers to
    /// finish.
    pub async fn shutdown(self) {
        self.state.shutdown.cancel();
        let _ = self.server.await;
        let _ = self.sweeper.await;
    }
}

/// Bind and serve the broker. Spawns the command-deadline sweeper and the
/// `by_test` index GC sweep (spec §5 "Task model") alongside the HTTP
/// server, both cancelled from the same `CancellationToken`.
pub async fn run(config: GasolineConfig) -> anyhow::Result<RunningBroker> {
    let shutdown = CancellationToken::new();
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let state = Arc::new(GasolineState::new(config, shutdown.clone()));
    let router = http::build_router(state.clone());

    info!(%local_addr, "gasoline broker listening");

    let sweeper = tokio::spawn(run_sweeper(state.clone()));

    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
    });

    Ok(RunningBroker { state, local_addr, server, sweeper })
}

/// Background task: sweeps timed-out commands off the bus (spec §5
/// "Command deadline") and garbage-collects stale `by_test` index entries
/// (spec §4.2), once per second, until cancelled.
async fn run_sweeper(state: Arc<GasolineState>) {
    const TICK: Duration = Duration::from_secs(1);
    // Retain terminal command entries for ten sweeper ticks past their
    // deadline so a slow `POST /sync` replay still gets the at-most-once
    // no-op response instead of an `unknown query_id`.
    let retain_ms = state.config.command_deadline_ms + TICK.as_millis() as u64 * 10;
    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => return,
            _ = tokio::time::sleep(TICK) => {}
        }
        state.bus.sweep(state.config.command_deadline_ms, retain_ms).await;
        state.stores.gc_test_indices(state.config.test_index_ttl().as_millis() as u64).await;
    }
}
