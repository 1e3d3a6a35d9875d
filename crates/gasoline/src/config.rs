// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Configuration for the Gasoline broker.
#[derive(Debug, Clone, clap::Args)]
pub struct GasolineConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "GASOLINE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 7890, env = "GASOLINE_PORT")]
    pub port: u16,

    /// Correlation hint for the active test run (set by CI).
    #[arg(long, env = "GASOLINE_TEST_ID")]
    pub test_id_hint: Option<String>,

    /// Ring buffer capacity for the logs stream.
    #[arg(long, default_value_t = 10_000, env = "GASOLINE_LOGS_CAP")]
    pub logs_cap: usize,

    /// Ring buffer capacity for the network-bodies stream.
    #[arg(long, default_value_t = 2_000, env = "GASOLINE_NETWORK_BODIES_CAP")]
    pub network_bodies_cap: usize,

    /// Ring buffer capacity for the websocket-events stream.
    #[arg(long, default_value_t = 5_000, env = "GASOLINE_WS_EVENTS_CAP")]
    pub ws_events_cap: usize,

    /// Ring buffer capacity for the enhanced-actions stream.
    #[arg(long, default_value_t = 5_000, env = "GASOLINE_ACTIONS_CAP")]
    pub actions_cap: usize,

    /// Ring buffer capacity for the web-vitals stream.
    #[arg(long, default_value_t = 1_000, env = "GASOLINE_VITALS_CAP")]
    pub vitals_cap: usize,

    /// Maximum entries accepted in a single ingest batch.
    #[arg(long, default_value_t = 500, env = "GASOLINE_MAX_BATCH_ENTRIES")]
    pub max_batch_entries: usize,

    /// Long-poll wait for `GET /sync`, in milliseconds.
    #[arg(long, default_value_t = 25_000, env = "GASOLINE_LONG_POLL_TIMEOUT_MS")]
    pub long_poll_timeout_ms: u64,

    /// Wall deadline for a queued command, in milliseconds.
    #[arg(long, default_value_t = 30_000, env = "GASOLINE_COMMAND_DEADLINE_MS")]
    pub command_deadline_ms: u64,

    /// TTL for the `by_test` index after a test boundary ends, in seconds.
    #[arg(long, default_value_t = 300, env = "GASOLINE_TEST_INDEX_TTL_SECS")]
    pub test_index_ttl_secs: u64,

    /// Extra origins (beyond the built-in internal browser schemes) treated
    /// as restricted pages.
    #[arg(long, value_delimiter = ',', env = "GASOLINE_RESTRICTED_ORIGINS")]
    pub restricted_origins: Vec<String>,
}

impl Default for GasolineConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 7890,
            test_id_hint: None,
            logs_cap: 10_000,
            network_bodies_cap: 2_000,
            ws_events_cap: 5_000,
            actions_cap: 5_000,
            vitals_cap: 1_000,
            max_batch_entries: 500,
            long_poll_timeout_ms: 25_000,
            command_deadline_ms: 30_000,
            test_index_ttl_secs: 300,
            restricted_origins: Vec::new(),
        }
    }
}

impl GasolineConfig {
    pub fn long_poll_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.long_poll_timeout_ms)
    }

    pub fn command_deadline(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.command_deadline_ms)
    }

    pub fn test_index_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.test_index_ttl_secs)
    }
}
