// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Configuration for a [`crate::connection::Connection`].
///
/// Mirrors the teacher's `MuxConfig` (`clap::Args`, env-overridable defaults); unlike
/// `MuxConfig` this is consumed directly by library callers as well as by `sharedb-cli`.
#[derive(Debug, Clone, clap::Args)]
pub struct ClientConfig {
    /// WebSocket URL of the ShareDB server (e.g. `ws://host:port`).
    #[arg(long, env = "SHAREDB_URL")]
    pub url: String,

    /// Reconnect automatically on socket close.
    #[arg(long, default_value_t = true, env = "SHAREDB_RECONNECT")]
    pub reconnect: bool,

    /// Initial reconnect backoff, in milliseconds.
    #[arg(long, default_value_t = 100, env = "SHAREDB_RECONNECT_BACKOFF_MS")]
    pub reconnect_backoff_ms: u64,

    /// Reconnect backoff ceiling, in milliseconds.
    #[arg(long, default_value_t = 5000, env = "SHAREDB_RECONNECT_BACKOFF_MAX_MS")]
    pub reconnect_backoff_max_ms: u64,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        ClientConfig {
            url: url.into(),
            reconnect: true,
            reconnect_backoff_ms: 100,
            reconnect_backoff_max_ms: 5000,
        }
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_max_ms)
    }
}
