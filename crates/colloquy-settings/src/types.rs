//! Settings type definitions.
//!
//! Every field has a compiled default so a missing or partial settings file
//! always yields a usable configuration.

use serde::{Deserialize, Serialize};

use colloquy_core::backoff::{
    DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS,
};

/// Default WebSocket endpoint.
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8900/ws";
/// Default request/ack timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
/// Default coalescing window in milliseconds.
pub const DEFAULT_COALESCE_WINDOW_MS: u64 = 50;
/// Default replay base tick in milliseconds.
pub const DEFAULT_BASE_TICK_MS: u64 = 1000;

/// Top-level settings for the sync client.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    /// Connection and reconnection settings.
    pub connection: ConnectionSettings,
    /// Event coalescer settings.
    pub coalescer: CoalescerSettings,
    /// Replay settings.
    pub replay: ReplaySettings,
}

/// Connection and reconnection settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionSettings {
    /// WebSocket endpoint URL.
    pub url: String,
    /// Delay before the first reconnect attempt in ms.
    pub initial_delay_ms: u64,
    /// Upper bound on any reconnect delay in ms.
    pub max_delay_ms: u64,
    /// Reconnect attempt ceiling.
    pub max_attempts: u32,
    /// How long to wait for a command ack in ms.
    pub request_timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_owned(),
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

/// Event coalescer settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoalescerSettings {
    /// Buffering window in ms before a batch flush.
    pub window_ms: u64,
}

impl Default for CoalescerSettings {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_COALESCE_WINDOW_MS,
        }
    }
}

/// Replay settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplaySettings {
    /// Base tick length in ms (one event per tick at 1× speed).
    pub base_tick_ms: u64,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            base_tick_ms: DEFAULT_BASE_TICK_MS,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
