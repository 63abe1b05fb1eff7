//! The [`WorldEvent`] and [`StateSnapshot`] structs — the two facts the
//! authoritative simulation emits.
//!
//! Both are flat structs with base fields at the top level and event-specific
//! data as opaque [`serde_json::Value`], matching the wire format exactly.
//! A `WorldEvent` is immutable once it has passed the normalization boundary.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use colloquy_core::{EventId, SessionId};

use crate::kind::EventKind;

/// One atomic, sequenced fact describing a state change in a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldEvent {
    /// Unique event ID.
    pub id: EventId,
    /// Session this event belongs to.
    pub session_id: SessionId,
    /// Event kind discriminator.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Monotonic sequence number within the session.
    pub sequence: i64,
    /// RFC 3339 timestamp with millisecond precision.
    pub timestamp: String,
    /// Event-specific data (opaque JSON object).
    pub payload: Value,
}

impl WorldEvent {
    /// Millisecond epoch value of [`timestamp`](Self::timestamp), if it
    /// parses. Used for replay duration math.
    #[must_use]
    pub fn timestamp_ms(&self) -> Option<i64> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.timestamp_millis())
    }

    /// A string field from the payload, if present.
    #[must_use]
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

/// Format an epoch-milliseconds value as the canonical RFC 3339 string.
#[must_use]
pub fn format_timestamp_ms(epoch_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms)
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The current UTC time as the canonical RFC 3339 string.
#[must_use]
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// An out-of-band full-state fact used to fast-forward a client that lacks
/// event history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// Session this snapshot describes.
    pub session_id: SessionId,
    /// Opaque world-state map from the simulation.
    #[serde(default)]
    pub world_state: Map<String, Value>,
    /// Simulation tick the snapshot was taken at.
    #[serde(default)]
    pub tick: i64,
    /// Whether the simulation has terminated.
    #[serde(default)]
    pub is_terminated: bool,
    /// Why the simulation terminated, when it has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_reason: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
