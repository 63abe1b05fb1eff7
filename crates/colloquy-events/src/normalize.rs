//! The normalization boundary — raw inbound records become canonical
//! [`WorldEvent`]s here, and nowhere else.
//!
//! Inbound records arrive in heterogeneous shapes: content nested under
//! `payload` or spread at the top level, timestamps as epoch numbers or date
//! strings, IDs under `eventId` or `id`, ordering under `sequence` or `tick`.
//! Field-level problems are absorbed with defaults; only a record that is
//! not a JSON object at all is an error.

use serde_json::{Map, Value};
use thiserror::Error;

use colloquy_core::{EventId, SessionId, SyncError};

use crate::kind::EventKind;
use crate::types::{WorldEvent, format_timestamp_ms, now_timestamp};

/// Base fields consumed by normalization; everything else is payload.
const BASE_FIELDS: [&str; 8] = [
    "id",
    "eventId",
    "sessionId",
    "type",
    "sequence",
    "tick",
    "timestamp",
    "payload",
];

/// A record that could not be normalized.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// The record was not a JSON object.
    #[error("record is not a JSON object (got {0})")]
    NotAnObject(&'static str),
}

impl From<NormalizeError> for SyncError {
    fn from(err: NormalizeError) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Coerce a raw inbound record into the canonical [`WorldEvent`] shape.
///
/// Coercions, in order of preference:
/// - id: `eventId` | `id` | fresh UUID v7
/// - session: `sessionId` | `"unknown"`
/// - kind: `type` | `Other("unknown")`
/// - sequence: `sequence` | `tick` | 0
/// - timestamp: RFC 3339 string kept verbatim | epoch-millis number
///   reformatted | current time
/// - payload: nested `payload` object | residual top-level fields
pub fn normalize_event(raw: &Value) -> Result<WorldEvent, NormalizeError> {
    let Some(obj) = raw.as_object() else {
        return Err(NormalizeError::NotAnObject(json_type_name(raw)));
    };

    let id = string_field(obj, "eventId")
        .or_else(|| string_field(obj, "id"))
        .map_or_else(EventId::new, EventId::from);

    let session_id = string_field(obj, "sessionId")
        .map_or_else(|| SessionId::from("unknown"), SessionId::from);

    let kind = string_field(obj, "type").map_or_else(
        || EventKind::Other("unknown".to_owned()),
        |s| EventKind::from(s.as_str()),
    );

    let sequence = integer_field(obj, "sequence")
        .or_else(|| integer_field(obj, "tick"))
        .unwrap_or(0);

    let timestamp = match obj.get("timestamp") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n
            .as_i64()
            .map_or_else(now_timestamp, format_timestamp_ms),
        _ => now_timestamp(),
    };

    let payload = match obj.get("payload") {
        Some(Value::Object(map)) => Value::Object(map.clone()),
        // Top-level shape: everything that is not a base field is content.
        _ => Value::Object(
            obj.iter()
                .filter(|(k, _)| !BASE_FIELDS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<String, Value>>(),
        ),
    };

    Ok(WorldEvent {
        id,
        session_id,
        kind,
        sequence,
        timestamp,
        payload,
    })
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_owned)
}

#[allow(clippy::cast_possible_truncation)]
fn integer_field(obj: &Map<String, Value>, key: &str) -> Option<i64> {
    let value = obj.get(key)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
