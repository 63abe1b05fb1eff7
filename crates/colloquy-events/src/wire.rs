//! Wire-format messages for the session subscription protocol.
//!
//! Inbound frames are tagged with a top-level `type`; the event kind of a
//! `world_event` lives inside its `data` record and never collides with the
//! frame tag. Outbound commands use a request/ack envelope correlated by
//! request ID.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use colloquy_core::{RequestId, SessionId};

use crate::types::StateSnapshot;

/// A frame pushed by the server over the session subscription.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A sequenced world event. `data` is the raw record; it goes through
    /// the normalization boundary before touching the reducer.
    WorldEvent {
        /// Raw event record.
        data: Value,
    },
    /// An out-of-band state snapshot.
    StateUpdate {
        /// The snapshot fields, flattened into the frame.
        #[serde(flatten)]
        snapshot: StateSnapshot,
    },
    /// The simulation ended.
    SimulationEnded {
        /// Which session ended.
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        /// Why it ended.
        reason: String,
    },
    /// Response to a resync-flagged join: full state plus event backlog.
    FullState {
        /// Which session this state describes.
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        /// Opaque world-state map.
        #[serde(rename = "worldState", default)]
        world_state: Map<String, Value>,
        /// Raw backlog event records, oldest first.
        #[serde(default)]
        events: Vec<Value>,
    },
    /// Acknowledgement of an outbound command.
    Ack {
        /// The ack body.
        #[serde(flatten)]
        ack: CommandAck,
    },
}

/// An outbound command request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    /// Unique request identifier, echoed back in the ack.
    pub id: RequestId,
    /// Method name (e.g. `join_session`).
    pub method: String,
    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl CommandRequest {
    /// Build a request with a fresh ID.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id: RequestId::new(),
            method: method.into(),
            params,
        }
    }

    /// Join a session, optionally requesting a full-state resync.
    #[must_use]
    pub fn join_session(session_id: &SessionId, request_full_state: bool) -> Self {
        Self::new(
            "join_session",
            Some(json!({
                "sessionId": session_id.as_str(),
                "requestFullState": request_full_state,
            })),
        )
    }

    /// Submit a participant intent for the current round.
    #[must_use]
    pub fn submit_intent(session_id: &SessionId, intent: &str) -> Self {
        Self::new(
            "submit_intent",
            Some(json!({"sessionId": session_id.as_str(), "intent": intent})),
        )
    }

    /// Call on a specific agent as moderator.
    #[must_use]
    pub fn moderator_call(session_id: &SessionId, agent_id: &str) -> Self {
        Self::new(
            "moderator_call",
            Some(json!({"sessionId": session_id.as_str(), "agentId": agent_id})),
        )
    }

    /// Set the moderator intervention level.
    #[must_use]
    pub fn set_intervention_level(session_id: &SessionId, level: u8) -> Self {
        Self::new(
            "set_intervention_level",
            Some(json!({"sessionId": session_id.as_str(), "level": level})),
        )
    }

    /// Ask the simulation to generate a discussion outline.
    #[must_use]
    pub fn generate_outline(session_id: &SessionId) -> Self {
        Self::new(
            "generate_outline",
            Some(json!({"sessionId": session_id.as_str()})),
        )
    }

    /// Trigger scoring of the discussion so far.
    #[must_use]
    pub fn trigger_scoring(session_id: &SessionId) -> Self {
        Self::new(
            "trigger_scoring",
            Some(json!({"sessionId": session_id.as_str()})),
        )
    }
}

/// Acknowledgement body for a [`CommandRequest`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandAck {
    /// Echoed request identifier.
    pub id: RequestId,
    /// Whether the command succeeded.
    pub success: bool,
    /// Result payload (present when `success == true`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error message (present when `success == false`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The caller-facing outcome of a command: always a value, never an `Err`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Whether the command was acknowledged successfully.
    pub success: bool,
    /// Error message for a failed command.
    pub error: Option<String>,
}

impl CommandOutcome {
    /// A successful outcome.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// A failed outcome with an error message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

impl From<&CommandAck> for CommandOutcome {
    fn from(ack: &CommandAck) -> Self {
        Self {
            success: ack.success,
            error: ack.error.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Inbound frames ──────────────────────────────────────────────

    #[test]
    fn wire_format_world_event_frame() {
        let raw = r#"{
            "type": "world_event",
            "data": {"eventId": "evt_1", "sessionId": "s1", "type": "agent:speaking", "tick": 3, "payload": {"speaker": "a1"}}
        }"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let ServerMessage::WorldEvent { data } = msg else {
            panic!("expected world_event frame");
        };
        assert_eq!(data["type"], "agent:speaking");
        assert_eq!(data["tick"], 3);
    }

    #[test]
    fn wire_format_state_update_frame() {
        let raw = r#"{
            "type": "state_update",
            "sessionId": "s1",
            "worldState": {"phase": "debate"},
            "tick": 12,
            "isTerminated": false
        }"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let ServerMessage::StateUpdate { snapshot } = msg else {
            panic!("expected state_update frame");
        };
        assert_eq!(snapshot.session_id.as_str(), "s1");
        assert_eq!(snapshot.tick, 12);
        assert!(!snapshot.is_terminated);
    }

    #[test]
    fn wire_format_simulation_ended_frame() {
        let raw = r#"{"type": "simulation_ended", "sessionId": "s1", "reason": "max rounds"}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let ServerMessage::SimulationEnded { session_id, reason } = msg else {
            panic!("expected simulation_ended frame");
        };
        assert_eq!(session_id.as_str(), "s1");
        assert_eq!(reason, "max rounds");
    }

    #[test]
    fn wire_format_full_state_frame() {
        let raw = r#"{
            "type": "full_state",
            "sessionId": "s1",
            "worldState": {"round": 2},
            "events": [{"eventId": "e1", "type": "round:start"}, {"eventId": "e2", "type": "agent:speaking"}]
        }"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let ServerMessage::FullState {
            session_id, events, ..
        } = msg
        else {
            panic!("expected full_state frame");
        };
        assert_eq!(session_id.as_str(), "s1");
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn wire_format_ack_frame() {
        let raw = r#"{"type": "ack", "id": "req_1", "success": true, "result": {"joined": true}}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let ServerMessage::Ack { ack } = msg else {
            panic!("expected ack frame");
        };
        assert_eq!(ack.id.as_str(), "req_1");
        assert!(ack.success);
        assert_eq!(ack.result.unwrap()["joined"], true);
    }

    #[test]
    fn unknown_frame_type_is_a_parse_error() {
        let raw = r#"{"type": "weather_report", "sessionId": "s1"}"#;
        assert!(serde_json::from_str::<ServerMessage>(raw).is_err());
    }

    #[test]
    fn full_state_defaults_missing_collections() {
        let raw = r#"{"type": "full_state", "sessionId": "s1"}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let ServerMessage::FullState {
            world_state,
            events,
            ..
        } = msg
        else {
            panic!("expected full_state frame");
        };
        assert!(world_state.is_empty());
        assert!(events.is_empty());
    }

    // ── Outbound requests ───────────────────────────────────────────

    #[test]
    fn join_session_request_shape() {
        let req = CommandRequest::join_session(&SessionId::from("sess_9"), true);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["method"], "join_session");
        assert_eq!(v["params"]["sessionId"], "sess_9");
        assert_eq!(v["params"]["requestFullState"], true);
        assert!(v["id"].is_string());
    }

    #[test]
    fn submit_intent_request_shape() {
        let req = CommandRequest::submit_intent(&SessionId::from("s"), "challenge the premise");
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["method"], "submit_intent");
        assert_eq!(v["params"]["intent"], "challenge the premise");
    }

    #[test]
    fn moderator_command_shapes() {
        let sid = SessionId::from("s");
        assert_eq!(
            serde_json::to_value(CommandRequest::moderator_call(&sid, "a3")).unwrap()["method"],
            "moderator_call"
        );
        assert_eq!(
            serde_json::to_value(CommandRequest::set_intervention_level(&sid, 2)).unwrap()
                ["params"]["level"],
            2
        );
        assert_eq!(
            serde_json::to_value(CommandRequest::generate_outline(&sid)).unwrap()["method"],
            "generate_outline"
        );
        assert_eq!(
            serde_json::to_value(CommandRequest::trigger_scoring(&sid)).unwrap()["method"],
            "trigger_scoring"
        );
    }

    #[test]
    fn request_ids_are_unique() {
        let a = CommandRequest::generate_outline(&SessionId::from("s"));
        let b = CommandRequest::generate_outline(&SessionId::from("s"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn request_without_params_omits_field() {
        let req = CommandRequest::new("ping", None);
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("params"));
    }

    // ── Acks and outcomes ───────────────────────────────────────────

    #[test]
    fn failed_ack_round_trips_error() {
        let raw = r#"{"id": "req_2", "success": false, "error": "session not found"}"#;
        let ack: CommandAck = serde_json::from_str(raw).unwrap();
        assert!(!ack.success);
        assert_eq!(ack.error.as_deref(), Some("session not found"));
        assert!(ack.result.is_none());
    }

    #[test]
    fn outcome_from_ack() {
        let ack = CommandAck {
            id: RequestId::from("r"),
            success: false,
            result: None,
            error: Some("nope".into()),
        };
        let outcome = CommandOutcome::from(&ack);
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("nope"));
    }

    #[test]
    fn outcome_constructors() {
        assert!(CommandOutcome::ok().success);
        let failed = CommandOutcome::failed("Not connected");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("Not connected"));
    }
}
