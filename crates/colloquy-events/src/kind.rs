//! The [`EventKind`] enum — event type discriminators.
//!
//! Known kinds carry exact colon-separated wire strings (e.g.
//! `"agent:speaking"`). Anything else round-trips through
//! [`EventKind::Other`] so the reducer can append-and-ignore event types it
//! has no rules for. `"agent:speak"` is a legacy spelling of
//! `"agent:speaking"` and is canonicalized on parse.

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use std::fmt;

/// Discriminator for a [`WorldEvent`](crate::WorldEvent).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An agent took the floor (`agent:speaking`, legacy `agent:speak`).
    AgentSpeaking,
    /// An agent is composing (`agent:thinking`).
    AgentThinking,
    /// The current speaker finished (`agent:done`).
    AgentDone,
    /// The turn closed (`turn:end`).
    TurnEnd,
    /// A new round began (`round:start`).
    RoundStart,
    /// Any kind without reducer rules; appended to the log verbatim.
    Other(String),
}

impl EventKind {
    /// The canonical wire string for this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AgentSpeaking => "agent:speaking",
            Self::AgentThinking => "agent:thinking",
            Self::AgentDone => "agent:done",
            Self::TurnEnd => "turn:end",
            Self::RoundStart => "round:start",
            Self::Other(s) => s,
        }
    }

    /// Whether this kind resets or changes agent speaking status.
    #[must_use]
    pub fn touches_agent_status(&self) -> bool {
        matches!(
            self,
            Self::AgentSpeaking | Self::AgentThinking | Self::AgentDone | Self::TurnEnd
        )
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        match s {
            "agent:speaking" | "agent:speak" => Self::AgentSpeaking,
            "agent:thinking" => Self::AgentThinking,
            "agent:done" => Self::AgentDone,
            "turn:end" => Self::TurnEnd,
            "round:start" => Self::RoundStart,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kinds_round_trip() {
        for s in [
            "agent:speaking",
            "agent:thinking",
            "agent:done",
            "turn:end",
            "round:start",
        ] {
            let kind = EventKind::from(s);
            assert_eq!(kind.as_str(), s);
        }
    }

    #[test]
    fn legacy_speak_is_canonicalized() {
        assert_eq!(EventKind::from("agent:speak"), EventKind::AgentSpeaking);
        assert_eq!(EventKind::from("agent:speak").as_str(), "agent:speaking");
    }

    #[test]
    fn unknown_kind_passes_through() {
        let kind = EventKind::from("score:update");
        assert_eq!(kind, EventKind::Other("score:update".into()));
        assert_eq!(kind.as_str(), "score:update");
    }

    #[test]
    fn serde_serializes_as_plain_string() {
        let json = serde_json::to_string(&EventKind::RoundStart).unwrap();
        assert_eq!(json, "\"round:start\"");
    }

    #[test]
    fn serde_deserializes_unknown_without_error() {
        let kind: EventKind = serde_json::from_str("\"weather:changed\"").unwrap();
        assert_eq!(kind, EventKind::Other("weather:changed".into()));
    }

    #[test]
    fn serde_round_trip_preserves_other() {
        let kind = EventKind::Other("score:update".into());
        let json = serde_json::to_string(&kind).unwrap();
        let back: EventKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }

    #[test]
    fn status_touching_kinds() {
        assert!(EventKind::AgentSpeaking.touches_agent_status());
        assert!(EventKind::TurnEnd.touches_agent_status());
        assert!(!EventKind::RoundStart.touches_agent_status());
        assert!(!EventKind::Other("x".into()).touches_agent_status());
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(format!("{}", EventKind::AgentDone), "agent:done");
    }
}
