//! The session reducer — the pure transition function shared by live
//! updates and replay.
//!
//! `apply` is side-effect-free and safely re-appliable: an event whose ID is
//! already in the log leaves the state untouched, so duplicate delivery
//! after a reconnect cannot double-count anything. Malformed payloads never
//! panic; a missing speaker falls back to the reserved `system` agent.

use tracing::trace;

use colloquy_core::AgentId;
use colloquy_events::{EventKind, StateSnapshot, WorldEvent};

use crate::model::{AgentStatus, Session, SessionStatus};

/// Apply one event to the session, producing the next session state.
///
/// With `state == None` a fresh session is created from the event's session
/// ID; the first accepted event also activates a pending session.
#[must_use]
pub fn apply(state: Option<Session>, event: &WorldEvent) -> Session {
    let mut session =
        state.unwrap_or_else(|| Session::new(event.session_id.clone()));

    // Idempotency: a re-delivered event is a no-op.
    if session.contains_event(&event.id) {
        trace!(event_id = %event.id, "duplicate event ignored");
        return session;
    }

    session.advance_status(SessionStatus::Active);

    match &event.kind {
        EventKind::AgentSpeaking => {
            for agent in &mut session.agents {
                agent.status = AgentStatus::Idle;
            }
            let speaker = speaker_id(event);
            let agent = session.ensure_agent(&speaker);
            agent.status = AgentStatus::Speaking;
            agent.speak_count += 1;
        }
        EventKind::AgentThinking => {
            let speaker = speaker_id(event);
            session.ensure_agent(&speaker).status = AgentStatus::Thinking;
        }
        EventKind::AgentDone | EventKind::TurnEnd => {
            for agent in &mut session.agents {
                agent.status = AgentStatus::Idle;
            }
        }
        EventKind::RoundStart => {
            session.current_round = round_from_payload(event)
                .unwrap_or(session.current_round + 1);
        }
        // No reducer rules: the event still lands in the log.
        EventKind::Other(_) => {}
    }

    session.accept_event(event.clone());
    session
}

/// Apply an out-of-band snapshot.
///
/// A terminated snapshot forces `Completed` regardless of prior status; a
/// mid-flight snapshot never downgrades progress. With `state == None` the
/// snapshot bootstraps a session with no event history.
#[must_use]
pub fn apply_snapshot(state: Option<Session>, snapshot: &StateSnapshot) -> Session {
    let mut session = state.unwrap_or_else(|| {
        let mut fresh = Session::new(snapshot.session_id.clone());
        fresh.status = SessionStatus::Active;
        fresh
    });

    if let Some(topic) = snapshot
        .world_state
        .get("topic")
        .and_then(serde_json::Value::as_str)
    {
        session.topic = topic.to_owned();
    }
    if snapshot.is_terminated {
        session.status = SessionStatus::Completed;
    }
    session
}

/// Fold a sequence of events from an empty initial state.
///
/// Returns `None` for an empty sequence. This is the replay path: seeking
/// re-derives displayed state with this fold, never by mutating forward.
#[must_use]
pub fn fold<'a, I>(events: I) -> Option<Session>
where
    I: IntoIterator<Item = &'a WorldEvent>,
{
    events
        .into_iter()
        .fold(None, |state, event| Some(apply(state, event)))
}

/// The agent an event names, defaulting to the reserved `system` agent.
fn speaker_id(event: &WorldEvent) -> AgentId {
    event
        .payload_str("speaker")
        .map_or_else(AgentId::system, AgentId::from)
}

/// `payload.round` as a round number, if present and non-negative.
#[allow(clippy::cast_possible_truncation)]
fn round_from_payload(event: &WorldEvent) -> Option<u32> {
    event
        .payload
        .get("round")
        .and_then(serde_json::Value::as_u64)
        .map(|r| r.min(u64::from(u32::MAX)) as u32)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
