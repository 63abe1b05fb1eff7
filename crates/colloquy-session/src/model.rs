//! The [`Session`] and [`Agent`] structs — the client-side view of one
//! discussion session.
//!
//! A session is mutated exclusively by reducer application; the public
//! mutators here enforce the two structural invariants: the event log is
//! append-only and sequence-ordered, and the status machine never moves
//! backwards past `Completed`.

use serde::{Deserialize, Serialize};

use colloquy_core::{AgentId, EventId, SessionId};
use colloquy_events::WorldEvent;

/// Lifecycle status of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created, simulation not yet running.
    Pending,
    /// Simulation running.
    Active,
    /// Simulation paused by a moderator.
    Paused,
    /// Simulation finished; terminal.
    Completed,
}

impl SessionStatus {
    /// Whether the status machine permits moving from `self` to `next`.
    ///
    /// Allowed path: `Pending → Active → {Paused ↔ Active} → Completed`.
    /// `Completed` is terminal.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Active)
                | (Self::Active, Self::Paused | Self::Completed)
                | (Self::Paused, Self::Active | Self::Completed)
        )
    }
}

/// Activity status of an agent, derived from the most recent event naming it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Not currently doing anything.
    #[default]
    Idle,
    /// Composing a contribution.
    Thinking,
    /// Holding the floor.
    Speaking,
}

/// One participant in a discussion session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Agent identifier.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Role within the discussion (e.g. `participant`, `moderator`).
    pub role: String,
    /// Current activity status.
    pub status: AgentStatus,
    /// How many times this agent has spoken.
    pub speak_count: u32,
}

impl Agent {
    /// A fresh idle agent. Name defaults to the ID until the simulation
    /// says otherwise.
    #[must_use]
    pub fn new(id: AgentId) -> Self {
        let name = id.as_str().to_owned();
        Self {
            id,
            name,
            role: "participant".to_owned(),
            status: AgentStatus::Idle,
            speak_count: 0,
        }
    }
}

/// The client-side view of one discussion session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session identifier.
    pub id: SessionId,
    /// Discussion topic.
    pub topic: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Current round number (0 before the first `round:start`).
    pub current_round: u32,
    /// Participants, in join order.
    pub agents: Vec<Agent>,
    /// Accepted events, ordered by sequence.
    pub events: Vec<WorldEvent>,
}

impl Session {
    /// An empty pending session.
    #[must_use]
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            topic: String::new(),
            status: SessionStatus::Pending,
            current_round: 0,
            agents: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Look up an agent by ID.
    #[must_use]
    pub fn agent(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| &a.id == id)
    }

    /// Get or create the agent row for `id`, preserving join order.
    pub fn ensure_agent(&mut self, id: &AgentId) -> &mut Agent {
        let pos = match self.agents.iter().position(|a| &a.id == id) {
            Some(pos) => pos,
            None => {
                self.agents.push(Agent::new(id.clone()));
                self.agents.len() - 1
            }
        };
        &mut self.agents[pos]
    }

    /// Whether an event with this ID has already been accepted.
    #[must_use]
    pub fn contains_event(&self, id: &EventId) -> bool {
        self.events.iter().any(|e| &e.id == id)
    }

    /// Accept an event into the log at its sequence position.
    ///
    /// The log stays ordered by sequence even when events arrive out of
    /// order; equal sequences keep arrival order.
    pub fn accept_event(&mut self, event: WorldEvent) {
        let pos = self
            .events
            .partition_point(|e| e.sequence <= event.sequence);
        self.events.insert(pos, event);
    }

    /// Move to `next` if the status machine allows it; ignore otherwise.
    pub fn advance_status(&mut self, next: SessionStatus) {
        if self.status.can_transition_to(next) {
            self.status = next;
        }
    }

    /// Highest accepted sequence number, if any events have been accepted.
    #[must_use]
    pub fn last_sequence(&self) -> Option<i64> {
        self.events.last().map(|e| e.sequence)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
