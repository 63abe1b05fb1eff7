//! Typed subscription surface for sync consumers.
//!
//! Instead of a bag of callbacks handed into `connect()`, consumers attach
//! independently: connection state is a `watch` channel (always readable,
//! latest value wins) and discrete notices are a `broadcast` channel
//! (attach/detach without disturbing other subscribers).

use colloquy_core::SessionId;

/// Connection lifecycle state, continuously observable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and none pending.
    #[default]
    Disconnected,
    /// First handshake in flight.
    Connecting,
    /// Connected and forwarding.
    Connected,
    /// Waiting out a backoff delay or retrying.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
    },
}

impl ConnectionState {
    /// Whether commands can currently be issued.
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// A discrete event on the sync channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncNotice {
    /// Handshake completed.
    Connected,
    /// The connection dropped (voluntarily or not).
    Disconnected,
    /// A reconnect attempt is being made.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
    },
    /// No token was available at connect time; no retry scheduled.
    AuthenticationMissing,
    /// The reconnect ceiling was reached; a fresh `connect()` is required.
    ReconnectExhausted {
        /// How many attempts were made.
        attempts: u32,
    },
    /// The reduced session state changed.
    SessionUpdated {
        /// Which session changed.
        session_id: SessionId,
    },
    /// The simulation declared the session over.
    SimulationEnded {
        /// Which session ended.
        session_id: SessionId,
        /// The reason given by the simulation.
        reason: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn only_connected_accepts_commands() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(!ConnectionState::Reconnecting { attempt: 2 }.is_connected());
    }

    #[test]
    fn reconnecting_carries_attempt_number() {
        let state = ConnectionState::Reconnecting { attempt: 3 };
        assert_eq!(state, ConnectionState::Reconnecting { attempt: 3 });
        assert_ne!(state, ConnectionState::Reconnecting { attempt: 4 });
    }

    #[test]
    fn notices_compare_by_value() {
        assert_eq!(
            SyncNotice::SessionUpdated {
                session_id: SessionId::from("s1")
            },
            SyncNotice::SessionUpdated {
                session_id: SessionId::from("s1")
            }
        );
        assert_ne!(SyncNotice::Connected, SyncNotice::Disconnected);
    }
}
