//! Error hierarchy for the sync subsystem.
//!
//! [`SyncError`] covers every failure the connection layer can surface.
//! Command-level failures (an ack with `success: false`) are deliberately
//! *not* represented here: they are ordinary return values
//! (`CommandOutcome`), because a rejected moderator command is part of the
//! protocol, not a fault in it.

use thiserror::Error;

/// Errors surfaced by the sync subsystem.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No bearer token was available at connect time.
    ///
    /// Fatal for that attempt: no handshake is made and no retry is
    /// scheduled until the caller connects again with a token in place.
    #[error("no authentication token available")]
    AuthenticationMissing,

    /// The transport failed to establish or hold a connection.
    ///
    /// Recoverable: the connection manager schedules a backoff retry.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The reconnect attempt ceiling was reached.
    ///
    /// Terminal: a fresh caller-initiated `connect()` is required.
    #[error("reconnect attempts exhausted after {attempts} tries")]
    ReconnectExhausted {
        /// How many attempts were made before giving up.
        attempts: u32,
    },

    /// A `connect()` call arrived while another attempt was in flight.
    #[error("a connection attempt is already in progress")]
    ConnectInProgress,

    /// An inbound record could not be normalized into a `WorldEvent`.
    #[error("malformed inbound record: {0}")]
    Parse(String),
}

impl SyncError {
    /// Whether the connection manager may recover from this error on its
    /// own (via scheduled reconnect) or must wait for the caller.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
