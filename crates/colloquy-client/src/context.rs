//! The [`SyncContext`] — one explicit object owning the whole live sync
//! stack for one client.
//!
//! Constructed and torn down by the caller; there is no global connection,
//! so independent contexts (and tests) never share hidden state. The
//! context routes inbound frames: world events go through the coalescer
//! and then the reducer, snapshots and full-state rebuilds apply directly,
//! and every state change is announced on the notice channel.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, warn};

use colloquy_core::{Result, SessionId};
use colloquy_events::wire::{CommandOutcome, ServerMessage};
use colloquy_events::{WorldEvent, normalize_event};
use colloquy_session::reducer;
use colloquy_session::{Session, SessionStatus};
use colloquy_settings::SyncSettings;

use crate::coalescer::EventCoalescer;
use crate::connection::ConnectionManager;
use crate::observer::{ConnectionState, SyncNotice};
use crate::transport::{TokenProvider, Transport};

/// Capacity of the internal frame and batch channels.
const CHANNEL_CAPACITY: usize = 256;

/// Owns one connection manager, one coalescer, and the reduced session
/// state.
pub struct SyncContext {
    manager: Arc<ConnectionManager>,
    session: Arc<Mutex<Option<Session>>>,
    notices: broadcast::Sender<SyncNotice>,
}

impl SyncContext {
    /// Build a context from a transport, a token accessor, and settings.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
        settings: SyncSettings,
    ) -> Self {
        let (frame_tx, frame_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (notices, _) = broadcast::channel(CHANNEL_CAPACITY);
        let manager = Arc::new(ConnectionManager::new(
            transport,
            tokens,
            settings.connection.clone(),
            frame_tx,
            notices.clone(),
        ));

        let session = Arc::new(Mutex::new(None));
        let (batch_tx, batch_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let coalescer = EventCoalescer::spawn(
            Duration::from_millis(settings.coalescer.window_ms),
            batch_tx,
        );

        let _ = tokio::spawn(route_frames(
            frame_rx,
            coalescer,
            Arc::clone(&session),
            notices.clone(),
        ));
        let _ = tokio::spawn(apply_batches(
            batch_rx,
            Arc::clone(&session),
            notices.clone(),
        ));

        Self {
            manager,
            session,
            notices,
        }
    }

    /// Establish the connection.
    pub async fn connect(&self) -> Result<()> {
        self.manager.connect().await
    }

    /// Voluntarily disconnect; no reconnection will be attempted.
    pub fn disconnect(&self) {
        self.manager.disconnect();
    }

    /// Join a session. An explicit switch discards the previous session
    /// view.
    pub async fn join(&self, session_id: SessionId) -> CommandOutcome {
        {
            let mut state = self.session.lock();
            if state.as_ref().is_some_and(|s| s.id != session_id) {
                debug!(session_id = %session_id, "switching session, discarding old view");
                *state = None;
            }
        }
        self.manager.join(session_id).await
    }

    /// The connection manager, for issuing moderator commands.
    #[must_use]
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// A snapshot of the reduced session state.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.session.lock().clone()
    }

    /// Subscribe to sync notices. Each subscriber is independent.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotice> {
        self.notices.subscribe()
    }

    /// Watch the connection state.
    #[must_use]
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.manager.state()
    }

    /// The connection state right now.
    #[must_use]
    pub fn current_state(&self) -> ConnectionState {
        self.manager.current_state()
    }
}

impl Drop for SyncContext {
    fn drop(&mut self) {
        self.manager.disconnect();
    }
}

/// Route inbound frames: events to the coalescer, snapshots and rebuilds
/// straight to the session state. Exits when the manager goes away.
async fn route_frames(
    mut frames: mpsc::Receiver<ServerMessage>,
    coalescer: EventCoalescer,
    session: Arc<Mutex<Option<Session>>>,
    notices: broadcast::Sender<SyncNotice>,
) {
    while let Some(frame) = frames.recv().await {
        match frame {
            ServerMessage::WorldEvent { data } => match normalize_event(&data) {
                Ok(event) => coalescer.push(event).await,
                Err(e) => warn!(error = %e, "dropping malformed event record"),
            },
            ServerMessage::StateUpdate { snapshot } => {
                let session_id = snapshot.session_id.clone();
                {
                    let mut state = session.lock();
                    *state = Some(reducer::apply_snapshot(state.take(), &snapshot));
                }
                let _ = notices.send(SyncNotice::SessionUpdated { session_id });
            }
            ServerMessage::FullState {
                session_id,
                world_state,
                events,
            } => {
                let rebuilt = rebuild_session(&session_id, &world_state, &events);
                *session.lock() = Some(rebuilt);
                debug!(session_id = %session_id, events = events.len(), "session rebuilt from full state");
                let _ = notices.send(SyncNotice::SessionUpdated { session_id });
            }
            ServerMessage::SimulationEnded { session_id, reason } => {
                {
                    let mut state = session.lock();
                    if let Some(current) = state.as_mut() {
                        if current.id == session_id {
                            current.status = SessionStatus::Completed;
                        }
                    }
                }
                let _ = notices.send(SyncNotice::SimulationEnded { session_id, reason });
            }
            // Acks are resolved inside the manager and never forwarded.
            ServerMessage::Ack { .. } => {}
        }
    }
}

/// Fold a raw backlog into a fresh session, skipping hopeless records.
fn rebuild_session(
    session_id: &SessionId,
    world_state: &serde_json::Map<String, serde_json::Value>,
    raw_events: &[serde_json::Value],
) -> Session {
    let mut state: Option<Session> = None;
    for raw in raw_events {
        match normalize_event(raw) {
            Ok(event) => state = Some(reducer::apply(state.take(), &event)),
            Err(e) => warn!(error = %e, "skipping malformed backlog record"),
        }
    }
    let mut session = state.unwrap_or_else(|| {
        let mut fresh = Session::new(session_id.clone());
        fresh.status = SessionStatus::Active;
        fresh
    });
    if let Some(topic) = world_state.get("topic").and_then(serde_json::Value::as_str) {
        session.topic = topic.to_owned();
    }
    session
}

/// Apply coalesced batches through the reducer, one notice per batch.
async fn apply_batches(
    mut batches: mpsc::Receiver<Vec<WorldEvent>>,
    session: Arc<Mutex<Option<Session>>>,
    notices: broadcast::Sender<SyncNotice>,
) {
    while let Some(batch) = batches.recv().await {
        let updated = {
            let mut state = session.lock();
            let mut current = state.take();
            for event in &batch {
                // One logical session per client: ignore strays for others.
                let stray = current
                    .as_ref()
                    .is_some_and(|s| s.id != event.session_id);
                if stray {
                    debug!(event_id = %event.id, "ignoring event for another session");
                    continue;
                }
                current = Some(reducer::apply(current.take(), event));
            }
            let updated = current.as_ref().map(|s| s.id.clone());
            *state = current;
            updated
        };
        if let Some(session_id) = updated {
            let _ = notices.send(SyncNotice::SessionUpdated { session_id });
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
