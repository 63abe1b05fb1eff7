//! The transport connection manager — channel lifecycle, handshake, and
//! reconnection policy.
//!
//! Owns the single live transport handle; every other component issues
//! commands through [`ConnectionManager::request`], never against the
//! socket directly. On abnormal disconnect a backoff retry is scheduled up
//! to the configured ceiling; on voluntary disconnect nothing is retried
//! and session affinity is cleared. After any successful handshake with a
//! previously joined session, a `join_session` with `requestFullState` is
//! re-issued and incremental frames for that session are held back until
//! the resulting `full_state` frame has been forwarded.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use colloquy_core::backoff::ReconnectPolicy;
use colloquy_core::{RequestId, Result, SessionId, SyncError};
use colloquy_events::wire::{CommandAck, CommandOutcome, CommandRequest, ServerMessage};
use colloquy_settings::types::ConnectionSettings;

use crate::observer::{ConnectionState, SyncNotice};
use crate::transport::{TokenProvider, Transport};

/// Error message for commands issued without a connection.
pub const NOT_CONNECTED: &str = "Not connected";

/// Manages the single connection to the simulation server.
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
    settings: ConnectionSettings,
    policy: ReconnectPolicy,
    /// Non-ack frames, forwarded to the context in arrival order.
    frames: mpsc::Sender<ServerMessage>,
    notices: broadcast::Sender<SyncNotice>,
    state_tx: watch::Sender<ConnectionState>,
    /// Connecting-guard: at most one handshake in flight.
    connecting: AtomicBool,
    /// Zero-based count of consecutive failed attempts.
    attempts: AtomicU32,
    /// Set by an explicit `disconnect()`; suppresses reconnection.
    voluntary: AtomicBool,
    current_session: Mutex<Option<SessionId>>,
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    pending: Mutex<HashMap<RequestId, oneshot::Sender<CommandAck>>>,
    reconnect_timer: Mutex<Option<CancellationToken>>,
    /// Cancellation for the live connection's read loop.
    conn_cancel: Mutex<Option<CancellationToken>>,
    resync: Mutex<ResyncGate>,
}

/// Holds incremental frames for a session until its resync completes.
#[derive(Default)]
struct ResyncGate {
    session: Option<SessionId>,
    held: Vec<ServerMessage>,
}

impl ConnectionManager {
    /// Create a manager. Non-ack frames go to `frames`; lifecycle notices
    /// go to `notices`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
        settings: ConnectionSettings,
        frames: mpsc::Sender<ServerMessage>,
        notices: broadcast::Sender<SyncNotice>,
    ) -> Self {
        let policy = ReconnectPolicy {
            initial_delay_ms: settings.initial_delay_ms,
            max_delay_ms: settings.max_delay_ms,
            max_attempts: settings.max_attempts,
        };
        let (state_tx, _state_rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                transport,
                tokens,
                settings,
                policy,
                frames,
                notices,
                state_tx,
                connecting: AtomicBool::new(false),
                attempts: AtomicU32::new(0),
                voluntary: AtomicBool::new(false),
                current_session: Mutex::new(None),
                outbound: Mutex::new(None),
                pending: Mutex::new(HashMap::new()),
                reconnect_timer: Mutex::new(None),
                conn_cancel: Mutex::new(None),
                resync: Mutex::new(ResyncGate::default()),
            }),
        }
    }

    /// Watch the connection state.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// The connection state right now.
    #[must_use]
    pub fn current_state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Subscribe to lifecycle notices.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotice> {
        self.inner.notices.subscribe()
    }

    /// The session this manager currently has affinity to.
    #[must_use]
    pub fn current_session(&self) -> Option<SessionId> {
        self.inner.current_session.lock().clone()
    }

    /// Establish a connection.
    ///
    /// Rejects a concurrent attempt with [`SyncError::ConnectInProgress`].
    /// Without a token it fails with [`SyncError::AuthenticationMissing`]
    /// and schedules nothing. A transport failure schedules a backoff retry
    /// before returning the error.
    pub async fn connect(&self) -> Result<()> {
        // An explicit connect expresses intent to be online again and
        // invalidates any pending reconnect timer.
        self.inner.voluntary.store(false, Ordering::Release);
        self.inner.cancel_reconnect_timer();
        try_connect(&self.inner, None).await
    }

    /// Voluntarily disconnect: no reconnection, session affinity cleared.
    pub fn disconnect(&self) {
        let inner = &self.inner;
        inner.voluntary.store(true, Ordering::Release);
        inner.cancel_reconnect_timer();
        if let Some(cancel) = inner.conn_cancel.lock().take() {
            cancel.cancel();
        }
        *inner.current_session.lock() = None;
        {
            let mut gate = inner.resync.lock();
            gate.session = None;
            gate.held.clear();
        }
        *inner.outbound.lock() = None;
        inner.fail_pending();
        inner.set_state(ConnectionState::Disconnected);
        let _ = inner.notices.send(SyncNotice::Disconnected);
        info!("disconnected");
    }

    /// Join a session (request/ack).
    ///
    /// The session is recorded as current *before* the ack resolves, so a
    /// mid-join disconnect still knows what to resync.
    pub async fn join(&self, session_id: SessionId) -> CommandOutcome {
        *self.inner.current_session.lock() = Some(session_id.clone());
        self.inner
            .request(CommandRequest::join_session(&session_id, false))
            .await
    }

    /// Issue a command and await its ack.
    ///
    /// Always resolves to a [`CommandOutcome`]; never returns an error for
    /// a business-level failure.
    pub async fn request(&self, request: CommandRequest) -> CommandOutcome {
        self.inner.request(request).await
    }
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        let _ = self.state_tx.send_replace(state);
    }

    fn cancel_reconnect_timer(&self) {
        if let Some(cancel) = self.reconnect_timer.lock().take() {
            cancel.cancel();
        }
    }

    /// Drop all in-flight request waiters; their receivers resolve to
    /// "Connection lost".
    fn fail_pending(&self) {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        if !drained.is_empty() {
            debug!(count = drained.len(), "failing in-flight requests");
        }
    }

    async fn request(&self, request: CommandRequest) -> CommandOutcome {
        let Some(outbound) = self.outbound.lock().clone() else {
            return CommandOutcome::failed(NOT_CONNECTED);
        };
        let frame = match serde_json::to_string(&request) {
            Ok(frame) => frame,
            Err(e) => return CommandOutcome::failed(format!("encode failed: {e}")),
        };

        let (tx, rx) = oneshot::channel();
        let id = request.id.clone();
        let _ = self.pending.lock().insert(id.clone(), tx);

        if outbound.send(frame).await.is_err() {
            let _ = self.pending.lock().remove(&id);
            return CommandOutcome::failed(NOT_CONNECTED);
        }

        let timeout = Duration::from_millis(self.settings.request_timeout_ms);
        match time::timeout(timeout, rx).await {
            Ok(Ok(ack)) => CommandOutcome::from(&ack),
            // The waiter was dropped by fail_pending on disconnect.
            Ok(Err(_)) => CommandOutcome::failed("Connection lost"),
            Err(_) => {
                let _ = self.pending.lock().remove(&id);
                CommandOutcome::failed("Request timed out")
            }
        }
    }

    /// Decide what to do with one inbound frame. Returns the frames to
    /// forward, in order. Pure bookkeeping under the locks; the async
    /// sends happen in the caller.
    fn route(&self, msg: ServerMessage) -> Vec<ServerMessage> {
        match msg {
            ServerMessage::Ack { ack } => {
                let waiter = self.pending.lock().remove(&ack.id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(ack);
                    }
                    None => debug!(id = %ack.id, "ack for unknown request"),
                }
                Vec::new()
            }
            ServerMessage::FullState { .. } => {
                let released = {
                    let mut gate = self.resync.lock();
                    let matches = match (&gate.session, &msg) {
                        (Some(gated), ServerMessage::FullState { session_id, .. }) => {
                            gated == session_id
                        }
                        _ => false,
                    };
                    if matches {
                        gate.session = None;
                        std::mem::take(&mut gate.held)
                    } else {
                        Vec::new()
                    }
                };
                // Resync state first, then the held incremental frames.
                let mut out = Vec::with_capacity(1 + released.len());
                out.push(msg);
                out.extend(released);
                out
            }
            ServerMessage::WorldEvent { .. } | ServerMessage::StateUpdate { .. } => {
                let frame_session = frame_session(&msg);
                let mut gate = self.resync.lock();
                let gated = gate
                    .session
                    .as_ref()
                    .zip(frame_session.as_ref())
                    .is_some_and(|(g, s)| g == s);
                if gated {
                    gate.held.push(msg);
                    return Vec::new();
                }
                vec![msg]
            }
            ServerMessage::SimulationEnded { .. } => vec![msg],
        }
    }
}

/// One guarded connection attempt. A transport failure schedules the next
/// retry before the error is returned.
async fn try_connect(inner: &Arc<Inner>, reconnect_attempt: Option<u32>) -> Result<()> {
    if inner
        .connecting
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Err(SyncError::ConnectInProgress);
    }
    let result = handshake(inner, reconnect_attempt).await;
    inner.connecting.store(false, Ordering::Release);
    if matches!(result, Err(SyncError::Transport(_))) {
        schedule_reconnect(inner);
    }
    result
}

async fn handshake(inner: &Arc<Inner>, reconnect_attempt: Option<u32>) -> Result<()> {
    let Some(token) = inner.tokens.token() else {
        warn!("no token available, aborting connect");
        let _ = inner.notices.send(SyncNotice::AuthenticationMissing);
        inner.set_state(ConnectionState::Disconnected);
        return Err(SyncError::AuthenticationMissing);
    };

    // Tear down any stale handle before dialing.
    if let Some(cancel) = inner.conn_cancel.lock().take() {
        cancel.cancel();
    }
    *inner.outbound.lock() = None;

    inner.set_state(match reconnect_attempt {
        Some(attempt) => ConnectionState::Reconnecting { attempt },
        None => ConnectionState::Connecting,
    });

    let handle = inner.transport.connect(&inner.settings.url, &token).await?;

    inner.attempts.store(0, Ordering::Release);
    *inner.outbound.lock() = Some(handle.outbound);

    // A previously joined session gets a resync-flagged rejoin; its
    // incremental frames are gated until full_state has been forwarded.
    // The gate must be armed before the read loop can route anything.
    let rejoin = inner.current_session.lock().clone();
    if let Some(session_id) = &rejoin {
        let mut gate = inner.resync.lock();
        gate.session = Some(session_id.clone());
        gate.held.clear();
    }

    let cancel = CancellationToken::new();
    *inner.conn_cancel.lock() = Some(cancel.clone());
    let _ = tokio::spawn(read_loop(Arc::clone(inner), handle.inbound, cancel));

    inner.set_state(ConnectionState::Connected);
    let _ = inner.notices.send(SyncNotice::Connected);
    info!("connected");

    if let Some(session_id) = rejoin {
        let inner = Arc::clone(inner);
        let _ = tokio::spawn(async move {
            debug!(session_id = %session_id, "re-joining with full-state resync");
            let outcome = inner
                .request(CommandRequest::join_session(&session_id, true))
                .await;
            if !outcome.success {
                warn!(error = ?outcome.error, "resync join failed, releasing gate");
                let held = {
                    let mut gate = inner.resync.lock();
                    gate.session = None;
                    std::mem::take(&mut gate.held)
                };
                for frame in held {
                    if inner.frames.send(frame).await.is_err() {
                        break;
                    }
                }
            }
        });
    }
    Ok(())
}

fn schedule_reconnect(inner: &Arc<Inner>) {
    if inner.voluntary.load(Ordering::Acquire) {
        return;
    }
    let attempt = inner.attempts.fetch_add(1, Ordering::AcqRel);
    if inner.policy.is_exhausted(attempt) {
        warn!(attempts = attempt, "reconnect attempts exhausted");
        let _ = inner
            .notices
            .send(SyncNotice::ReconnectExhausted { attempts: attempt });
        inner.set_state(ConnectionState::Disconnected);
        return;
    }

    let delay = inner.policy.delay_for(attempt);
    let display_attempt = attempt + 1;
    inner.set_state(ConnectionState::Reconnecting {
        attempt: display_attempt,
    });
    let _ = inner.notices.send(SyncNotice::Reconnecting {
        attempt: display_attempt,
    });
    debug!(attempt = display_attempt, ?delay, "reconnect scheduled");

    let cancel = CancellationToken::new();
    *inner.reconnect_timer.lock() = Some(cancel.clone());
    let inner = Arc::clone(inner);
    let _ = tokio::spawn(async move {
        tokio::select! {
            () = time::sleep(delay) => {
                let _ = try_connect(&inner, Some(display_attempt)).await;
            }
            () = cancel.cancelled() => {
                debug!("pending reconnect cancelled");
            }
        }
    });
}

async fn on_connection_lost(inner: &Arc<Inner>) {
    warn!("connection lost");
    *inner.outbound.lock() = None;
    inner.fail_pending();
    let _ = inner.notices.send(SyncNotice::Disconnected);
    schedule_reconnect(inner);
}

/// The session a frame belongs to, when it names one.
fn frame_session(msg: &ServerMessage) -> Option<SessionId> {
    match msg {
        ServerMessage::WorldEvent { data } => data
            .get("sessionId")
            .and_then(Value::as_str)
            .map(SessionId::from),
        ServerMessage::StateUpdate { snapshot } => Some(snapshot.session_id.clone()),
        _ => None,
    }
}

/// Pump inbound frames until the connection closes or is cancelled.
///
/// Cancellation is the voluntary path (state already settled by the
/// canceller); a closed channel is the abnormal path and triggers
/// reconnection.
async fn read_loop(
    inner: Arc<Inner>,
    mut inbound: mpsc::Receiver<String>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!("read loop cancelled");
                return;
            }
            frame = inbound.recv() => match frame {
                Some(text) => route_text(&inner, &text).await,
                None => break,
            }
        }
    }
    on_connection_lost(&inner).await;
}

async fn route_text(inner: &Arc<Inner>, text: &str) {
    let msg: ServerMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "unrecognized frame skipped");
            return;
        }
    };
    for frame in inner.route(msg) {
        if inner.frames.send(frame).await.is_err() {
            debug!("frame consumer gone, frame dropped");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
