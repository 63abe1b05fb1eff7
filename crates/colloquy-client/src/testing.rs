//! In-memory transport for driving the client stack in tests.
//!
//! Each `connect()` call yields a fresh channel pair; the test side receives
//! a [`ServerEnd`] for every accepted connection and can script failures for
//! the next N attempts to exercise the backoff path.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use colloquy_core::{Result, SyncError};

use crate::transport::{Transport, TransportHandle};

/// Capacity of the in-memory frame channels.
const CAPACITY: usize = 256;

/// The server side of one accepted in-memory connection.
pub struct ServerEnd {
    /// Frames the client sent.
    pub sent: mpsc::Receiver<String>,
    /// Push a frame to the client. Dropping this sender simulates an
    /// abnormal disconnect.
    pub push: mpsc::Sender<String>,
    /// The bearer token the client presented.
    pub token: String,
}

impl ServerEnd {
    /// Receive the next frame the client sent, parsed as JSON.
    pub async fn recv_json(&mut self) -> Option<serde_json::Value> {
        let text = self.sent.recv().await?;
        serde_json::from_str(&text).ok()
    }

    /// Push a JSON value to the client as a text frame.
    pub async fn push_json(&self, value: &serde_json::Value) {
        let _ = self.push.send(value.to_string()).await;
    }
}

/// A [`Transport`] backed by in-process channels.
pub struct ChannelTransport {
    accepted: mpsc::UnboundedSender<ServerEnd>,
    fail_next: Mutex<u32>,
}

impl ChannelTransport {
    /// Create the transport and the stream of accepted connections.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEnd>) {
        let (accepted, accepted_rx) = mpsc::unbounded_channel();
        (
            Self {
                accepted,
                fail_next: Mutex::new(0),
            },
            accepted_rx,
        )
    }

    /// Make the next `count` connect attempts fail with a transport error.
    pub fn fail_next(&self, count: u32) {
        *self.fail_next.lock() = count;
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn connect(&self, _url: &str, token: &str) -> Result<TransportHandle> {
        {
            let mut fail = self.fail_next.lock();
            if *fail > 0 {
                *fail -= 1;
                return Err(SyncError::Transport("scripted failure".into()));
            }
        }
        let (outbound, sent) = mpsc::channel(CAPACITY);
        let (push, inbound) = mpsc::channel(CAPACITY);
        let server = ServerEnd {
            sent,
            push,
            token: token.to_owned(),
        };
        if self.accepted.send(server).is_err() {
            return Err(SyncError::Transport("test harness gone".into()));
        }
        Ok(TransportHandle { outbound, inbound })
    }
}
