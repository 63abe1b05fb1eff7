//! The transport seam: a trait over "something that dials a URL with a
//! bearer token and yields a frame pipe".
//!
//! The production implementation is [`WsTransport`] over
//! `tokio-tungstenite`. Tests use the in-memory channel transport from
//! [`crate::testing`], which exercises every code path above the socket.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, warn};

use colloquy_core::{Result, SyncError};

/// Capacity of the frame channels bridging a connection.
const FRAME_CHANNEL_CAPACITY: usize = 256;

/// A live connection as a pair of frame channels.
///
/// Dropping the handle (or either task closing its end) tears the
/// connection down; the inbound channel yielding `None` is the disconnect
/// signal.
pub struct TransportHandle {
    /// Text frames to send to the server.
    pub outbound: mpsc::Sender<String>,
    /// Text frames received from the server.
    pub inbound: mpsc::Receiver<String>,
}

/// Something that can establish an authenticated frame pipe.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dial `url`, presenting `token` as a bearer credential.
    async fn connect(&self, url: &str, token: &str) -> Result<TransportHandle>;
}

/// Provides the bearer token for the handshake.
///
/// Injected rather than read from a global so independent contexts (and
/// tests) never share hidden credential state.
pub trait TokenProvider: Send + Sync {
    /// The current token, or `None` if the caller has none.
    fn token(&self) -> Option<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// WebSocket transport over `tokio-tungstenite`.
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, url: &str, token: &str) -> Result<TransportHandle> {
        let mut request = url
            .into_client_request()
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        let bearer = format!("Bearer {token}")
            .parse()
            .map_err(|_| SyncError::Transport("token is not a valid header value".into()))?;
        let _ = request.headers_mut().insert(AUTHORIZATION, bearer);

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let (outbound, mut outbound_rx) = mpsc::channel::<String>(FRAME_CHANNEL_CAPACITY);
        let (inbound_tx, inbound) = mpsc::channel::<String>(FRAME_CHANNEL_CAPACITY);

        // Write pump: frame channel -> socket.
        let _ = tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    debug!(error = %e, "websocket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Read pump: socket -> frame channel. Ends (dropping `inbound_tx`,
        // which signals disconnect upstream) on close or error.
        let _ = tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if inbound_tx.send(text.to_string()).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("websocket closed by server");
                        break;
                    }
                    Ok(_) => {} // ping/pong/binary: nothing to forward
                    Err(e) => {
                        warn!(error = %e, "websocket read failed");
                        break;
                    }
                }
            }
        });

        Ok(TransportHandle { outbound, inbound })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_is_a_token_provider() {
        let provider = || Some("tok_123".to_owned());
        assert_eq!(provider.token().as_deref(), Some("tok_123"));

        let empty = || None;
        assert!(TokenProvider::token(&empty).is_none());
    }

    #[tokio::test]
    async fn ws_transport_rejects_invalid_url() {
        let result = WsTransport.connect("not a url", "tok").await;
        assert!(matches!(result, Err(SyncError::Transport(_))));
    }

    #[tokio::test]
    async fn ws_transport_fails_fast_on_refused_connection() {
        // Port 9 (discard) is almost certainly not listening.
        let result = WsTransport.connect("ws://127.0.0.1:9/ws", "tok").await;
        assert!(matches!(result, Err(SyncError::Transport(_))));
    }
}
