//! # colloquy-client
//!
//! The live half of the sync subsystem:
//!
//! - [`ConnectionManager`]: channel lifecycle, handshake, reconnection
//! - [`EventCoalescer`]: burst batching ahead of the reducer
//! - command channel: request/ack moderator commands
//! - [`SyncContext`]: the facade owning one of each, plus the reduced
//!   session state
//!
//! The WebSocket lives behind the [`Transport`] trait so tests drive the
//! whole stack through an in-memory channel pair.

#![deny(unsafe_code)]

pub mod coalescer;
pub mod commands;
pub mod connection;
pub mod context;
pub mod observer;
pub mod transport;

#[doc(hidden)]
pub mod testing;

pub use coalescer::EventCoalescer;
pub use connection::ConnectionManager;
pub use context::SyncContext;
pub use observer::{ConnectionState, SyncNotice};
pub use transport::{TokenProvider, Transport, TransportHandle, WsTransport};
