//! # colloquy-core
//!
//! Foundation types shared by every colloquy crate:
//!
//! - **Branded IDs**: [`EventId`], [`SessionId`], [`AgentId`], [`RequestId`]
//!   as newtypes for type safety
//! - **Errors**: the [`SyncError`] hierarchy via `thiserror`
//! - **Backoff**: [`ReconnectPolicy`] and the reconnect delay calculation

#![deny(unsafe_code)]

pub mod backoff;
pub mod errors;
pub mod ids;

pub use backoff::ReconnectPolicy;
pub use errors::{Result, SyncError};
pub use ids::{AgentId, EventId, RequestId, SessionId};
