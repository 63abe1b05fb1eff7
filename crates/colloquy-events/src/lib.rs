//! # colloquy-events
//!
//! The canonical event vocabulary of the sync protocol:
//!
//! - [`WorldEvent`] / [`StateSnapshot`]: the two facts the authoritative
//!   simulation emits
//! - [`EventKind`]: typed discriminators with a pass-through for unknown kinds
//! - [`normalize`]: the single parse/validate boundary that coerces raw
//!   heterogeneous records into `WorldEvent`
//! - [`wire`]: inbound server messages and the outbound command envelope

#![deny(unsafe_code)]

pub mod kind;
pub mod normalize;
pub mod types;
pub mod wire;

pub use kind::EventKind;
pub use normalize::{NormalizeError, normalize_event};
pub use types::{StateSnapshot, WorldEvent};
pub use wire::{CommandAck, CommandOutcome, CommandRequest, ServerMessage};
