//! # colloquy-session
//!
//! The client-side session domain model and the pure reducer that is the
//! only thing allowed to mutate it. The same reducer drives live updates
//! and offline replay, which is what makes replay deterministic.

#![deny(unsafe_code)]

pub mod model;
pub mod reducer;

pub use model::{Agent, AgentStatus, Session, SessionStatus};
pub use reducer::{apply, apply_snapshot, fold};
