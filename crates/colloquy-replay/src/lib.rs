//! # colloquy-replay
//!
//! Deterministic playback of a recorded event log. The controller drives
//! the same reducer the live path uses, so a replayed session is
//! indistinguishable from one that was watched live.

#![deny(unsafe_code)]

pub mod controller;
pub mod speed;

pub use controller::ReplayController;
pub use speed::Speed;
