//! # colloquy-settings
//!
//! Layered configuration for the sync client: compiled defaults, an
//! optional JSON settings file deep-merged on top, and `COLLOQUY_*`
//! environment variable overrides with strict parsing.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path};
pub use types::SyncSettings;
