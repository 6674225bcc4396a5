//! # Totem Common Library
//!
//! Shared code for the playback coordinator and its front ends:
//! - GUI-facing signal types (`PlayerSignal` enum)
//! - Error taxonomy shared by the coordinator and the GUI shell
//! - Configuration file resolution and TOML loading
//! - Human-readable time formatting for logs and status lines

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;

pub use error::{Error, Result};
pub use events::{ErrorKind, PlayerSignal};
