//! # Totem Playback Coordinator (totem-pc)
//!
//! Owns the relationship between what the user asked for (open, play,
//! pause, seek, stop, close) and what an external pipeline engine is
//! actually doing.
//!
//! **Architecture:**
//! - `engine`: command/notification contract with the pipeline engine, plus
//!   a simulated engine used by the binary
//! - `coordinator`: synchronous state machine (`PlaybackController`) and its
//!   components (normalizer, error classifier, metadata, buffering, seek,
//!   network resources)
//! - `service`: tokio event loop that owns the controller and executes the
//!   asynchronous work it requests

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod service;

pub use config::{CoordinatorConfig, LivePausePolicy};
pub use coordinator::{PlaybackController, PlaybackGate, PlaybackSnapshot, PlaybackTarget};
pub use error::{Error, Result};
pub use service::{CoordinatorHandle, CoordinatorService};
