//! Playback coordinator
//!
//! A synchronous state machine driven by GUI commands and engine
//! notifications. All state lives in one `PlaybackController` mutated
//! through `&mut self`; asynchronous work is requested through `Effect`s
//! that the service executes.
//!
//! **Components:**
//! - `normalizer`: engine messages to `PipelineEvent`s
//! - `errors`: engine errors to the `ErrorKind` taxonomy
//! - `metadata`: tag caches and track lists
//! - `buffering`: stream/download buffering holds
//! - `seek`: seek coalescing
//! - `network`: mount and credential operations
//! - `controller`: the state machine tying them together

pub mod buffering;
pub mod clock;
pub mod controller;
pub mod errors;
pub mod metadata;
pub mod network;
pub mod normalizer;
pub mod seek;

pub use clock::{Clock, SystemClock};
pub use controller::PlaybackController;
pub use metadata::{TagScope, TrackInfo, TRACK_AUTO, TRACK_NONE};
pub use network::{CredentialReply, MountTicket, PromptTicket};

use crate::engine::{EngineState, MediaSource};
use buffering::BufferingPhase;
use serde::Serialize;
use std::time::Duration;

/// The state the controller wants the engine in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PlaybackTarget {
    Null,
    Ready,
    Paused,
    Playing,
}

/// Whether a Playing transition may be issued now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackGate {
    Open,
    HeldForBuffering,
    HeldForMount,
    HeldForAuth,
}

/// Cached seekability of the open source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Seekability {
    Unknown,
    No,
    Yes,
}

/// Last known play position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Position {
    pub current_time_ms: u64,
    /// Fraction of the stream played, 0.0 when the length is unknown
    pub fractional_position: f64,
}

/// Asynchronous work requested by the controller
///
/// The service executes effects in order after every controller step.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartMount {
        ticket: MountTicket,
        uri: String,
        resource: String,
    },
    CancelMount(MountTicket),
    PromptCredentials {
        ticket: PromptTicket,
        uri: String,
    },
    CancelPrompt(PromptTicket),
    /// Start (`Some(interval)`) or stop (`None`) the position tick timer
    SetTickTimer(Option<Duration>),
    /// Start (`Some(interval)`) or stop (`None`) the download fill poll
    SetFillTimer(Option<Duration>),
}

/// Read-only view of the controller for the GUI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    pub source: Option<MediaSource>,
    pub target: PlaybackTarget,
    pub actual: EngineState,
    pub gate: PlaybackGate,
    pub stream_length_ms: u64,
    pub seekability: Seekability,
    pub position: Position,
    pub buffering: BufferingPhase,
    pub buffering_fill: f64,
    pub subtitles: Vec<TrackInfo>,
    pub languages: Vec<TrackInfo>,
}
