//! Pipeline engine contract
//!
//! The engine is an external collaborator: it decodes, renders and keeps
//! A/V sync. The coordinator reaches it only through the `PipelineEngine`
//! command surface and receives its asynchronous notifications as
//! `EngineMessage`s on one ordered channel.
//!
//! **Responsibilities:**
//! - Engine states, seek flags, stream kinds and query result types
//! - `PipelineEngine` trait (commands and synchronous queries)
//! - Notification types (see `notification`)
//! - `SimulatedEngine`, a timer-free stand-in used by the binary

pub mod notification;
pub mod simulated;

pub use notification::{
    BufferingMode, ElementMessage, EngineError, EngineMessage, EngineNotification, ErrorCode,
    ErrorDomain, ErrorOrigin,
};
pub use simulated::SimulatedEngine;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Pipeline state as reported by the engine
///
/// Ordered: `Null < Ready < Paused < Playing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EngineState {
    Null,
    Ready,
    Paused,
    Playing,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Null => "NULL",
            EngineState::Ready => "READY",
            EngineState::Paused => "PAUSED",
            EngineState::Playing => "PLAYING",
        };
        write!(f, "{}", name)
    }
}

/// Flags passed with a seek request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeekFlags {
    /// Flush queued data so the new position takes effect immediately
    pub flush: bool,
    /// Seek to the exact position rather than the nearest keyframe
    pub accurate: bool,
}

/// Kind of elementary stream inside the media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    Audio,
    Video,
    Text,
}

/// Tag set reported for a stream (tag name to value)
pub type TagList = BTreeMap<String, String>;

/// Identity of one opened source
///
/// Each `open` allocates a fresh id; notifications carrying any other id
/// are stale and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A user-provided media location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    pub uri: String,
    /// HTTP referrer forwarded to network sources
    #[serde(default)]
    pub referrer: Option<String>,
    /// External subtitle file
    #[serde(default)]
    pub subtitle_uri: Option<String>,
}

impl MediaSource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            referrer: None,
            subtitle_uri: None,
        }
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn with_subtitle(mut self, subtitle_uri: impl Into<String>) -> Self {
        self.subtitle_uri = Some(subtitle_uri.into());
        self
    }

    /// URI scheme in lowercase, if the URI has one
    pub fn scheme(&self) -> Option<String> {
        let (scheme, _) = self.uri.split_once(':')?;
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c)) {
            return None;
        }
        Some(scheme.to_ascii_lowercase())
    }

    pub fn has_scheme(&self, scheme: &str) -> bool {
        self.scheme().as_deref() == Some(scheme)
    }
}

/// Result of a download-buffering range query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferingQuery {
    /// Fraction of the file downloaded ahead of the play position (0.0-1.0)
    pub fill: f64,
    /// Estimated time to download the rest of the file, in milliseconds.
    /// `None` when the engine cannot estimate it.
    pub estimated_remaining_ms: Option<u64>,
}

/// Username/password pair for sources that accept embedded credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Command and query surface of the pipeline engine
///
/// Commands return immediately; their outcome is reported later through
/// `EngineNotification`s tagged with the `SourceId` passed to `open`.
pub trait PipelineEngine: Send {
    /// Load `source` and preroll it (the engine moves toward Paused on its own)
    fn open(&mut self, source_id: SourceId, source: &MediaSource);

    /// Request a pipeline state transition
    fn set_state(&mut self, state: EngineState);

    /// Seek to an absolute position
    fn seek(&mut self, time_ms: u64, flags: SeekFlags);

    /// Stream duration, `None` when unknown
    fn query_duration(&self) -> Option<u64>;

    /// Current play position, `None` when unknown
    fn query_position(&self) -> Option<u64>;

    /// Whether the engine can seek in the current stream, `None` if the
    /// query failed
    fn query_seekable(&self) -> Option<bool>;

    /// Download buffering range, `None` if the query failed
    fn query_buffering(&self) -> Option<BufferingQuery>;

    fn stream_count(&self, kind: StreamKind) -> usize;

    /// Index of the stream of `kind` currently selected
    fn current_stream(&self, kind: StreamKind) -> Option<usize>;

    fn stream_tags(&self, kind: StreamKind, index: usize) -> Option<TagList>;

    /// Make stream `index` of `kind` the current one
    ///
    /// `None` turns text rendering off, or for audio lets the engine pick.
    fn select_stream(&mut self, kind: StreamKind, index: Option<usize>);

    /// Credentials used by network sources on the next connection
    fn set_credentials(&mut self, credentials: Option<Credentials>);

    /// Whether the current media has a decodable video stream
    fn has_video(&self) -> bool;

    /// Whether the engine can read encrypted optical discs
    fn supports_decryption(&self) -> bool;
}
