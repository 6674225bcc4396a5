//! Signal types pushed from the playback coordinator to the GUI shell

use serde::{Deserialize, Serialize};

/// GUI-facing signals
///
/// The shell never mutates coordinator state; it reacts to these signals
/// and reads snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerSignal {
    /// A classified engine failure
    Error {
        kind: ErrorKind,
        message: String,
        is_fatal: bool,
        is_playback_stopped: bool,
    },

    /// The stream reached its end
    EndOfStream,

    /// Position update (periodic while playing, plus on seek/stop/close)
    Tick {
        current_time_ms: u64,
        stream_length_ms: u64,
        /// Fraction of the stream played, 0.0 when the length is unknown
        position: f64,
        seekable: bool,
    },

    /// Stream buffering progress (0.0-1.0)
    Buffering { fraction: f64 },

    /// Download-to-disk buffering progress (0.0-1.0)
    DownloadBuffering { fraction: f64 },

    /// The subtitle track list changed
    SubtitlesChanged,

    /// The audio track (language) list changed
    LanguagesChanged,

    /// New metadata is available
    GotMetadata,

    /// A Playing transition is about to be issued to the engine
    PlayStarting,

    /// The engine was redirected to another location
    Redirect { uri: String },
}

/// Stable taxonomy of playback failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidSource,
    CodecMissing,
    Unauthorized,
    PermissionDenied,
    /// Remote resource missing (HTTP 404)
    NotFound,
    /// Local file missing
    FileNotFound,
    TlsUnavailable,
    InvalidDevice,
    Encrypted,
    ReadError,
    EmptyFile,
    Generic,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidSource => "invalid-source",
            ErrorKind::CodecMissing => "codec-missing",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::PermissionDenied => "permission-denied",
            ErrorKind::NotFound => "not-found",
            ErrorKind::FileNotFound => "file-not-found",
            ErrorKind::TlsUnavailable => "tls-unavailable",
            ErrorKind::InvalidDevice => "invalid-device",
            ErrorKind::Encrypted => "encrypted",
            ErrorKind::ReadError => "read-error",
            ErrorKind::EmptyFile => "empty-file",
            ErrorKind::Generic => "generic",
        };
        write!(f, "{}", name)
    }
}
