//! Error classifier
//!
//! Maps raw engine errors to the stable `ErrorKind` taxonomy with a
//! user-facing message, using the missing-plugin evidence collected since
//! the last classification and the context of the open source.
//!
//! **Responsibilities:**
//! - Record missing-plugin evidence
//! - Classify `EngineError` into `ErrorRecord` (first matching rule wins)
//! - Suppress repeats of the last emitted message until playback starts

use crate::engine::{EngineError, EngineState, ErrorCode, ErrorDomain, ErrorOrigin, MediaSource};
use totem_common::ErrorKind;
use tracing::debug;

/// Detail prefix identifying a missing video decoder
const VIDEO_DECODER_DETAIL: &str = "decoder-video/";

/// Debug text marker for a TLS backend that is not installed
const TLS_MISSING_HINT: &str = "install glib-networking";

/// Debug text marker for an EACCES failure
const PERMISSION_DENIED_HINT: &str = "Permission denied";

/// Debug text marker for an MPEG decoder hitting the end of the stream
pub const NO_VALID_FRAMES_HINT: &str = "no valid frames found";

/// A classified failure ready to be reported
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    pub is_fatal: bool,
    pub is_playback_stopped: bool,
}

impl ErrorRecord {
    fn fatal(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            is_fatal: true,
            is_playback_stopped: true,
        }
    }
}

/// A capability the engine reported as not installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPlugin {
    /// Human-readable name, e.g. "H.264 decoder"
    pub description: String,
    /// Installer detail string
    pub detail: String,
}

impl MissingPlugin {
    pub fn is_video_decoder(&self) -> bool {
        self.detail.contains(VIDEO_DECODER_DETAIL)
    }
}

/// Source context the rules depend on
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    pub source: &'a MediaSource,
    /// The user dismissed a credential prompt earlier this session
    pub auth_aborted: bool,
    pub supports_decryption: bool,
}

/// HTTP status encoded in the debug text of a network source error
///
/// Only Resource/Read and Resource/OpenRead errors from HTTP or RTSP
/// sources carry one. 495 stands in for the missing TLS backend hint.
pub fn http_status(err: &EngineError) -> Option<u16> {
    if !err.origin.reports_http_status() {
        return None;
    }
    if !err.is(ErrorDomain::Resource, ErrorCode::Read)
        && !err.is(ErrorDomain::Resource, ErrorCode::OpenRead)
    {
        return None;
    }

    if err.debug.contains("401") {
        Some(401)
    } else if err.debug.contains("404") {
        Some(404)
    } else if err.debug.contains("403") {
        Some(403)
    } else if err.debug.contains(TLS_MISSING_HINT) {
        Some(495)
    } else {
        None
    }
}

/// Whether an error belongs to the "no decoder for this stream" class
fn is_decoder_class(err: &EngineError) -> bool {
    err.is(ErrorDomain::Core, ErrorCode::MissingPlugin)
        || err.is(ErrorDomain::Stream, ErrorCode::CodecNotFound)
        || err.is(ErrorDomain::Stream, ErrorCode::WrongType)
        || err.is(ErrorDomain::Stream, ErrorCode::NotImplemented)
        || (err.is(ErrorDomain::Stream, ErrorCode::Format)
            && err.debug.contains("no video pad or visualizations"))
}

/// Message naming missing plugins, deduplicated in report order
fn missing_plugins_message(err: &EngineError, plugins: &[MissingPlugin]) -> String {
    let mut names: Vec<&str> = Vec::new();
    for plugin in plugins {
        if !names.contains(&plugin.description.as_str()) {
            names.push(plugin.description.as_str());
        }
    }

    if names.len() == 1 || err.is(ErrorDomain::Core, ErrorCode::MissingPlugin) {
        format!(
            "The playback of this movie requires a {} plugin which is not installed.",
            names[0]
        )
    } else {
        format!(
            "The playback of this movie requires the following plugins which are not installed:\n\n{}",
            names.join("\n")
        )
    }
}

/// Classify one engine error
///
/// Pure rule evaluation; `ErrorClassifier::classify` wraps it with the
/// evidence bookkeeping.
pub fn classify(err: &EngineError, plugins: &[MissingPlugin], ctx: &ClassifyContext<'_>) -> ErrorRecord {
    // Rule 1: missing plugins explain a decoder failure
    if !plugins.is_empty() && is_decoder_class(err) {
        return ErrorRecord::fatal(ErrorKind::CodecMissing, missing_plugins_message(err, plugins));
    }

    // Rule 2: HTTP status from a network source
    if !ctx.auth_aborted {
        match http_status(err) {
            Some(401) => {
                return ErrorRecord::fatal(
                    ErrorKind::Unauthorized,
                    "Authentication is required to access this file or stream.",
                )
            }
            Some(403) => {
                return ErrorRecord::fatal(
                    ErrorKind::PermissionDenied,
                    "The server refused access to this file or stream.",
                )
            }
            Some(404) => {
                return ErrorRecord::fatal(
                    ErrorKind::NotFound,
                    "The specified movie could not be found.",
                )
            }
            Some(495) => {
                return ErrorRecord::fatal(
                    ErrorKind::TlsUnavailable,
                    "SSL/TLS support is missing. Check your installation.",
                )
            }
            _ => {}
        }
    }

    // Rule 3: optical device cannot be opened
    if err.is(ErrorDomain::Resource, ErrorCode::NotFound)
        || err.is(ErrorDomain::Resource, ErrorCode::OpenRead)
    {
        if ctx.source.has_scheme("dvd") {
            return ErrorRecord::fatal(
                ErrorKind::InvalidDevice,
                "The DVD device you specified seems to be invalid.",
            );
        }
        if ctx.source.has_scheme("vcd") {
            return ErrorRecord::fatal(
                ErrorKind::InvalidDevice,
                "The VCD device you specified seems to be invalid.",
            );
        }
    }

    // Rule 4: encrypted DVD without decryption support
    if err.is(ErrorDomain::Resource, ErrorCode::Read)
        && ctx.source.has_scheme("dvd")
        && !ctx.supports_decryption
    {
        return ErrorRecord::fatal(
            ErrorKind::Encrypted,
            "The source seems encrypted and can't be read. Are you trying to play an encrypted DVD without decryption support?",
        );
    }

    // Rule 5: generic mapping by domain and code
    match (err.domain, err.code) {
        (ErrorDomain::Resource, ErrorCode::NotFound) => {
            ErrorRecord::fatal(ErrorKind::FileNotFound, "The specified movie could not be found.")
        }
        (ErrorDomain::Resource, ErrorCode::OpenRead)
            if err.debug.contains(PERMISSION_DENIED_HINT) =>
        {
            ErrorRecord::fatal(ErrorKind::PermissionDenied, "You are not allowed to open this file.")
        }
        (ErrorDomain::Resource, ErrorCode::OpenRead | ErrorCode::Read) => {
            ErrorRecord::fatal(ErrorKind::ReadError, "The movie could not be read.")
        }
        (ErrorDomain::Stream, ErrorCode::Decrypt) => ErrorRecord::fatal(
            ErrorKind::Encrypted,
            "This file is encrypted and cannot be played back.",
        ),
        (ErrorDomain::Stream, ErrorCode::TypeNotFound) => ErrorRecord::fatal(
            ErrorKind::EmptyFile,
            "The file you tried to play is an empty file.",
        ),
        (ErrorDomain::Stream, ErrorCode::Failed) if err.origin == ErrorOrigin::TypeFinder => {
            ErrorRecord::fatal(
                ErrorKind::ReadError,
                "This file cannot be played over the network. Try downloading it locally first.",
            )
        }
        _ if is_decoder_class(err) => {
            if ctx.source.has_scheme("rtsp") {
                ErrorRecord::fatal(
                    ErrorKind::Generic,
                    "This stream cannot be played. It's possible that a firewall is blocking it.",
                )
            } else {
                ErrorRecord::fatal(
                    ErrorKind::Generic,
                    "An audio or video stream is not handled due to missing codecs. You might need to install additional plugins to be able to play some types of movies",
                )
            }
        }
        _ => ErrorRecord::fatal(ErrorKind::Generic, err.message.clone()),
    }
}

/// Stateful side of error classification
#[derive(Debug, Default)]
pub struct ErrorClassifier {
    missing_plugins: Vec<MissingPlugin>,
    last_message: Option<String>,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_missing_plugin(&mut self, plugin: MissingPlugin) {
        debug!("Missing plugin reported: {} ({})", plugin.description, plugin.detail);
        self.missing_plugins.push(plugin);
    }

    pub fn missing_plugins(&self) -> &[MissingPlugin] {
        &self.missing_plugins
    }

    pub fn has_missing_video_decoder(&self) -> bool {
        self.missing_plugins.iter().any(MissingPlugin::is_video_decoder)
    }

    /// Classify and consume the collected evidence
    pub fn classify(&mut self, err: &EngineError, ctx: &ClassifyContext<'_>) -> ErrorRecord {
        let record = classify(err, &self.missing_plugins, ctx);
        debug!(
            "Classified {} as {} ({} missing plugin reports)",
            err,
            record.kind,
            self.missing_plugins.len()
        );
        self.missing_plugins.clear();
        record
    }

    /// Non-fatal report for media whose only video stream lacks a decoder
    ///
    /// Consumes the evidence. `None` when no video decoder is missing.
    pub fn take_missing_video_decoder(&mut self) -> Option<ErrorRecord> {
        let plugin = self
            .missing_plugins
            .iter()
            .find(|p| p.is_video_decoder())?
            .clone();
        self.missing_plugins.clear();
        Some(ErrorRecord {
            kind: ErrorKind::CodecMissing,
            message: format!(
                "The playback of this movie requires a {} plugin which is not installed.",
                plugin.description
            ),
            is_fatal: false,
            is_playback_stopped: false,
        })
    }

    /// Whether `record` should be emitted given the current engine state
    ///
    /// Repeats of the last emitted message are suppressed until the engine
    /// reaches Playing.
    pub fn should_emit(&mut self, record: &ErrorRecord, actual: EngineState) -> bool {
        if actual != EngineState::Playing && self.last_message.as_deref() == Some(record.message.as_str()) {
            debug!("Suppressing repeated error: {}", record.message);
            return false;
        }
        self.last_message = Some(record.message.clone());
        true
    }

    /// Playback started; allow any message again
    pub fn forget_last_message(&mut self) {
        self.last_message = None;
    }

    pub fn reset(&mut self) {
        self.missing_plugins.clear();
        self.last_message = None;
    }
}
