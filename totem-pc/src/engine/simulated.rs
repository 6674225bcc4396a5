//! Simulated pipeline engine
//!
//! Behaves like a well-mannered engine without decoding anything: state
//! changes step through every intermediate state, seeks complete with
//! `AsyncDone`, and the position advances with wall-clock time while
//! Playing. Network URIs report a short stream-buffering episode, and local
//! paths that do not exist fail with Resource/NotFound.

use super::notification::{
    BufferingMode, EngineError, EngineMessage, EngineNotification, ErrorCode, ErrorDomain,
};
use super::{
    BufferingQuery, Credentials, EngineState, MediaSource, PipelineEngine, SeekFlags, SourceId,
    StreamKind, TagList,
};
use std::cell::Cell;
use std::path::Path;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Length reported for every simulated medium
const DEFAULT_DURATION_MS: u64 = 30_000;

pub struct SimulatedEngine {
    tx: mpsc::UnboundedSender<EngineMessage>,
    duration_ms: u64,
    source_id: Option<SourceId>,
    source: Option<MediaSource>,
    state: EngineState,
    /// Position accumulated before the current Playing stretch
    base_position_ms: u64,
    playing_since: Option<Instant>,
    eos_sent: Cell<bool>,
    credentials: Option<Credentials>,
}

impl SimulatedEngine {
    pub fn new(tx: mpsc::UnboundedSender<EngineMessage>) -> Self {
        Self {
            tx,
            duration_ms: DEFAULT_DURATION_MS,
            source_id: None,
            source: None,
            state: EngineState::Null,
            base_position_ms: 0,
            playing_since: None,
            eos_sent: Cell::new(false),
            credentials: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    fn emit(&self, notification: EngineNotification) {
        let Some(source) = self.source_id else {
            return;
        };
        trace!("Simulated engine emits {:?}", notification);
        // Receiver gone means the coordinator shut down
        let _ = self.tx.send(EngineMessage::new(source, notification));
    }

    fn position_ms(&self) -> u64 {
        let running = self
            .playing_since
            .map(|since| since.elapsed().as_millis() as u64)
            .unwrap_or(0);
        (self.base_position_ms + running).min(self.duration_ms)
    }

    fn transition(&mut self, target: EngineState) {
        while self.state != target {
            let next = if target > self.state {
                step_up(self.state)
            } else {
                step_down(self.state)
            };

            if self.state == EngineState::Playing {
                self.base_position_ms = self.position_ms();
                self.playing_since = None;
            }
            if next == EngineState::Playing {
                self.playing_since = Some(Instant::now());
            }
            if next <= EngineState::Ready {
                self.base_position_ms = 0;
                self.eos_sent.set(false);
            }

            self.emit(EngineNotification::StateChanged {
                old: self.state,
                new: next,
                from_pipeline: true,
            });
            self.state = next;
        }
    }

    fn local_path_missing(source: &MediaSource) -> bool {
        let path = match source.scheme().as_deref() {
            None => source.uri.as_str(),
            Some("file") => source.uri.trim_start_matches("file://"),
            Some(_) => return false,
        };
        !Path::new(path).exists()
    }

    fn is_network(source: &MediaSource) -> bool {
        matches!(source.scheme().as_deref(), Some("http" | "https" | "rtsp"))
    }
}

fn step_up(state: EngineState) -> EngineState {
    match state {
        EngineState::Null => EngineState::Ready,
        EngineState::Ready => EngineState::Paused,
        EngineState::Paused | EngineState::Playing => EngineState::Playing,
    }
}

fn step_down(state: EngineState) -> EngineState {
    match state {
        EngineState::Playing => EngineState::Paused,
        EngineState::Paused => EngineState::Ready,
        EngineState::Ready | EngineState::Null => EngineState::Null,
    }
}

impl PipelineEngine for SimulatedEngine {
    fn open(&mut self, source_id: SourceId, source: &MediaSource) {
        debug!("Simulated engine opening {} as {}", source.uri, source_id);

        // Notifications for the previous source stay tagged with its id
        self.transition(EngineState::Null);
        self.source_id = Some(source_id);
        self.source = Some(source.clone());
        self.base_position_ms = 0;
        self.eos_sent.set(false);

        self.transition(EngineState::Ready);

        if Self::local_path_missing(source) {
            self.emit(EngineNotification::Error(
                EngineError::new(ErrorDomain::Resource, ErrorCode::NotFound, "Resource not found.")
                    .with_debug(format!("No such file \"{}\"", source.uri)),
            ));
            return;
        }

        if Self::is_network(source) {
            self.emit(EngineNotification::Buffering {
                percent: 40,
                mode: BufferingMode::Stream,
            });
        }

        self.transition(EngineState::Paused);
        self.emit(EngineNotification::AsyncDone);
        self.emit(EngineNotification::DurationChanged);
        self.emit(EngineNotification::StreamsChanged);
        self.emit(EngineNotification::TagsUpdated {
            kind: StreamKind::Audio,
            index: 0,
        });

        if Self::is_network(source) {
            self.emit(EngineNotification::Buffering {
                percent: 100,
                mode: BufferingMode::Stream,
            });
        }
    }

    fn set_state(&mut self, state: EngineState) {
        if self.source.is_none() && state > EngineState::Ready {
            return;
        }
        self.transition(state);
    }

    fn seek(&mut self, time_ms: u64, flags: SeekFlags) {
        debug!(
            "Simulated engine seeking to {}ms (flush={}, accurate={})",
            time_ms, flags.flush, flags.accurate
        );
        self.base_position_ms = time_ms.min(self.duration_ms);
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
        }
        self.eos_sent.set(false);
        self.emit(EngineNotification::AsyncDone);
    }

    fn query_duration(&self) -> Option<u64> {
        self.source.as_ref().map(|_| self.duration_ms)
    }

    fn query_position(&self) -> Option<u64> {
        self.source.as_ref()?;
        let position = self.position_ms();
        if position >= self.duration_ms && self.state == EngineState::Playing && !self.eos_sent.get() {
            self.eos_sent.set(true);
            self.emit(EngineNotification::EndOfStream);
        }
        Some(position)
    }

    fn query_seekable(&self) -> Option<bool> {
        self.source.as_ref().map(|_| true)
    }

    fn query_buffering(&self) -> Option<BufferingQuery> {
        self.source.as_ref().map(|_| BufferingQuery {
            fill: 1.0,
            estimated_remaining_ms: Some(0),
        })
    }

    fn stream_count(&self, kind: StreamKind) -> usize {
        match kind {
            StreamKind::Audio | StreamKind::Video => 1,
            StreamKind::Text => 0,
        }
    }

    fn current_stream(&self, kind: StreamKind) -> Option<usize> {
        (self.stream_count(kind) > 0).then_some(0)
    }

    fn stream_tags(&self, kind: StreamKind, index: usize) -> Option<TagList> {
        if index >= self.stream_count(kind) {
            return None;
        }
        let mut tags = TagList::new();
        match kind {
            StreamKind::Audio => {
                tags.insert("language-code".to_string(), "en".to_string());
                tags.insert("audio-codec".to_string(), "Vorbis".to_string());
            }
            StreamKind::Video => {
                tags.insert("video-codec".to_string(), "Theora".to_string());
            }
            StreamKind::Text => {}
        }
        if let Some(source) = &self.source {
            tags.insert("location".to_string(), source.uri.clone());
        }
        Some(tags)
    }

    fn select_stream(&mut self, kind: StreamKind, index: Option<usize>) {
        // Only one stream per kind; any valid choice is already current
        debug!("Selecting {:?} stream {:?}", kind, index);
    }

    fn set_credentials(&mut self, credentials: Option<Credentials>) {
        self.credentials = credentials;
    }

    fn has_video(&self) -> bool {
        true
    }

    fn supports_decryption(&self) -> bool {
        false
    }
}
