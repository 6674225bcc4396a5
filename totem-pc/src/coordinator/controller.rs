//! Playback state controller
//!
//! Reconciles the user's intent (`PlaybackTarget`) with what the engine
//! reports (`EngineState`). Commands update the target synchronously and
//! issue engine requests; notifications update the actual state and may
//! trigger follow-up transitions (auto-resume after buffering, a queued
//! seek, a reopen after mounting).
//!
//! **State machine:** Null → Ready → Paused ⇄ Playing → Ready (stop) → Null
//! (close). Buffering, mount and credential holds are a gate on the Playing
//! transition, not states of their own; `try_issue_playing` is the only
//! place the Playing transition is issued.

use super::buffering::{BufferingPolicy, StreamOutcome};
use super::errors::{self, ClassifyContext, ErrorClassifier, ErrorRecord, MissingPlugin};
use super::metadata::{MetadataAggregator, TagScope, TrackInfo, TRACK_AUTO, TRACK_NONE};
use super::network::{self, CredentialReply, MountTicket, NetworkHandler, PromptTicket};
use super::normalizer::{self, PipelineEvent};
use super::seek::{SeekCommand, SeekCoordinator, SeekDecision};
use super::{
    Clock, Effect, PlaybackGate, PlaybackSnapshot, PlaybackTarget, Position, Seekability,
    SystemClock,
};
use crate::config::{CoordinatorConfig, LivePausePolicy};
use crate::engine::{
    BufferingMode, EngineError, EngineMessage, EngineState, ErrorCode, ErrorDomain, MediaSource,
    PipelineEngine, SourceId, StreamKind, TagList,
};
use crate::error::{Error, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use totem_common::human_time::{format_media_time, format_stream_length};
use totem_common::PlayerSignal;
use tracing::{debug, info, trace, warn};

/// The currently open source and its identity
#[derive(Debug, Clone)]
struct OpenSource {
    id: SourceId,
    media: MediaSource,
}

/// Owns all coordinator state for one engine
pub struct PlaybackController {
    engine: Box<dyn PipelineEngine>,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
    signals: broadcast::Sender<PlayerSignal>,
    effects: Vec<Effect>,

    next_source_id: u64,
    source: Option<OpenSource>,
    target: PlaybackTarget,
    actual: EngineState,
    /// Last state requested from the engine and not yet reached
    requested: Option<EngineState>,
    stream_length_ms: u64,
    seekability: Seekability,
    position: Position,
    tick_running: bool,
    fill_running: bool,

    buffering: BufferingPolicy,
    seek: SeekCoordinator,
    metadata: MetadataAggregator,
    classifier: ErrorClassifier,
    network: NetworkHandler,
}

impl PlaybackController {
    pub fn new(engine: Box<dyn PipelineEngine>, config: CoordinatorConfig) -> Self {
        Self::with_clock(engine, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        engine: Box<dyn PipelineEngine>,
        config: CoordinatorConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (signals, _) = broadcast::channel(config.signal_capacity);
        Self {
            engine,
            clock,
            signals,
            effects: Vec::new(),
            next_source_id: 0,
            source: None,
            target: PlaybackTarget::Null,
            actual: EngineState::Null,
            requested: None,
            stream_length_ms: 0,
            seekability: Seekability::Unknown,
            position: Position::default(),
            tick_running: false,
            fill_running: false,
            buffering: BufferingPolicy::new(config.buffering_left_ratio),
            seek: SeekCoordinator::new(config.seek_window()),
            metadata: MetadataAggregator::new(),
            classifier: ErrorClassifier::new(),
            network: NetworkHandler::new(),
            config,
        }
    }

    /// Subscribe to GUI-facing signals
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerSignal> {
        self.signals.subscribe()
    }

    /// Sender side of the signal channel, for handles that subscribe later
    pub fn signal_sender(&self) -> broadcast::Sender<PlayerSignal> {
        self.signals.clone()
    }

    /// Drain the effects requested since the last call
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    fn emit(&self, signal: PlayerSignal) {
        trace!("Signal: {:?}", signal);
        // Ignore send errors (no subscribers is OK)
        let _ = self.signals.send(signal);
    }

    // ========================================
    // Commands
    // ========================================

    /// Open a new source, closing the current one first
    pub fn open(&mut self, source: MediaSource) -> Result<()> {
        if source.uri.trim().is_empty() {
            return Err(Error::InvalidSource("empty URI".to_string()));
        }
        self.open_source(source, true);
        Ok(())
    }

    fn open_source(&mut self, media: MediaSource, new_session: bool) {
        if self.source.is_some() {
            self.close();
        }

        self.reset_source_state();
        if new_session {
            self.network.reset_session();
            self.engine.set_credentials(None);
        }

        self.next_source_id += 1;
        let id = SourceId(self.next_source_id);
        info!("Opening {} as source {}", media.uri, id);

        self.target = PlaybackTarget::Ready;
        self.engine.open(id, &media);
        self.source = Some(OpenSource { id, media });

        // Baseline for the GUI, even when both lists are empty
        self.emit(PlayerSignal::SubtitlesChanged);
        self.emit(PlayerSignal::LanguagesChanged);
    }

    fn reset_source_state(&mut self) {
        self.actual = EngineState::Null;
        self.requested = None;
        self.stream_length_ms = 0;
        self.seekability = Seekability::Unknown;
        self.position = Position::default();
        self.buffering.reset();
        self.seek.reset();
        self.metadata.clear();
        self.classifier.reset();
    }

    /// Start or resume playback
    ///
    /// Succeeds even when a buffering, mount or credential hold defers the
    /// engine transition; it is issued when the hold lifts.
    pub fn play(&mut self) -> Result<()> {
        if self.source.is_none() {
            return Err(Error::NoSourceOpen);
        }
        self.target = PlaybackTarget::Playing;
        self.try_issue_playing();
        Ok(())
    }

    /// Pause playback, or stop a live source depending on policy
    pub fn pause(&mut self) -> Result<()> {
        if self.source.is_none() {
            return Err(Error::NoSourceOpen);
        }

        if self.config.live_pause_policy == LivePausePolicy::Stop && self.is_live() {
            info!("Stopping because we have a live stream");
            self.stop();
            return Ok(());
        }

        debug!("Pausing");
        self.target = PlaybackTarget::Paused;
        self.request_state(EngineState::Paused);
        Ok(())
    }

    /// Stop playback and rewind to the start
    ///
    /// Track lists and tags persist until `close`.
    pub fn stop(&mut self) {
        if self.source.is_none() {
            return;
        }
        self.stop_pipeline();
        self.emit_tick();
    }

    fn stop_pipeline(&mut self) {
        debug!("Stopping");
        self.target = PlaybackTarget::Ready;
        self.request_state(EngineState::Ready);

        self.seek.reset();
        self.position = Position::default();
        self.set_tick_timer(false);

        self.buffering.reset();
        self.set_fill_timer(false);
        self.emit(PlayerSignal::Buffering { fraction: 1.0 });
    }

    /// Close the current source and clear every per-source cache
    pub fn close(&mut self) {
        let Some(uri) = self.source().map(|m| m.uri.clone()) else {
            return;
        };
        info!("Closing {}", uri);

        self.stop_pipeline();
        self.source = None;

        let (mount, prompt) = self.network.cancel_all();
        if let Some(ticket) = mount {
            self.effects.push(Effect::CancelMount(ticket));
        }
        if let Some(ticket) = prompt {
            self.effects.push(Effect::CancelPrompt(ticket));
        }

        self.target = PlaybackTarget::Null;
        self.engine.set_state(EngineState::Null);
        self.reset_source_state();

        self.emit(PlayerSignal::SubtitlesChanged);
        self.emit(PlayerSignal::LanguagesChanged);
        self.emit_tick();
    }

    /// Seek to an absolute position in milliseconds
    pub fn seek_to(&mut self, time_ms: i64, accurate: bool) -> Result<()> {
        if self.source.is_none() {
            return Err(Error::NoSourceOpen);
        }
        if time_ms < 0 {
            return Err(Error::InvalidArgument(format!(
                "seek time must not be negative (got {}ms)",
                time_ms
            )));
        }

        let mut time = time_ms as u64;
        let length = self.stream_length();
        if length > 0 {
            time = time.min(length);
        }
        debug!("Seeking to {} of {}", format_media_time(time), format_stream_length(Some(length)));

        // Tick where we are going
        self.position.current_time_ms = time;
        self.emit_tick();

        match self.seek.request(time, accurate, self.clock.now()) {
            SeekDecision::Issue(command) => self.issue_seek(command),
            SeekDecision::Queued => {}
        }
        Ok(())
    }

    /// Seek to a fraction (0.0-1.0) of the stream length
    pub fn seek_fraction(&mut self, fraction: f64) -> Result<()> {
        if self.source.is_none() {
            return Err(Error::NoSourceOpen);
        }
        if !fraction.is_finite() || fraction < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "seek fraction must be between 0.0 and 1.0 (got {})",
                fraction
            )));
        }
        let length = self.stream_length();
        let time = (length as f64 * fraction.min(1.0)).round() as i64;
        self.seek_to(time, false)
    }

    /// Select a subtitle track by id, or `TRACK_NONE` to hide subtitles
    pub fn set_subtitle(&mut self, id: i32) -> Result<()> {
        if self.source.is_none() {
            return Err(Error::NoSourceOpen);
        }
        if !self.metadata.subtitles().iter().any(|t| t.id == id) {
            return Err(Error::InvalidArgument(format!("no subtitle track with id {}", id)));
        }

        if id == TRACK_NONE {
            debug!("Disabling subtitles");
            self.engine.select_stream(StreamKind::Text, None);
            return Ok(());
        }
        debug!("Setting subtitle track to {}", id);
        let index = id as usize;
        self.engine.select_stream(StreamKind::Text, Some(index));
        if let Some(tags) = self.engine.stream_tags(StreamKind::Text, index) {
            if self.metadata.merge_tags(StreamKind::Text, &tags) {
                self.emit(PlayerSignal::GotMetadata);
            }
        }
        Ok(())
    }

    /// Select an audio track by id
    ///
    /// On DVDs `TRACK_AUTO` hands the choice back to the engine.
    pub fn set_language(&mut self, id: i32) -> Result<()> {
        if self.source.is_none() {
            return Err(Error::NoSourceOpen);
        }
        if !self.metadata.languages().iter().any(|t| t.id == id) {
            return Err(Error::InvalidArgument(format!("no audio track with id {}", id)));
        }

        let is_dvd = self.source().is_some_and(|m| m.has_scheme("dvd"));
        let index = if is_dvd && id == TRACK_AUTO {
            None
        } else {
            Some(id as usize)
        };
        debug!("Setting language to {:?}", index);
        self.engine.select_stream(StreamKind::Audio, index);

        if let Some(tags) = index.and_then(|i| self.engine.stream_tags(StreamKind::Audio, i)) {
            self.metadata.merge_tags(StreamKind::Audio, &tags);
        }
        self.on_streams_changed();
        // Refresh metadata for the newly selected stream
        self.emit(PlayerSignal::GotMetadata);
        Ok(())
    }

    fn issue_seek(&mut self, command: SeekCommand) {
        debug!("Issuing seek to {}ms", command.time_ms);
        self.request_state(EngineState::Paused);
        self.engine.seek(command.time_ms, command.flags);
    }

    // ========================================
    // Queries
    // ========================================

    pub fn target(&self) -> PlaybackTarget {
        self.target
    }

    pub fn actual_state(&self) -> EngineState {
        self.actual
    }

    pub fn source(&self) -> Option<&MediaSource> {
        self.source.as_ref().map(|s| &s.media)
    }

    pub fn current_source_id(&self) -> Option<SourceId> {
        self.source.as_ref().map(|s| s.id)
    }

    /// The user wants playback (the engine may still be catching up)
    pub fn is_playing(&self) -> bool {
        self.target == PlaybackTarget::Playing
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Stream duration in ms, 0 when unknown
    ///
    /// Queries the engine while the length is still unknown.
    pub fn stream_length(&mut self) -> u64 {
        if self.stream_length_ms == 0 && self.source.is_some() {
            if let Some(length) = self.engine.query_duration() {
                if length > 0 {
                    debug!("Got stream length through query: {}ms", length);
                    self.stream_length_ms = length;
                }
            }
        }
        self.stream_length_ms
    }

    /// Whether the open source can seek
    ///
    /// Cached after the first successful engine query; falls back to
    /// "length is known" when the query fails.
    pub fn is_seekable(&mut self) -> bool {
        if self.source.is_none() {
            return false;
        }
        match self.seekability {
            Seekability::Yes => true,
            Seekability::No => false,
            Seekability::Unknown => match self.engine.query_seekable() {
                Some(seekable) => {
                    debug!("Seekable: {}", seekable);
                    self.seekability = if seekable {
                        Seekability::Yes
                    } else {
                        Seekability::No
                    };
                    seekable
                }
                None => {
                    debug!("Seekable query failed, using length as fallback");
                    self.stream_length() > 0
                }
            },
        }
    }

    pub fn gate(&self) -> PlaybackGate {
        if self.network.mount_pending() {
            PlaybackGate::HeldForMount
        } else if self.network.prompt_pending() {
            PlaybackGate::HeldForAuth
        } else if self.buffering.is_playback_held() {
            PlaybackGate::HeldForBuffering
        } else {
            PlaybackGate::Open
        }
    }

    pub fn subtitles(&self) -> &[TrackInfo] {
        self.metadata.subtitles()
    }

    pub fn languages(&self) -> &[TrackInfo] {
        self.metadata.languages()
    }

    pub fn tags(&self, scope: TagScope) -> &TagList {
        self.metadata.tags(scope)
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            source: self.source().cloned(),
            target: self.target,
            actual: self.actual,
            gate: self.gate(),
            stream_length_ms: self.stream_length_ms,
            seekability: self.seekability,
            position: self.position,
            buffering: self.buffering.phase(),
            buffering_fill: self.buffering.fill(),
            subtitles: self.metadata.subtitles().to_vec(),
            languages: self.metadata.languages().to_vec(),
        }
    }

    /// Live: unknown length, not seekable, and past Ready
    fn is_live(&mut self) -> bool {
        self.actual > EngineState::Ready
            && self.stream_length() == 0
            && self.engine.query_seekable() != Some(true)
    }

    // ========================================
    // Engine transitions
    // ========================================

    fn request_state(&mut self, state: EngineState) {
        debug!("Requesting engine state {}", state);
        self.requested = Some(state);
        self.engine.set_state(state);
    }

    /// The state the engine is heading to
    fn heading(&self) -> EngineState {
        self.requested.unwrap_or(self.actual)
    }

    /// Issue the Playing transition if the user wants it and nothing holds it
    fn try_issue_playing(&mut self) {
        if self.target != PlaybackTarget::Playing || self.source.is_none() {
            return;
        }
        if self.heading() == EngineState::Playing {
            trace!("Engine already playing or heading there");
            return;
        }
        let gate = self.gate();
        if gate != PlaybackGate::Open {
            debug!("Playback held ({:?}), deferring play", gate);
            return;
        }

        self.emit(PlayerSignal::PlayStarting);
        debug!("play");
        self.request_state(EngineState::Playing);
    }

    fn set_tick_timer(&mut self, running: bool) {
        if self.tick_running != running {
            self.tick_running = running;
            let interval = running.then(|| self.config.tick_interval());
            self.effects.push(Effect::SetTickTimer(interval));
        }
    }

    fn set_fill_timer(&mut self, running: bool) {
        if self.fill_running != running {
            self.fill_running = running;
            let interval = running.then(|| self.config.fill_poll_interval());
            self.effects.push(Effect::SetFillTimer(interval));
        }
    }

    fn emit_tick(&mut self) {
        let length = self.stream_length();
        let current = self.position.current_time_ms;
        self.position.fractional_position = if length > 0 {
            (current as f64 / length as f64).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let seekable = self.is_seekable();

        self.emit(PlayerSignal::Tick {
            current_time_ms: current,
            stream_length_ms: length,
            position: self.position.fractional_position,
            seekable,
        });
    }

    // ========================================
    // Timers
    // ========================================

    /// Position tick while playing
    pub fn on_tick(&mut self) {
        if self.source.is_none() {
            return;
        }
        if let Some(position) = self.engine.query_position() {
            self.position.current_time_ms = position;
        }
        self.emit_tick();
    }

    /// Download fill poll
    pub fn on_fill_tick(&mut self) {
        if self.source.is_none() {
            return;
        }
        let query = self.engine.query_buffering();
        let length = self.stream_length();
        let current = self.position.current_time_ms;

        let Some(poll) = self.buffering.poll(query, length, current) else {
            return;
        };
        self.emit(PlayerSignal::DownloadBuffering { fraction: poll.fill });

        if poll.ready && self.target == PlaybackTarget::Playing {
            debug!("Starting playback because the download buffer is filled enough");
            self.try_issue_playing();
        }
    }

    // ========================================
    // Asynchronous completions
    // ========================================

    /// A mount started by `Effect::StartMount` finished
    pub fn on_mount_finished(&mut self, ticket: MountTicket, result: std::result::Result<(), String>) {
        let current = self.current_source_id();
        if !self.network.finish_mount(ticket, current) {
            return;
        }
        let Some(media) = self.source().cloned() else {
            return;
        };

        match result {
            Ok(()) => {
                let resume = self.target == PlaybackTarget::Playing;
                info!("Mounted {}, reopening", media.uri);
                self.open_source(media, false);
                if resume {
                    if let Err(e) = self.play() {
                        warn!("Failed to resume after mount: {}", e);
                    }
                }
            }
            Err(message) => {
                warn!("Mounting {} failed: {}", media.uri, message);
                let err = EngineError::new(ErrorDomain::Resource, ErrorCode::OpenRead, message.clone())
                    .with_debug(message);
                self.fail(&err);
            }
        }
    }

    /// A credential prompt started by `Effect::PromptCredentials` finished
    pub fn on_credentials(&mut self, ticket: PromptTicket, reply: CredentialReply) {
        let current = self.current_source_id();
        let Some(credentials) = self.network.finish_prompt(ticket, current, reply) else {
            return;
        };
        self.engine.set_credentials(credentials);

        if self.target == PlaybackTarget::Playing {
            debug!("Starting deferred playback after authentication");
            // The transition that hit the challenge never completed
            self.requested = None;
            self.try_issue_playing();
        }
    }

    // ========================================
    // Engine notifications
    // ========================================

    /// Handle one engine notification
    pub fn handle_message(&mut self, message: EngineMessage) {
        let Some(event) = normalizer::normalize(message, self.current_source_id()) else {
            return;
        };

        match event {
            PipelineEvent::StateChanged { old, new } => self.on_state_changed(old, new),
            PipelineEvent::Error(err) => self.on_error(err),
            PipelineEvent::Warning(err) => warn!("Warning message: {}", err),
            PipelineEvent::EndOfStream => {
                info!("End of stream");
                self.emit(PlayerSignal::EndOfStream);
            }
            PipelineEvent::Buffering { percent, mode } => self.on_buffering(percent, mode),
            PipelineEvent::DurationChanged => {
                if let Some(length) = self.engine.query_duration() {
                    debug!("Got new stream length (through duration message): {}ms", length);
                    self.stream_length_ms = length;
                }
            }
            PipelineEvent::AsyncDone => self.on_async_done(),
            PipelineEvent::TagsUpdated { kind, index } => self.on_tags_updated(kind, index),
            PipelineEvent::StreamsChanged => self.on_streams_changed(),
            PipelineEvent::MountRequired { uri, resource } => self.on_mount_required(uri, resource),
            PipelineEvent::CredentialsRequired { uri } => self.request_credentials(uri),
            PipelineEvent::MissingPlugin {
                description,
                detail,
            } => self
                .classifier
                .record_missing_plugin(MissingPlugin { description, detail }),
            PipelineEvent::Redirect { uri } => {
                info!("Got redirect to '{}'", uri);
                self.emit(PlayerSignal::Redirect { uri });
            }
            PipelineEvent::Progress { percent } => {
                if !self.buffering.is_stream_buffering() {
                    self.emit(PlayerSignal::Buffering {
                        fraction: f64::from(percent) / 100.0,
                    });
                }
            }
            PipelineEvent::DownloadComplete => self.on_download_complete(),
        }
    }

    fn on_state_changed(&mut self, old: EngineState, new: EngineState) {
        debug!("Pipeline state changed {} -> {}", old, new);
        self.actual = new;
        if self.requested == Some(new) {
            self.requested = None;
        }

        if new == EngineState::Playing {
            self.classifier.forget_last_message();
            self.set_tick_timer(true);
        } else if self.tick_running {
            self.on_tick();
            self.set_tick_timer(false);
        }

        match (old, new) {
            (EngineState::Ready, EngineState::Paused) => self.on_preroll(),
            (EngineState::Paused, EngineState::Ready) => {
                debug!("Stream info invalidated, clearing tags");
                self.metadata.clear_tags();
            }
            _ => {}
        }
    }

    fn on_preroll(&mut self) {
        if let Some(length) = self.engine.query_duration() {
            self.stream_length_ms = length;
        }
        // With the length known, a live source may have to stop instead
        if self.target == PlaybackTarget::Paused {
            if let Err(e) = self.pause() {
                warn!("Failed to pause after preroll: {}", e);
            }
        }
        if !self.engine.has_video() {
            if let Some(record) = self.classifier.take_missing_video_decoder() {
                self.report(record);
            }
        }
    }

    fn on_error(&mut self, err: EngineError) {
        warn!("Engine error: {}", err);
        let Some(media) = self.source().cloned() else {
            return;
        };

        if !self.network.auth_aborted() {
            if self.network.prompt_pending() {
                debug!("Ignoring error, authentication in progress");
                return;
            }
            if errors::http_status(&err) == Some(401) && network::accepts_credentials(&media) {
                self.request_credentials(media.uri);
                return;
            }
        }

        if err.is(ErrorDomain::Stream, ErrorCode::Decode)
            && err.debug.contains(errors::NO_VALID_FRAMES_HINT)
        {
            debug!("Throwing EOS instead of an error when seeking to the end of an MPEG file");
            self.emit(PlayerSignal::EndOfStream);
            return;
        }

        self.fail(&err);
    }

    /// Classify `err` and stop everything
    fn fail(&mut self, err: &EngineError) {
        let Some(source) = self.source().cloned() else {
            return;
        };
        let ctx = ClassifyContext {
            source: &source,
            auth_aborted: self.network.auth_aborted(),
            supports_decryption: self.engine.supports_decryption(),
        };
        let record = self.classifier.classify(err, &ctx);

        self.target = PlaybackTarget::Null;
        self.request_state(EngineState::Null);
        self.seek.reset();
        self.buffering.reset();
        self.set_fill_timer(false);

        self.report(record);
    }

    fn report(&mut self, record: ErrorRecord) {
        if !self.classifier.should_emit(&record, self.actual) {
            return;
        }
        warn!("Playback error ({}): {}", record.kind, record.message);
        self.emit(PlayerSignal::Error {
            kind: record.kind,
            message: record.message,
            is_fatal: record.is_fatal,
            is_playback_stopped: record.is_playback_stopped,
        });
    }

    fn on_buffering(&mut self, percent: u8, mode: BufferingMode) {
        if mode == BufferingMode::Download {
            if self.buffering.on_download() {
                debug!("Pausing because we're not ready to play the buffer yet");
                self.request_state(EngineState::Paused);
                self.set_fill_timer(true);
            }
            return;
        }

        let step = self.buffering.on_stream(percent);
        if step.left_download {
            self.set_fill_timer(false);
        }
        self.emit(PlayerSignal::Buffering {
            fraction: f64::from(percent.min(100)) / 100.0,
        });

        match step.outcome {
            StreamOutcome::Hold => {
                if self.heading() == EngineState::Playing {
                    debug!("Buffering, pausing until the buffer is full");
                    self.request_state(EngineState::Paused);
                }
            }
            StreamOutcome::Release => {
                if self.target == PlaybackTarget::Playing {
                    debug!("Buffering done, setting pipeline back to PLAYING");
                    self.try_issue_playing();
                } else {
                    debug!("Buffering done, keeping pipeline {}", self.heading());
                }
            }
            StreamOutcome::Progress => {}
        }
    }

    fn on_download_complete(&mut self) {
        debug!("Download complete");
        self.buffering.mark_download_complete();
        // Last poll picks up the final fill level
        self.on_fill_tick();
        self.set_fill_timer(false);
    }

    fn on_async_done(&mut self) {
        if let Some(command) = self.seek.on_async_done(self.clock.now()) {
            self.issue_seek(command);
        } else if self.target == PlaybackTarget::Playing {
            debug!("Maybe starting deferred playback after seek");
            self.try_issue_playing();
        }
    }

    fn on_tags_updated(&mut self, kind: StreamKind, index: usize) {
        if self.engine.current_stream(kind) != Some(index) {
            trace!("Ignoring {:?} tags for stream {}, not the current one", kind, index);
            return;
        }
        let Some(tags) = self.engine.stream_tags(kind, index) else {
            return;
        };
        if self.metadata.merge_tags(kind, &tags) {
            self.emit(PlayerSignal::GotMetadata);
        }
    }

    fn on_streams_changed(&mut self) {
        let is_dvd = self.source().is_some_and(|m| m.has_scheme("dvd"));
        let changes = self.metadata.rebuild_tracks(self.engine.as_ref(), is_dvd);
        if changes.subtitles {
            self.emit(PlayerSignal::SubtitlesChanged);
        }
        if changes.languages {
            self.emit(PlayerSignal::LanguagesChanged);
        }
    }

    fn on_mount_required(&mut self, uri: String, resource: String) {
        let Some(id) = self.current_source_id() else {
            return;
        };
        info!("Trying to mount location '{}'", uri);

        // Stop, but keep the user's intent for after the mount
        let preserved = self.target;
        self.stop();
        self.target = preserved;

        let (ticket, replaced) = self.network.begin_mount(id);
        if let Some(old) = replaced {
            self.effects.push(Effect::CancelMount(old));
        }
        self.effects.push(Effect::StartMount {
            ticket,
            uri,
            resource,
        });
    }

    fn request_credentials(&mut self, uri: String) {
        let Some(id) = self.current_source_id() else {
            return;
        };
        if let Some(ticket) = self.network.begin_prompt(id) {
            info!("Trying to get auth for location '{}'", uri);
            self.effects.push(Effect::PromptCredentials { ticket, uri });
        }
    }
}
