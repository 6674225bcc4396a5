//! Test helpers for totem-pc integration tests
//!
//! Provides reusable test infrastructure components:
//! - MockEngine: records every engine command, answers queries from
//!   shared state the test can change at any time
//! - ManualClock: monotonic clock advanced explicitly
//! - Harness: controller wired to both, plus notification shortcuts

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use totem_common::PlayerSignal;
use totem_pc::coordinator::{Clock, Effect};
use totem_pc::engine::{
    BufferingMode, BufferingQuery, Credentials, EngineError, EngineMessage, EngineNotification,
    EngineState, MediaSource, PipelineEngine, SeekFlags, SourceId, StreamKind, TagList,
};
use totem_pc::{CoordinatorConfig, PlaybackController};

/// A command the controller sent to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Open { source: SourceId, uri: String },
    SetState(EngineState),
    Seek { time_ms: u64, flags: SeekFlags },
    SetCredentials(Option<Credentials>),
    SelectStream { kind: StreamKind, index: Option<usize> },
}

/// Query answers and recorded calls shared between test and engine
#[derive(Debug)]
pub struct MockState {
    pub calls: Vec<EngineCall>,
    pub duration: Option<u64>,
    pub position: Option<u64>,
    pub seekable: Option<bool>,
    pub buffering: Option<BufferingQuery>,
    pub streams: HashMap<StreamKind, Vec<TagList>>,
    pub current: HashMap<StreamKind, usize>,
    pub has_video: bool,
    pub supports_decryption: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            duration: None,
            position: None,
            seekable: None,
            buffering: None,
            streams: HashMap::new(),
            current: HashMap::new(),
            has_video: true,
            supports_decryption: false,
        }
    }
}

/// Recording engine spy
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn record(&self, call: EngineCall) {
        self.state().calls.push(call);
    }
}

impl PipelineEngine for MockEngine {
    fn open(&mut self, source_id: SourceId, source: &MediaSource) {
        self.record(EngineCall::Open {
            source: source_id,
            uri: source.uri.clone(),
        });
    }

    fn set_state(&mut self, state: EngineState) {
        self.record(EngineCall::SetState(state));
    }

    fn seek(&mut self, time_ms: u64, flags: SeekFlags) {
        self.record(EngineCall::Seek { time_ms, flags });
    }

    fn query_duration(&self) -> Option<u64> {
        self.state().duration
    }

    fn query_position(&self) -> Option<u64> {
        self.state().position
    }

    fn query_seekable(&self) -> Option<bool> {
        self.state().seekable
    }

    fn query_buffering(&self) -> Option<BufferingQuery> {
        self.state().buffering
    }

    fn stream_count(&self, kind: StreamKind) -> usize {
        self.state().streams.get(&kind).map_or(0, Vec::len)
    }

    fn current_stream(&self, kind: StreamKind) -> Option<usize> {
        self.state().current.get(&kind).copied()
    }

    fn stream_tags(&self, kind: StreamKind, index: usize) -> Option<TagList> {
        self.state().streams.get(&kind)?.get(index).cloned()
    }

    fn select_stream(&mut self, kind: StreamKind, index: Option<usize>) {
        self.record(EngineCall::SelectStream { kind, index });
        let mut state = self.state();
        match index {
            Some(index) => state.current.insert(kind, index),
            None => state.current.remove(&kind),
        };
    }

    fn set_credentials(&mut self, credentials: Option<Credentials>) {
        self.record(EngineCall::SetCredentials(credentials));
    }

    fn has_video(&self) -> bool {
        self.state().has_video
    }

    fn supports_decryption(&self) -> bool {
        self.state().supports_decryption
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

/// Build a tag list from key/value pairs
pub fn tags(pairs: &[(&str, &str)]) -> TagList {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Controller wired to a `MockEngine` and a `ManualClock`
pub struct Harness {
    pub controller: PlaybackController,
    pub engine: MockEngine,
    pub clock: Arc<ManualClock>,
    pub signals: broadcast::Receiver<PlayerSignal>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    pub fn with_config(config: CoordinatorConfig) -> Self {
        let engine = MockEngine::new();
        let clock = Arc::new(ManualClock::new());
        let controller =
            PlaybackController::with_clock(Box::new(engine.clone()), config, clock.clone());
        let signals = controller.subscribe();
        Self {
            controller,
            engine,
            clock,
            signals,
        }
    }

    /// Open `uri` and return the id the engine was handed
    pub fn open(&mut self, uri: &str) -> SourceId {
        self.controller.open(MediaSource::new(uri)).unwrap();
        self.controller.current_source_id().unwrap()
    }

    /// Deliver a notification tagged with the current source
    pub fn notify(&mut self, notification: EngineNotification) {
        let source = self.controller.current_source_id().unwrap_or(SourceId(0));
        self.controller
            .handle_message(EngineMessage::new(source, notification));
    }

    pub fn state_changed(&mut self, old: EngineState, new: EngineState) {
        self.notify(EngineNotification::StateChanged {
            old,
            new,
            from_pipeline: true,
        });
    }

    /// Null → Ready → Paused, as the engine reports after `open`
    pub fn preroll(&mut self) {
        self.state_changed(EngineState::Null, EngineState::Ready);
        self.state_changed(EngineState::Ready, EngineState::Paused);
    }

    pub fn buffering(&mut self, percent: u8, mode: BufferingMode) {
        self.notify(EngineNotification::Buffering { percent, mode });
    }

    pub fn error(&mut self, err: EngineError) {
        self.notify(EngineNotification::Error(err));
    }

    pub fn async_done(&mut self) {
        self.notify(EngineNotification::AsyncDone);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.engine.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.engine.state().calls.clear();
    }

    /// How many times the controller asked the engine for `state`
    pub fn state_requests(&self, state: EngineState) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == EngineCall::SetState(state))
            .count()
    }

    pub fn seeks(&self) -> Vec<u64> {
        self.calls()
            .iter()
            .filter_map(|call| match call {
                EngineCall::Seek { time_ms, .. } => Some(*time_ms),
                _ => None,
            })
            .collect()
    }

    pub fn drain_signals(&mut self) -> Vec<PlayerSignal> {
        let mut out = Vec::new();
        while let Ok(signal) = self.signals.try_recv() {
            out.push(signal);
        }
        out
    }

    pub fn effects(&mut self) -> Vec<Effect> {
        self.controller.take_effects()
    }
}
