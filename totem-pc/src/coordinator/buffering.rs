//! Buffering policy
//!
//! Decides when engine buffering must hold back playback and when the hold
//! may be released. Two mutually exclusive modes:
//!
//! - **Stream**: the engine reports a fill percentage. Below 100% playback
//!   is held; 100% releases the hold.
//! - **Download**: the engine downloads the whole file. Playback is held
//!   and the fill level is polled until the remaining download time
//!   comfortably fits in the remaining play time.
//!
//! Once a source has entered stream mode, download notifications are
//! ignored until the next open/close cycle.
//!
//! The policy only decides; the controller drives the engine and emits the
//! GUI signals.

use crate::engine::BufferingQuery;
use serde::Serialize;
use tracing::debug;

/// Which buffering mode is active for the open source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BufferingPhase {
    Idle,
    Stream,
    Download,
}

/// What a stream buffering notification means for playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// First notification below 100%: hold playback
    Hold,
    /// 100% while held (in either mode): release the hold
    Release,
    /// Fill level update only
    Progress,
}

/// Result of handling a stream buffering notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStep {
    pub outcome: StreamOutcome,
    /// The source switched away from download mode; stop the fill poll
    pub left_download: bool,
}

/// Result of one download fill poll
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadPoll {
    pub fill: f64,
    /// Enough is downloaded to play through
    pub ready: bool,
    /// This poll cleared the playback hold
    pub released: bool,
}

#[derive(Debug, Clone)]
pub struct BufferingPolicy {
    left_ratio: f64,
    phase: BufferingPhase,
    held: bool,
    fill: f64,
    /// Estimated download time left; `None` when the engine cannot tell
    time_remaining_ms: Option<u64>,
    download_complete: bool,
}

impl BufferingPolicy {
    pub fn new(left_ratio: f64) -> Self {
        Self {
            left_ratio,
            phase: BufferingPhase::Idle,
            held: false,
            fill: 1.0,
            time_remaining_ms: None,
            download_complete: false,
        }
    }

    pub fn phase(&self) -> BufferingPhase {
        self.phase
    }

    pub fn is_playback_held(&self) -> bool {
        self.held
    }

    /// Stream buffering is in progress (hold active in stream mode)
    pub fn is_stream_buffering(&self) -> bool {
        self.phase == BufferingPhase::Stream && self.held
    }

    pub fn fill(&self) -> f64 {
        self.fill
    }

    pub fn time_remaining_ms(&self) -> Option<u64> {
        self.time_remaining_ms
    }

    /// Handle a stream-mode buffering notification (0-100)
    pub fn on_stream(&mut self, percent: u8) -> StreamStep {
        let left_download = self.phase == BufferingPhase::Download;
        let was_held = self.held;
        if left_download {
            debug!("Switched from download buffering to stream buffering");
            self.time_remaining_ms = None;
            self.download_complete = false;
            // The download hold does not carry over
            self.held = false;
        }

        self.phase = BufferingPhase::Stream;
        self.fill = f64::from(percent.min(100)) / 100.0;

        let outcome = if percent < 100 {
            if self.held {
                StreamOutcome::Progress
            } else {
                self.held = true;
                StreamOutcome::Hold
            }
        } else if was_held {
            self.held = false;
            StreamOutcome::Release
        } else {
            StreamOutcome::Progress
        };

        StreamStep {
            outcome,
            left_download,
        }
    }

    /// Handle a download-mode buffering notification
    ///
    /// Returns `true` when download buffering starts (hold playback and
    /// start the fill poll).
    pub fn on_download(&mut self) -> bool {
        match self.phase {
            BufferingPhase::Idle => {
                self.phase = BufferingPhase::Download;
                self.held = true;
                self.fill = 0.0;
                true
            }
            BufferingPhase::Download => false,
            BufferingPhase::Stream => {
                debug!("Ignoring download buffering notification while stream buffering");
                false
            }
        }
    }

    /// Whether enough of the file is downloaded to play through
    pub fn download_ready(&self, length_ms: u64, current_ms: u64) -> bool {
        if self.download_complete {
            return true;
        }
        match self.time_remaining_ms {
            Some(0) => {
                debug!("Buffering left is 0, so buffering done");
                true
            }
            None => {
                debug!("Buffering left not available, so buffering done");
                true
            }
            Some(_) if length_ms == 0 => false,
            Some(left) => {
                let needed = left as f64 * self.left_ratio;
                let playable = length_ms.saturating_sub(current_ms) as f64;
                needed < playable
            }
        }
    }

    /// Apply one fill poll
    ///
    /// `None` when not download buffering or the engine query failed.
    pub fn poll(
        &mut self,
        query: Option<BufferingQuery>,
        length_ms: u64,
        current_ms: u64,
    ) -> Option<DownloadPoll> {
        if self.phase != BufferingPhase::Download {
            return None;
        }
        let Some(query) = query else {
            debug!("Failed to query the engine for download buffering info");
            return None;
        };

        self.fill = query.fill.clamp(0.0, 1.0);
        self.time_remaining_ms = query.estimated_remaining_ms;

        let ready = self.download_ready(length_ms, current_ms);
        let released = ready && self.held;
        if released {
            self.held = false;
        }

        debug!(
            "Download buffer filled up to {:.1}% (left: {:?}ms, ready: {})",
            self.fill * 100.0,
            self.time_remaining_ms,
            ready
        );

        Some(DownloadPoll {
            fill: self.fill,
            ready,
            released,
        })
    }

    pub fn mark_download_complete(&mut self) {
        self.download_complete = true;
    }

    /// Forget everything (stop/open/close)
    pub fn reset(&mut self) {
        self.phase = BufferingPhase::Idle;
        self.held = false;
        self.fill = 1.0;
        self.time_remaining_ms = None;
        self.download_complete = false;
    }
}
