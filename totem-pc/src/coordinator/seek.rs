//! Seek coordinator
//!
//! Coalesces rapid seek requests (UI scrubbing) so the engine never works
//! through a backlog: while a seek is in flight and the coalescing window
//! has not elapsed, new requests overwrite a single pending slot. The
//! pending seek is issued when the engine reports completion, so the last
//! requested position is always honored.

use crate::engine::SeekFlags;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// A queued seek waiting for the in-flight one to complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSeek {
    pub requested_time_ms: u64,
    pub requested_at: Instant,
    pub accurate: bool,
}

/// A seek the controller must send to the engine now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekCommand {
    pub time_ms: u64,
    pub flags: SeekFlags,
}

impl SeekCommand {
    fn new(time_ms: u64, accurate: bool) -> Self {
        Self {
            time_ms,
            flags: SeekFlags {
                flush: true,
                accurate,
            },
        }
    }
}

/// Outcome of a seek request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDecision {
    Issue(SeekCommand),
    Queued,
}

#[derive(Debug)]
pub struct SeekCoordinator {
    window: Duration,
    /// Seeks sent to the engine whose `AsyncDone` has not arrived yet
    outstanding: u32,
    last_issued_at: Option<Instant>,
    pending: Option<PendingSeek>,
}

impl SeekCoordinator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            outstanding: 0,
            last_issued_at: None,
            pending: None,
        }
    }

    pub fn pending(&self) -> Option<&PendingSeek> {
        self.pending.as_ref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.outstanding > 0
    }

    fn window_elapsed(&self, now: Instant) -> bool {
        match self.last_issued_at {
            None => true,
            Some(at) => now.saturating_duration_since(at) > self.window,
        }
    }

    /// Decide whether a seek to `time_ms` goes out now or waits
    pub fn request(&mut self, time_ms: u64, accurate: bool, now: Instant) -> SeekDecision {
        if !self.is_in_flight() || self.window_elapsed(now) || accurate {
            if let Some(dropped) = self.pending.take() {
                trace!("Superseding queued seek to {}ms", dropped.requested_time_ms);
            }
            self.outstanding += 1;
            self.last_issued_at = Some(now);
            return SeekDecision::Issue(SeekCommand::new(time_ms, accurate));
        }

        debug!("Not long enough since last seek, queuing seek to {}ms", time_ms);
        self.pending = Some(PendingSeek {
            requested_time_ms: time_ms,
            requested_at: now,
            accurate,
        });
        SeekDecision::Queued
    }

    /// The engine finished an asynchronous operation
    ///
    /// Returns the queued seek to issue now, if any. A queued seek waits
    /// until every seek already sent has completed.
    pub fn on_async_done(&mut self, now: Instant) -> Option<SeekCommand> {
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.is_in_flight() {
            trace!("{} seek(s) still in flight", self.outstanding);
            return None;
        }
        let pending = self.pending.take()?;

        debug!("Have an old seek to schedule, doing it now ({}ms)", pending.requested_time_ms);
        self.outstanding = 1;
        self.last_issued_at = Some(now);
        Some(SeekCommand::new(pending.requested_time_ms, pending.accurate))
    }

    /// Forget all seek state (stop/open/close)
    pub fn reset(&mut self) {
        self.outstanding = 0;
        self.last_issued_at = None;
        self.pending = None;
    }
}
