//! Seek coalescing tests
//!
//! Time is driven by `ManualClock`, so window expiry is deterministic.

mod helpers;

use std::time::Duration;

use helpers::{EngineCall, Harness};
use totem_common::PlayerSignal;
use totem_pc::engine::{EngineState, SeekFlags};
use totem_pc::Error;

fn prerolled(duration_ms: u64) -> Harness {
    let mut h = Harness::new();
    h.engine.state().duration = Some(duration_ms);
    h.open("file:///movies/long.mkv");
    h.preroll();
    h.clear_calls();
    h.drain_signals();
    h
}

#[test]
fn test_scrubbing_sends_only_last_position() {
    let mut h = prerolled(60_000);

    h.controller.seek_to(1_000, false).unwrap();
    assert_eq!(h.seeks(), vec![1_000]);

    h.clock.advance(Duration::from_millis(10));
    h.controller.seek_to(5_000, false).unwrap();
    h.clock.advance(Duration::from_millis(10));
    h.controller.seek_to(9_000, false).unwrap();

    // Nothing reaches the engine while the first seek is in flight
    assert_eq!(h.seeks(), vec![1_000]);

    h.async_done();
    assert_eq!(h.seeks(), vec![1_000, 9_000]);

    h.async_done();
    assert_eq!(h.seeks(), vec![1_000, 9_000]);
}

#[test]
fn test_seek_after_window_issues_immediately() {
    let mut h = prerolled(60_000);

    h.controller.seek_to(1_000, false).unwrap();
    h.clock.advance(Duration::from_millis(150));
    h.controller.seek_to(2_000, false).unwrap();
    assert_eq!(h.seeks(), vec![1_000, 2_000]);
}

#[test]
fn test_scrub_waits_for_latest_issued_seek() {
    let mut h = prerolled(60_000);

    h.controller.seek_to(1_000, false).unwrap();
    h.clock.advance(Duration::from_millis(150));
    h.controller.seek_to(2_000, false).unwrap();
    assert_eq!(h.seeks(), vec![1_000, 2_000]);

    // Completion of the first seek; the second is still in flight
    h.async_done();
    h.clock.advance(Duration::from_millis(10));
    h.controller.seek_to(3_000, false).unwrap();
    assert_eq!(h.seeks(), vec![1_000, 2_000]);

    h.async_done();
    assert_eq!(h.seeks(), vec![1_000, 2_000, 3_000]);
}

#[test]
fn test_accurate_seek_bypasses_window() {
    let mut h = prerolled(60_000);

    h.controller.seek_to(1_000, false).unwrap();
    h.controller.seek_to(7_500, true).unwrap();

    assert_eq!(h.seeks(), vec![1_000, 7_500]);
    assert!(h.calls().contains(&EngineCall::Seek {
        time_ms: 7_500,
        flags: SeekFlags {
            flush: true,
            accurate: true,
        },
    }));
}

#[test]
fn test_seek_pauses_engine_then_flushes() {
    let mut h = prerolled(60_000);

    h.controller.seek_to(3_000, false).unwrap();
    assert_eq!(
        h.calls(),
        vec![
            EngineCall::SetState(EngineState::Paused),
            EngineCall::Seek {
                time_ms: 3_000,
                flags: SeekFlags {
                    flush: true,
                    accurate: false,
                },
            },
        ]
    );
}

#[test]
fn test_seek_clamps_to_length_and_ticks() {
    let mut h = prerolled(60_000);

    h.controller.seek_to(90_000, false).unwrap();
    assert_eq!(h.seeks(), vec![60_000]);
    assert_eq!(
        h.drain_signals(),
        vec![PlayerSignal::Tick {
            current_time_ms: 60_000,
            stream_length_ms: 60_000,
            position: 1.0,
            seekable: true,
        }]
    );
}

#[test]
fn test_seek_without_known_length_is_not_clamped() {
    let mut h = Harness::new();
    h.open("http://example.org/stream");
    h.clear_calls();

    h.controller.seek_to(90_000, false).unwrap();
    assert_eq!(h.seeks(), vec![90_000]);
}

#[test]
fn test_seek_argument_validation() {
    let mut h = prerolled(60_000);

    assert!(matches!(
        h.controller.seek_to(-1, false),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        h.controller.seek_fraction(f64::NAN),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        h.controller.seek_fraction(-0.2),
        Err(Error::InvalidArgument(_))
    ));
    assert!(h.seeks().is_empty());

    h.controller.seek_fraction(0.5).unwrap();
    assert_eq!(h.seeks(), vec![30_000]);
}

#[test]
fn test_playback_resumes_after_seek() {
    let mut h = prerolled(60_000);
    h.controller.play().unwrap();
    h.state_changed(EngineState::Paused, EngineState::Playing);
    h.clear_calls();

    h.controller.seek_to(20_000, false).unwrap();
    assert_eq!(h.state_requests(EngineState::Paused), 1);

    h.async_done();
    assert_eq!(h.state_requests(EngineState::Playing), 1);
}

#[test]
fn test_stop_discards_queued_seek() {
    let mut h = prerolled(60_000);

    h.controller.seek_to(1_000, false).unwrap();
    h.controller.seek_to(5_000, false).unwrap();
    h.controller.stop();

    h.async_done();
    assert_eq!(h.seeks(), vec![1_000]);
}
