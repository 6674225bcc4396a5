//! Playback state controller tests
//!
//! Command handling, engine state reconciliation and per-source cache
//! lifetime.

mod helpers;

use std::time::Duration;

use helpers::{tags, EngineCall, Harness};
use totem_common::PlayerSignal;
use totem_pc::config::LivePausePolicy;
use totem_pc::coordinator::{Effect, Seekability, TagScope, TRACK_AUTO, TRACK_NONE};
use totem_pc::engine::{
    EngineMessage, EngineNotification, EngineState, MediaSource, StreamKind,
};
use totem_pc::{CoordinatorConfig, Error, PlaybackTarget};

fn media_with_tracks(h: &Harness) {
    let mut state = h.engine.state();
    state.duration = Some(60_000);
    state.seekable = Some(true);
    state.streams.insert(
        StreamKind::Audio,
        vec![
            tags(&[("language-code", "en"), ("audio-codec", "Opus")]),
            tags(&[("language-code", "fr"), ("audio-codec", "Opus")]),
        ],
    );
    state
        .streams
        .insert(StreamKind::Text, vec![tags(&[("language-code", "de")])]);
    state.current.insert(StreamKind::Audio, 0);
}

#[test]
fn test_open_close_leaves_caches_empty() {
    let mut h = Harness::new();
    media_with_tracks(&h);

    h.open("file:///movies/bunny.mkv");
    h.preroll();
    h.notify(EngineNotification::StreamsChanged);
    h.notify(EngineNotification::TagsUpdated {
        kind: StreamKind::Audio,
        index: 0,
    });

    assert_eq!(h.controller.stream_length(), 60_000);
    assert!(h.controller.is_seekable());
    assert_eq!(h.controller.languages().len(), 2);
    assert_eq!(h.controller.subtitles().len(), 2);
    assert!(!h.controller.tags(TagScope::Global).is_empty());

    h.controller.close();

    let snapshot = h.controller.snapshot();
    assert!(snapshot.source.is_none());
    assert_eq!(snapshot.target, PlaybackTarget::Null);
    assert_eq!(snapshot.stream_length_ms, 0);
    assert_eq!(snapshot.seekability, Seekability::Unknown);
    assert!(snapshot.subtitles.is_empty());
    assert!(snapshot.languages.is_empty());
    assert!(h.controller.tags(TagScope::Global).is_empty());
    assert!(h.controller.tags(TagScope::Audio).is_empty());
    assert_eq!(h.controller.stream_length(), 0);
    assert!(!h.controller.is_seekable());
    assert_eq!(h.calls().last(), Some(&EngineCall::SetState(EngineState::Null)));
}

#[test]
fn test_close_emits_baseline_signals() {
    let mut h = Harness::new();
    h.open("file:///a.ogg");
    h.drain_signals();

    h.controller.close();

    let signals = h.drain_signals();
    assert!(signals.contains(&PlayerSignal::SubtitlesChanged));
    assert!(signals.contains(&PlayerSignal::LanguagesChanged));
    assert!(signals.contains(&PlayerSignal::Tick {
        current_time_ms: 0,
        stream_length_ms: 0,
        position: 0.0,
        seekable: false,
    }));
}

#[test]
fn test_open_rejects_empty_uri() {
    let mut h = Harness::new();
    let result = h.controller.open(MediaSource::new("   "));
    assert!(matches!(result, Err(Error::InvalidSource(_))));
    assert!(h.calls().is_empty());
}

#[test]
fn test_commands_without_source() {
    let mut h = Harness::new();
    assert!(matches!(h.controller.play(), Err(Error::NoSourceOpen)));
    assert!(matches!(h.controller.pause(), Err(Error::NoSourceOpen)));
    assert!(matches!(h.controller.seek_to(1_000, false), Err(Error::NoSourceOpen)));
    assert!(matches!(h.controller.seek_fraction(0.5), Err(Error::NoSourceOpen)));

    // stop and close are harmless no-ops
    h.controller.stop();
    h.controller.close();
    assert!(h.calls().is_empty());
    assert!(h.drain_signals().is_empty());
}

#[test]
fn test_play_issues_playing_once() {
    let mut h = Harness::new();
    h.open("file:///a.ogg");
    h.drain_signals();
    h.clear_calls();

    h.controller.play().unwrap();
    assert_eq!(h.state_requests(EngineState::Playing), 1);
    assert!(h.drain_signals().contains(&PlayerSignal::PlayStarting));

    // Already heading to Playing
    h.controller.play().unwrap();
    assert_eq!(h.state_requests(EngineState::Playing), 1);
    assert!(h.controller.is_playing());
}

#[test]
fn test_reopen_closes_previous_and_drops_stale_messages() {
    let mut h = Harness::new();
    let first = h.open("file:///a.ogg");
    let second = h.open("file:///b.ogg");
    assert_ne!(first, second);
    assert!(h
        .calls()
        .contains(&EngineCall::SetState(EngineState::Null)));

    h.controller.handle_message(EngineMessage::new(
        first,
        EngineNotification::StateChanged {
            old: EngineState::Null,
            new: EngineState::Ready,
            from_pipeline: true,
        },
    ));
    assert_eq!(h.controller.actual_state(), EngineState::Null);

    h.state_changed(EngineState::Null, EngineState::Ready);
    assert_eq!(h.controller.actual_state(), EngineState::Ready);
}

#[test]
fn test_tick_timer_follows_playing_state() {
    let mut h = Harness::new();
    h.engine.state().duration = Some(10_000);
    h.open("file:///a.ogg");
    h.preroll();
    h.controller.play().unwrap();
    h.effects();

    h.state_changed(EngineState::Paused, EngineState::Playing);
    assert_eq!(
        h.effects(),
        vec![Effect::SetTickTimer(Some(Duration::from_millis(200)))]
    );

    h.engine.state().position = Some(2_500);
    h.controller.on_tick();
    let ticks: Vec<_> = h
        .drain_signals()
        .into_iter()
        .filter(|s| matches!(s, PlayerSignal::Tick { .. }))
        .collect();
    assert_eq!(
        ticks.last(),
        Some(&PlayerSignal::Tick {
            current_time_ms: 2_500,
            stream_length_ms: 10_000,
            position: 0.25,
            // Seekable query fails, known length stands in
            seekable: true,
        })
    );

    // Leaving Playing sends a final tick and stops the timer
    h.state_changed(EngineState::Playing, EngineState::Paused);
    assert_eq!(h.effects(), vec![Effect::SetTickTimer(None)]);
    assert!(h
        .drain_signals()
        .iter()
        .any(|s| matches!(s, PlayerSignal::Tick { .. })));
}

#[test]
fn test_stop_rewinds_and_keeps_tracks() {
    let mut h = Harness::new();
    media_with_tracks(&h);
    h.open("file:///movies/bunny.mkv");
    h.preroll();
    h.notify(EngineNotification::StreamsChanged);
    h.controller.play().unwrap();
    h.state_changed(EngineState::Paused, EngineState::Playing);
    h.drain_signals();

    h.controller.stop();

    assert_eq!(h.controller.target(), PlaybackTarget::Ready);
    assert_eq!(h.calls().last(), Some(&EngineCall::SetState(EngineState::Ready)));
    assert_eq!(h.controller.position().current_time_ms, 0);
    assert_eq!(h.controller.languages().len(), 2);

    let signals = h.drain_signals();
    assert!(signals.contains(&PlayerSignal::Buffering { fraction: 1.0 }));
    assert!(signals.contains(&PlayerSignal::Tick {
        current_time_ms: 0,
        stream_length_ms: 60_000,
        position: 0.0,
        seekable: true,
    }));
}

#[test]
fn test_pause_on_seekable_source() {
    let mut h = Harness::new();
    h.engine.state().duration = Some(60_000);
    h.open("file:///a.ogg");
    h.preroll();
    h.controller.play().unwrap();
    h.state_changed(EngineState::Paused, EngineState::Playing);
    h.clear_calls();

    h.controller.pause().unwrap();
    assert_eq!(h.controller.target(), PlaybackTarget::Paused);
    assert_eq!(h.calls(), vec![EngineCall::SetState(EngineState::Paused)]);
}

fn play_live_stream(h: &mut Harness) {
    {
        let mut state = h.engine.state();
        state.duration = None;
        state.seekable = Some(false);
    }
    h.open("http://radio.example.org/live");
    h.preroll();
    h.controller.play().unwrap();
    h.state_changed(EngineState::Paused, EngineState::Playing);
    h.clear_calls();
}

#[test]
fn test_pause_on_live_stream_stops() {
    let mut h = Harness::new();
    play_live_stream(&mut h);

    h.controller.pause().unwrap();
    assert_eq!(h.controller.target(), PlaybackTarget::Ready);
    assert_eq!(h.state_requests(EngineState::Ready), 1);
    assert_eq!(h.state_requests(EngineState::Paused), 0);
}

#[test]
fn test_pause_on_live_stream_with_pause_policy() {
    let config = CoordinatorConfig {
        live_pause_policy: LivePausePolicy::Pause,
        ..CoordinatorConfig::default()
    };
    let mut h = Harness::with_config(config);
    play_live_stream(&mut h);

    h.controller.pause().unwrap();
    assert_eq!(h.controller.target(), PlaybackTarget::Paused);
    assert_eq!(h.state_requests(EngineState::Paused), 1);
}

#[test]
fn test_pause_before_preroll_on_live_stream_stops() {
    let mut h = Harness::new();
    {
        let mut state = h.engine.state();
        state.duration = None;
        state.seekable = Some(false);
    }
    h.open("http://radio.example.org/live");
    h.controller.pause().unwrap();
    assert_eq!(h.controller.target(), PlaybackTarget::Paused);
    h.clear_calls();

    // Only after preroll is it known that the source is live
    h.preroll();

    assert_eq!(h.controller.target(), PlaybackTarget::Ready);
    assert_eq!(h.state_requests(EngineState::Ready), 1);
    assert_eq!(h.state_requests(EngineState::Paused), 0);
}

#[test]
fn test_track_lists_signal_only_on_change() {
    let mut h = Harness::new();
    media_with_tracks(&h);
    h.open("file:///movies/bunny.mkv");
    h.drain_signals();

    h.notify(EngineNotification::StreamsChanged);
    let signals = h.drain_signals();
    assert!(signals.contains(&PlayerSignal::SubtitlesChanged));
    assert!(signals.contains(&PlayerSignal::LanguagesChanged));

    let subtitles = h.controller.subtitles();
    assert_eq!(subtitles[0].id, -2);
    assert_eq!(subtitles[0].codec.as_deref(), Some("none"));
    assert_eq!(subtitles[1].language_code, "de");
    let languages = h.controller.languages();
    assert_eq!(languages[1].language_code, "fr");
    assert_eq!(languages[1].id, 1);

    h.notify(EngineNotification::StreamsChanged);
    assert!(h.drain_signals().is_empty());

    // A one-field difference is a change
    h.engine
        .state()
        .streams
        .get_mut(&StreamKind::Audio)
        .unwrap()[1]
        .insert("language-code".to_string(), "es".to_string());
    h.notify(EngineNotification::StreamsChanged);
    assert_eq!(h.drain_signals(), vec![PlayerSignal::LanguagesChanged]);
}

#[test]
fn test_dvd_languages_start_with_auto() {
    let mut h = Harness::new();
    h.engine
        .state()
        .streams
        .insert(StreamKind::Audio, vec![tags(&[("language-code", "en")])]);
    h.open("dvd:///dev/sr0");
    h.notify(EngineNotification::StreamsChanged);

    let languages = h.controller.languages();
    assert_eq!(languages.len(), 2);
    assert_eq!(languages[0].id, 0);
    assert_eq!(languages[0].codec.as_deref(), Some("auto"));
    assert_eq!(languages[1].language_code, "en");
}

#[test]
fn test_select_subtitle_track() {
    let mut h = Harness::new();
    media_with_tracks(&h);
    h.open("file:///movies/bunny.mkv");
    h.notify(EngineNotification::StreamsChanged);
    h.drain_signals();
    h.clear_calls();

    h.controller.set_subtitle(0).unwrap();
    assert_eq!(
        h.calls(),
        vec![EngineCall::SelectStream {
            kind: StreamKind::Text,
            index: Some(0),
        }]
    );
    assert_eq!(h.drain_signals(), vec![PlayerSignal::GotMetadata]);

    h.clear_calls();
    h.controller.set_subtitle(TRACK_NONE).unwrap();
    assert_eq!(
        h.calls(),
        vec![EngineCall::SelectStream {
            kind: StreamKind::Text,
            index: None,
        }]
    );

    assert!(matches!(
        h.controller.set_subtitle(3),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_select_audio_track() {
    let mut h = Harness::new();
    media_with_tracks(&h);
    h.open("file:///movies/bunny.mkv");
    h.notify(EngineNotification::StreamsChanged);
    h.drain_signals();
    h.clear_calls();

    h.controller.set_language(1).unwrap();

    assert_eq!(
        h.calls(),
        vec![EngineCall::SelectStream {
            kind: StreamKind::Audio,
            index: Some(1),
        }]
    );
    assert_eq!(h.drain_signals(), vec![PlayerSignal::GotMetadata]);
    assert_eq!(
        h.controller
            .tags(TagScope::Audio)
            .get("language-code")
            .map(String::as_str),
        Some("fr")
    );

    // Tags of the newly selected stream now pass the current-stream check
    h.notify(EngineNotification::TagsUpdated {
        kind: StreamKind::Audio,
        index: 1,
    });
    assert!(h.drain_signals().is_empty());

    assert!(matches!(
        h.controller.set_language(TRACK_NONE),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_dvd_auto_language_lets_engine_choose() {
    let mut h = Harness::new();
    h.engine.state().streams.insert(
        StreamKind::Audio,
        vec![
            tags(&[("language-code", "en")]),
            tags(&[("language-code", "fr")]),
        ],
    );
    h.open("dvd:///dev/sr0");
    h.notify(EngineNotification::StreamsChanged);
    h.clear_calls();

    h.controller.set_language(TRACK_AUTO).unwrap();
    assert_eq!(
        h.calls(),
        vec![EngineCall::SelectStream {
            kind: StreamKind::Audio,
            index: None,
        }]
    );
}

#[test]
fn test_track_selection_requires_source() {
    let mut h = Harness::new();
    assert!(matches!(h.controller.set_subtitle(TRACK_NONE), Err(Error::NoSourceOpen)));
    assert!(matches!(h.controller.set_language(0), Err(Error::NoSourceOpen)));
}

#[test]
fn test_tags_from_current_stream_only() {
    let mut h = Harness::new();
    media_with_tracks(&h);
    h.open("file:///movies/bunny.mkv");
    h.drain_signals();

    let audio = |index| EngineNotification::TagsUpdated {
        kind: StreamKind::Audio,
        index,
    };

    h.notify(audio(0));
    assert_eq!(h.drain_signals(), vec![PlayerSignal::GotMetadata]);

    // Identical tag set again
    h.notify(audio(0));
    assert!(h.drain_signals().is_empty());

    // Not the selected stream
    h.notify(audio(1));
    assert!(h.drain_signals().is_empty());
    assert_eq!(
        h.controller
            .tags(TagScope::Audio)
            .get("language-code")
            .map(String::as_str),
        Some("en")
    );
}

#[test]
fn test_tags_cleared_when_stream_info_invalidated() {
    let mut h = Harness::new();
    media_with_tracks(&h);
    h.open("file:///movies/bunny.mkv");
    h.preroll();
    h.notify(EngineNotification::TagsUpdated {
        kind: StreamKind::Audio,
        index: 0,
    });
    assert!(!h.controller.tags(TagScope::Global).is_empty());

    h.state_changed(EngineState::Paused, EngineState::Ready);
    assert!(h.controller.tags(TagScope::Global).is_empty());
}

#[test]
fn test_redirect_and_end_of_stream_forwarded() {
    use totem_pc::engine::ElementMessage;

    let mut h = Harness::new();
    h.open("http://example.org/playlist");
    h.drain_signals();

    h.notify(EngineNotification::Element(
        ElementMessage::new("redirect").with_field("new-location", "http://cdn.example.org/a.ogg"),
    ));
    h.notify(EngineNotification::EndOfStream);

    assert_eq!(
        h.drain_signals(),
        vec![
            PlayerSignal::Redirect {
                uri: "http://cdn.example.org/a.ogg".to_string()
            },
            PlayerSignal::EndOfStream,
        ]
    );
}

#[test]
fn test_duration_changed_updates_length() {
    let mut h = Harness::new();
    h.open("file:///a.ogg");
    h.engine.state().duration = Some(42_000);
    h.notify(EngineNotification::DurationChanged);
    assert_eq!(h.controller.snapshot().stream_length_ms, 42_000);
}

#[test]
fn test_seekability_falls_back_to_length() {
    let mut h = Harness::new();
    h.open("file:///a.ogg");

    // Query fails and length unknown
    assert!(!h.controller.is_seekable());

    h.engine.state().duration = Some(5_000);
    assert!(h.controller.is_seekable());
    // Fallback answers are not cached
    assert_eq!(h.controller.snapshot().seekability, Seekability::Unknown);

    h.engine.state().seekable = Some(false);
    assert!(!h.controller.is_seekable());
    assert_eq!(h.controller.snapshot().seekability, Seekability::No);
}
