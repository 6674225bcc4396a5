//! Metadata aggregator
//!
//! Keeps the merged tag caches and the subtitle/audio track lists for the
//! open source. Both are owned values replaced or merged wholesale and
//! compared structurally, so redundant engine updates never reach the GUI.

use crate::engine::{PipelineEngine, StreamKind, TagList};
use serde::Serialize;
use tracing::debug;

/// Id of the synthetic "no subtitles" entry
pub const TRACK_NONE: i32 = -2;

/// Id of the synthetic "automatic" audio entry on DVDs
pub const TRACK_AUTO: i32 = 0;

/// Language code used when a stream does not declare one
pub const UNDETERMINED_LANGUAGE: &str = "und";

const TAG_TITLE: &str = "title";
const TAG_LANGUAGE: &str = "language-code";
const TAG_AUDIO_CODEC: &str = "audio-codec";
const TAG_SUBTITLE_CODEC: &str = "subtitle-codec";

/// One selectable audio or subtitle track
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackInfo {
    pub id: i32,
    pub title: Option<String>,
    pub language_code: String,
    pub codec: Option<String>,
}

impl TrackInfo {
    fn synthetic(id: i32, codec: &str) -> Self {
        Self {
            id,
            title: None,
            language_code: UNDETERMINED_LANGUAGE.to_string(),
            codec: Some(codec.to_string()),
        }
    }

    fn same_content(&self, other: &TrackInfo) -> bool {
        self.title == other.title && self.language_code == other.language_code && self.codec == other.codec
    }
}

/// Which tag aggregate to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagScope {
    Global,
    Audio,
    Video,
}

/// Which track lists changed during a rebuild
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackListChanges {
    pub subtitles: bool,
    pub languages: bool,
}

#[derive(Debug, Default)]
pub struct MetadataAggregator {
    global: TagList,
    audio: TagList,
    video: TagList,
    subtitles: Vec<TrackInfo>,
    languages: Vec<TrackInfo>,
}

/// Merge `update` into `target`, replacing conflicting values
fn merge_into(target: &mut TagList, update: &TagList) {
    for (key, value) in update {
        target.insert(key.clone(), value.clone());
    }
}

fn lists_equal(a: &[TrackInfo], b: &[TrackInfo]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_content(y))
}

fn tracks_for(engine: &dyn PipelineEngine, kind: StreamKind) -> Vec<TrackInfo> {
    let codec_tag = match kind {
        StreamKind::Text => TAG_SUBTITLE_CODEC,
        _ => TAG_AUDIO_CODEC,
    };

    (0..engine.stream_count(kind))
        .map(|index| {
            let tags = engine.stream_tags(kind, index).unwrap_or_default();
            TrackInfo {
                id: index as i32,
                title: tags.get(TAG_TITLE).cloned(),
                language_code: tags
                    .get(TAG_LANGUAGE)
                    .cloned()
                    .unwrap_or_else(|| UNDETERMINED_LANGUAGE.to_string()),
                codec: tags.get(codec_tag).cloned(),
            }
        })
        .collect()
}

impl MetadataAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a tag update for a stream of `kind`
    ///
    /// Returns `true` if the global aggregate changed (the update is worth
    /// signalling).
    pub fn merge_tags(&mut self, kind: StreamKind, update: &TagList) -> bool {
        let previous = self.global.clone();
        merge_into(&mut self.global, update);

        match kind {
            StreamKind::Audio => merge_into(&mut self.audio, update),
            StreamKind::Video => merge_into(&mut self.video, update),
            StreamKind::Text => {}
        }

        if previous == self.global {
            debug!("Redundant {:?} tag update, not signalling", kind);
            return false;
        }
        true
    }

    pub fn tags(&self, scope: TagScope) -> &TagList {
        match scope {
            TagScope::Global => &self.global,
            TagScope::Audio => &self.audio,
            TagScope::Video => &self.video,
        }
    }

    /// Drop all tag aggregates (stream info invalidated)
    pub fn clear_tags(&mut self) {
        self.global.clear();
        self.audio.clear();
        self.video.clear();
    }

    /// Drop tags and track lists
    pub fn clear(&mut self) {
        self.clear_tags();
        self.subtitles.clear();
        self.languages.clear();
    }

    pub fn subtitles(&self) -> &[TrackInfo] {
        &self.subtitles
    }

    pub fn languages(&self) -> &[TrackInfo] {
        &self.languages
    }

    /// Rebuild both track lists from the engine's current streams
    pub fn rebuild_tracks(&mut self, engine: &dyn PipelineEngine, is_dvd: bool) -> TrackListChanges {
        let mut subtitles = vec![TrackInfo::synthetic(TRACK_NONE, "none")];
        subtitles.extend(tracks_for(engine, StreamKind::Text));

        let mut languages = Vec::new();
        if is_dvd {
            languages.push(TrackInfo::synthetic(TRACK_AUTO, "auto"));
        }
        languages.extend(tracks_for(engine, StreamKind::Audio));

        let mut changes = TrackListChanges::default();
        if !lists_equal(&subtitles, &self.subtitles) {
            debug!("Subtitle tracks changed: {} entries", subtitles.len());
            self.subtitles = subtitles;
            changes.subtitles = true;
        }
        if !lists_equal(&languages, &self.languages) {
            debug!("Audio tracks changed: {} entries", languages.len());
            self.languages = languages;
            changes.languages = true;
        }
        changes
    }
}
