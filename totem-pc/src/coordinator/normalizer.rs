//! Event normalizer
//!
//! Turns raw `EngineMessage`s into a closed set of `PipelineEvent`s the
//! controller dispatches on.
//!
//! **Responsibilities:**
//! - Drop messages for any source other than the one currently open
//! - Drop child-element and no-op state changes
//! - Decode element messages (`not-mounted`, `missing-plugin`, `redirect`,
//!   `progress`, `download-complete`)
//! - Log and ignore unknown notification kinds

use crate::engine::{
    BufferingMode, ElementMessage, EngineError, EngineMessage, EngineNotification, EngineState,
    SourceId, StreamKind,
};
use tracing::{debug, trace};

/// Element message names understood by the coordinator
pub const NOT_MOUNTED: &str = "not-mounted";
pub const MISSING_PLUGIN: &str = "missing-plugin";
pub const REDIRECT: &str = "redirect";
pub const PROGRESS: &str = "progress";
pub const DOWNLOAD_COMPLETE: &str = "download-complete";

/// A notification classified for exactly one handler
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StateChanged { old: EngineState, new: EngineState },
    Error(EngineError),
    Warning(EngineError),
    EndOfStream,
    Buffering { percent: u8, mode: BufferingMode },
    DurationChanged,
    AsyncDone,
    TagsUpdated { kind: StreamKind, index: usize },
    StreamsChanged,
    MountRequired { uri: String, resource: String },
    CredentialsRequired { uri: String },
    MissingPlugin { description: String, detail: String },
    Redirect { uri: String },
    Progress { percent: u8 },
    DownloadComplete,
}

/// Normalize one engine message against the currently open source
///
/// Returns `None` for messages that must not reach any handler.
pub fn normalize(message: EngineMessage, current: Option<SourceId>) -> Option<PipelineEvent> {
    if current != Some(message.source) {
        trace!(
            "Dropping stale notification from source {} (current: {:?})",
            message.source,
            current
        );
        return None;
    }

    let event = match message.notification {
        EngineNotification::StateChanged {
            old,
            new,
            from_pipeline,
        } => {
            if !from_pipeline || old == new {
                return None;
            }
            PipelineEvent::StateChanged { old, new }
        }
        EngineNotification::Error(err) => PipelineEvent::Error(err),
        EngineNotification::Warning(err) => PipelineEvent::Warning(err),
        EngineNotification::EndOfStream => PipelineEvent::EndOfStream,
        EngineNotification::Buffering { percent, mode } => PipelineEvent::Buffering {
            percent: percent.min(100),
            mode,
        },
        EngineNotification::DurationChanged => PipelineEvent::DurationChanged,
        EngineNotification::AsyncDone => PipelineEvent::AsyncDone,
        EngineNotification::TagsUpdated { kind, index } => PipelineEvent::TagsUpdated { kind, index },
        EngineNotification::StreamsChanged => PipelineEvent::StreamsChanged,
        EngineNotification::NeedsMount { uri, resource } => {
            PipelineEvent::MountRequired { uri, resource }
        }
        EngineNotification::NeedsCredentials { uri } => PipelineEvent::CredentialsRequired { uri },
        EngineNotification::Element(element) => return normalize_element(element),
        EngineNotification::Unknown { kind } => {
            debug!("Ignoring unhandled engine notification '{}'", kind);
            return None;
        }
    };

    Some(event)
}

fn normalize_element(element: ElementMessage) -> Option<PipelineEvent> {
    match element.name.as_str() {
        NOT_MOUNTED => {
            let uri = element.str_field("uri")?.to_string();
            let Some(resource) = element.str_field("resource") else {
                debug!("not-mounted message for '{}' without a resource, ignoring", uri);
                return None;
            };
            Some(PipelineEvent::MountRequired {
                uri,
                resource: resource.to_string(),
            })
        }
        MISSING_PLUGIN => Some(PipelineEvent::MissingPlugin {
            description: element
                .str_field("description")
                .or_else(|| element.str_field("name"))
                .unwrap_or("unknown")
                .to_string(),
            detail: element.str_field("detail").unwrap_or_default().to_string(),
        }),
        REDIRECT => {
            let uri = element.str_field("new-location").filter(|s| !s.is_empty());
            match uri {
                Some(uri) => Some(PipelineEvent::Redirect {
                    uri: uri.to_string(),
                }),
                None => {
                    debug!("Redirect message without a location, ignoring");
                    None
                }
            }
        }
        PROGRESS => {
            let percent = element.int_field("percent")?;
            Some(PipelineEvent::Progress {
                percent: percent.clamp(0, 100) as u8,
            })
        }
        DOWNLOAD_COMPLETE => Some(PipelineEvent::DownloadComplete),
        other => {
            debug!("Unhandled element message '{}'", other);
            None
        }
    }
}
