//! Engine notification types
//!
//! Everything the engine reports asynchronously arrives as an
//! `EngineMessage` on a single ordered channel.

use super::{EngineState, SourceId, StreamKind};
use std::collections::BTreeMap;
use std::fmt;

/// A notification tagged with the source it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct EngineMessage {
    pub source: SourceId,
    pub notification: EngineNotification,
}

impl EngineMessage {
    pub fn new(source: SourceId, notification: EngineNotification) -> Self {
        Self {
            source,
            notification,
        }
    }
}

/// Buffering strategy the engine is using
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferingMode {
    Stream,
    /// Whole file is being downloaded to disk
    Download,
    Timeshift,
    Live,
}

/// Raw engine notifications
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotification {
    StateChanged {
        old: EngineState,
        new: EngineState,
        /// `false` for state changes of individual child elements
        from_pipeline: bool,
    },
    Error(EngineError),
    Warning(EngineError),
    EndOfStream,
    Buffering {
        /// Fill level, 0-100
        percent: u8,
        mode: BufferingMode,
    },
    DurationChanged,
    /// An asynchronous state change or seek has completed
    AsyncDone,
    TagsUpdated {
        kind: StreamKind,
        index: usize,
    },
    StreamsChanged,
    NeedsMount {
        uri: String,
        resource: String,
    },
    NeedsCredentials {
        uri: String,
    },
    Element(ElementMessage),
    Unknown {
        kind: String,
    },
}

/// Error domain reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorDomain {
    Core,
    Library,
    Resource,
    Stream,
}

/// Error code within a domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Failed,
    MissingPlugin,
    NotFound,
    OpenRead,
    Read,
    Decrypt,
    Decode,
    TypeNotFound,
    CodecNotFound,
    WrongType,
    NotImplemented,
    Format,
    Other,
}

/// Which kind of element raised an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorOrigin {
    HttpSource,
    RtspSource,
    TypeFinder,
    Pipeline,
    Element(String),
}

impl ErrorOrigin {
    /// Network sources whose debug text carries HTTP status codes
    pub fn reports_http_status(&self) -> bool {
        matches!(self, ErrorOrigin::HttpSource | ErrorOrigin::RtspSource)
    }
}

/// An error reported by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineError {
    pub domain: ErrorDomain,
    pub code: ErrorCode,
    pub message: String,
    /// Free-form diagnostic text (may be empty)
    pub debug: String,
    pub origin: ErrorOrigin,
}

impl EngineError {
    pub fn new(domain: ErrorDomain, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            domain,
            code,
            message: message.into(),
            debug: String::new(),
            origin: ErrorOrigin::Pipeline,
        }
    }

    pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
        self.debug = debug.into();
        self
    }

    pub fn with_origin(mut self, origin: ErrorOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn is(&self, domain: ErrorDomain, code: ErrorCode) -> bool {
        self.domain == domain && self.code == code
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}: {}", self.domain, self.code, self.message)?;
        if !self.debug.is_empty() {
            write!(f, " ({})", self.debug)?;
        }
        Ok(())
    }
}

/// Element-specific message: a structure name plus named fields
#[derive(Debug, Clone, PartialEq)]
pub struct ElementMessage {
    pub name: String,
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl ElementMessage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    pub fn int_field(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(|v| v.as_i64())
    }
}
