//! Error types for totem-pc
//!
//! Only synchronous precondition violations surface here. Engine failures
//! arrive asynchronously and are reported as `PlayerSignal::Error`.

use thiserror::Error;

/// Main error type for the playback coordinator
#[derive(Error, Debug)]
pub enum Error {
    /// The media source URI was empty or unusable
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    /// A command that needs an open source was issued without one
    #[error("No source is open")]
    NoSourceOpen,

    /// Invalid request parameter
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The coordinator service task has exited
    #[error("Coordinator service stopped")]
    ServiceStopped,

    /// Errors from totem-common (config file loading)
    #[error(transparent)]
    Common(#[from] totem_common::Error),
}

/// Convenience Result type using totem-pc Error
pub type Result<T> = std::result::Result<T, Error>;
