//! Error types for Rewind

use std::io;

use thiserror::Error;

use crate::config::RecordMode;
use crate::transaction::Method;

/// Result type for Rewind operations
pub type Result<T> = std::result::Result<T, RewindError>;

/// Errors that can occur in Rewind
#[derive(Debug, Error)]
pub enum RewindError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A live request arrived while the active mode forbids recording
    #[error("recording is disabled with record mode {0}")]
    RecordingDisabled(RecordMode),

    /// A live request matched no registered matcher during replay
    #[error("no recorded transaction matches {method} {uri}")]
    NoMatchingRecording {
        /// Method of the unmatched request
        method: Method,
        /// Full URL of the unmatched request
        uri: String,
    },

    /// JSON codec failure
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML codec failure
    #[error("YAML codec error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Network failure while re-issuing a recorded-mode call
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed recording file
    #[error("invalid recording: {0}")]
    InvalidRecording(String),
}
