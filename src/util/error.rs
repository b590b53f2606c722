//! Error types for temporal resolution and caching.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for archive reads, resolution and scene loading.
#[derive(Error, Debug)]
pub enum Error {
    /// The underlying reader failed to produce a sample
    #[error("Read failed for {path}: {reason}")]
    ReadFailed { path: String, reason: String },

    /// Channel not found by name on a node
    #[error("Channel not found: {node}.{channel}")]
    ChannelNotFound { node: String, channel: String },

    /// Node not found by path
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Handle refers to a node that was removed or replaced
    #[error("Stale node handle: {0}")]
    StaleHandle(String),

    /// Archive was closed while a handle was still held
    #[error("Archive is closed: {0}")]
    ArchiveClosed(String),

    /// Long-running read cancelled by the host
    #[error("Operation interrupted")]
    Interrupted,

    /// Sample index out of bounds
    #[error("Sample index {index} out of bounds (count: {count})")]
    SampleOutOfBounds { index: usize, count: usize },

    /// Two samples or a sample and its declared type disagree
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// Topology arrays reference vertices that do not exist
    #[error("Corrupt topology: {0}")]
    CorruptTopology(String),

    /// Scene description is syntactically valid but inconsistent
    #[error("Invalid scene: {0}")]
    InvalidScene(String),

    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a read failure for a channel or node path.
    pub fn read_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid scene error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidScene(msg.into())
    }

    /// True for errors that come from the archive rather than from the caller.
    /// Caches degrade on these instead of dropping their entry.
    pub fn is_read_failure(&self) -> bool {
        matches!(
            self,
            Self::ReadFailed { .. }
                | Self::Interrupted
                | Self::SampleOutOfBounds { .. }
                | Self::ShapeMismatch { .. }
                | Self::CorruptTopology(_)
                | Self::Io(_)
        )
    }
}

/// Result type alias for timecache operations.
pub type Result<T> = std::result::Result<T, Error>;
