use thiserror::Error;

/// Errors produced while building or parsing a [`StoragePath`](crate::StoragePath).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The path has no segments at all.
    #[error("storage path must not be empty")]
    Empty,

    /// A segment violates the naming rules.
    #[error("invalid path segment {segment:?}: {reason}")]
    InvalidSegment { segment: String, reason: String },

    /// The first segment is not a valid container name.
    #[error("invalid container name {name:?}: {reason}")]
    InvalidContainer { name: String, reason: String },
}
