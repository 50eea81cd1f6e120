//! Error types for the collaboration engine
//!
//! Only conditions that a caller must see become errors. An operation that
//! references a node this replica has not seen yet is not one of them: the
//! tree reports it as [`Applied::Dropped`](crate::crdt::fugue::Applied) and
//! moves on.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors surfaced by the engine
#[derive(Debug, Error)]
pub enum SyncError {
    /// No live session under this id; joining is a precondition for editing
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The session has no segment under this id
    #[error("Segment not found: {0}")]
    SegmentNotFound(String),

    /// Storage has no register value to seed a diagram session with
    #[error("Register not found for segment: {0}")]
    RegisterNotFound(String),

    /// The participant directory does not know this user
    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    /// Direct value updates bypassing insert/delete/merge
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// Malformed wire operation or oversized batch
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A persisted node list that cannot seed a tree
    #[error("Invalid node list: {0}")]
    InvalidNodeList(String),

    /// A storage collaborator failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration could not be loaded or applied
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors from std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// True for the "absent at edit time" family (session, segment, register,
    /// participant)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SyncError::SessionNotFound(_)
                | SyncError::SegmentNotFound(_)
                | SyncError::RegisterNotFound(_)
                | SyncError::ParticipantNotFound(_)
        )
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::Config(err.to_string())
    }
}
