//! Error types for the ingestion pipeline
//!
//! Errors are split by what the queue should do with the message that caused
//! them: transient infrastructure failures abort the invocation so the
//! message is redelivered, content failures become terminal item state, and
//! malformed events are logged and dropped.

use common::error::DatabaseError;
use thiserror::Error;

/// Terminal, per-item reasons a content item cannot be ingested.
///
/// The `Display` form is what gets written to the item's error message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("File size exceeds maximum allowed ({max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("Could not determine file type")]
    UndetectableType,

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("Image is corrupted or invalid: {0}")]
    CorruptImage(String),

    #[error("Object not found: {0}")]
    ObjectMissing(String),

    #[error("Thumbnail encoding failed: {0}")]
    Thumbnail(String),

    #[error("Image decoder unavailable: {0}")]
    DecoderUnavailable(String),
}

/// Error type for pipeline operations
#[derive(Error, Debug)]
pub enum IngestError {
    /// Object store could not be reached or rejected the request
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// Metadata store failure
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Notification queue failure
    #[error("Queue error: {0}")]
    Queue(String),

    /// The content record for an object has not been created yet
    #[error("Content record for {0} does not exist yet")]
    RecordNotReady(String),

    /// Object key does not follow the expected layout
    #[error("Malformed object key: {0}")]
    MalformedKey(String),

    /// Terminal per-item failure
    #[error(transparent)]
    Content(#[from] ContentError),
}

impl IngestError {
    /// Whether the failure should abort the invocation and leave the message
    /// on the queue for redelivery.
    pub fn is_transient(&self) -> bool {
        match self {
            IngestError::ObjectStore(_)
            | IngestError::Database(_)
            | IngestError::Queue(_)
            | IngestError::RecordNotReady(_) => true,
            IngestError::MalformedKey(_) | IngestError::Content(_) => false,
        }
    }
}

/// Type alias for pipeline results
pub type IngestResult<T> = Result<T, IngestError>;
