//! Queue error types

use std::io;

use thiserror::Error;
use uuid::Uuid;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Queue errors
#[derive(Debug, Error)]
pub enum QueueError {
    /// Malformed action rejected at enqueue time
    #[error("Invalid action: {0}")]
    Validation(String),

    /// Durable store append failed; the action was not acknowledged
    #[error("Store append failed: {0}")]
    StoreAppend(#[source] io::Error),

    /// Durable store could not be opened or read
    #[error("Store read failed: {0}")]
    StoreRead(#[source] io::Error),

    /// Checksum mismatch on a fully framed record
    #[error("Store corruption at offset {offset}")]
    Corruption { offset: u64 },

    /// Record payload could not be decoded
    #[error("Store record malformed at offset {offset}: {reason}")]
    MalformedRecord { offset: u64, reason: String },

    /// No pending action with this ID
    #[error("Action not found: {0}")]
    NotFound(Uuid),
}
