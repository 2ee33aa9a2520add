//! Crate-boundary error types
//!
//! Module errors stay within their subsystem; the context's public API
//! surfaces them through this unified type.

use thiserror::Error;

use crate::queue::QueueError;
use crate::subscription::SubscriptionError;

/// Crate-boundary result type
pub type SyncResult<T> = Result<T, SyncError>;

/// Unified sync-layer error
#[derive(Debug, Error)]
pub enum SyncError {
    /// Queue or durable-store failure
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Subscription failure
    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),
}
