//! Subscription errors

use thiserror::Error;

/// Result type for subscription operations
pub type SubscriptionResult<T> = Result<T, SubscriptionError>;

/// Subscription errors
#[derive(Debug, Clone, Error)]
pub enum SubscriptionError {
    /// Transport-level failure; transient, consumed by the retry loop
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Retry budget exhausted; terminal, delivered once via `on_error`
    #[error("Retry budget exhausted after {0} attempts")]
    RetriesExhausted(u32),

    /// No channel registered for this handle
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// Per-session channel cap reached
    #[error("Too many channels (max: {0})")]
    TooManyChannels(usize),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SubscriptionError {
    /// Transient errors are retried internally and never reach a caller
    pub fn is_transient(&self) -> bool {
        matches!(self, SubscriptionError::Transport(_))
    }
}
