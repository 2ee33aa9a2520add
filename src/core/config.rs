//! Session configuration
//!
//! Configured by the host at session construction, immutable afterwards.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one sync session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Root directory for the session's durable state
    pub data_dir: PathBuf,

    /// Maximum registered channels per session
    pub max_channels: usize,

    /// Re-establishment attempts per channel outage streak
    pub channel_retry_budget: u32,

    /// First backoff delay
    pub backoff_base: Duration,

    /// Backoff ceiling
    pub backoff_cap: Duration,

    /// Initial connectivity state
    ///
    /// Default is offline, so boot never drains before the runtime
    /// signal reports a state.
    pub start_online: bool,
}

impl SyncConfig {
    /// Create a configuration with default-safe settings
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            max_channels: 100,
            channel_retry_budget: 5,
            backoff_base: Duration::from_millis(500),
            backoff_cap: Duration::from_secs(30),
            start_online: false,
        }
    }

    /// Override the channel cap
    pub fn with_max_channels(mut self, max_channels: usize) -> Self {
        self.max_channels = max_channels;
        self
    }

    /// Override the re-establishment policy
    pub fn with_retry_policy(mut self, budget: u32, base: Duration, cap: Duration) -> Self {
        self.channel_retry_budget = budget;
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    /// Start the session in the online state
    pub fn with_start_online(mut self) -> Self {
        self.start_online = true;
        self
    }
}
