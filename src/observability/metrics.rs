//! Metrics registry for the sync layer
//!
//! - Counters only (no gauges, no histograms)
//! - Monotonic increase
//! - Reset only on session start
//! - Thread-safe but lock-minimal

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics registry containing all operational counters
///
/// # Thread Safety
///
/// All counters use atomic operations. Relaxed ordering is sufficient;
/// counters are never used for control flow.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Actions appended to the durable queue
    actions_enqueued: AtomicU64,
    /// Actions confirmed by their executor
    actions_executed: AtomicU64,
    /// Executor rejections (drain halts)
    actions_failed: AtomicU64,
    /// Actions removed by explicit cancellation
    actions_cancelled: AtomicU64,
    /// Completed drain passes
    drains_completed: AtomicU64,
    /// Drain calls skipped by the in-progress guard
    drains_skipped: AtomicU64,
    /// Change events delivered to channel callbacks
    events_delivered: AtomicU64,
    /// Channel re-establishment attempts
    channel_retries: AtomicU64,
    /// Channels that exhausted their retry budget
    channels_failed: AtomicU64,
    /// Speculative entries rolled back
    rollbacks: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment enqueued action count
    pub fn increment_actions_enqueued(&self) {
        self.actions_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment executed action count
    pub fn increment_actions_executed(&self) {
        self.actions_executed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment failed action count
    pub fn increment_actions_failed(&self) {
        self.actions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment cancelled action count
    pub fn increment_actions_cancelled(&self) {
        self.actions_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment completed drain count
    pub fn increment_drains_completed(&self) {
        self.drains_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment skipped drain count
    pub fn increment_drains_skipped(&self) {
        self.drains_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment delivered event count
    pub fn increment_events_delivered(&self) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment channel retry count
    pub fn increment_channel_retries(&self) {
        self.channel_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment failed channel count
    pub fn increment_channels_failed(&self) {
        self.channels_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment rollback count
    pub fn increment_rollbacks(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            actions_enqueued: self.actions_enqueued.load(Ordering::Relaxed),
            actions_executed: self.actions_executed.load(Ordering::Relaxed),
            actions_failed: self.actions_failed.load(Ordering::Relaxed),
            actions_cancelled: self.actions_cancelled.load(Ordering::Relaxed),
            drains_completed: self.drains_completed.load(Ordering::Relaxed),
            drains_skipped: self.drains_skipped.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            channel_retries: self.channel_retries.load(Ordering::Relaxed),
            channels_failed: self.channels_failed.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of all counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub actions_enqueued: u64,
    pub actions_executed: u64,
    pub actions_failed: u64,
    pub actions_cancelled: u64,
    pub drains_completed: u64,
    pub drains_skipped: u64,
    pub events_delivered: u64,
    pub channel_retries: u64,
    pub channels_failed: u64,
    pub rollbacks: u64,
}
