//! Observability events for the sync layer
//!
//! Events are explicit and typed. Every state transition the layer can
//! make has exactly one event name, so log consumers match on the
//! `event` field instead of parsing free-form messages.

use std::fmt;

use super::logger::Severity;

/// Observable events in the sync layer
///
/// Covers:
/// - Channel lifecycle (subscribe, establish, retry, error, unsubscribe)
/// - Queue operations (enqueue, cancel, drain)
/// - Cache transitions (apply, resolve, rollback)
/// - Connectivity transitions
/// - Durable store lifecycle (replay, compaction, corruption)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Channel lifecycle
    /// Channel registered, transport not yet established
    ChannelSubscribed,
    /// Transport stream established, channel is live
    ChannelActive,
    /// Transport dropped, re-establishment scheduled
    ChannelRetry,
    /// Retry budget exhausted, channel is terminal
    ChannelFailed,
    /// Channel removed by the caller
    ChannelUnsubscribed,
    /// All channels removed at session end
    ChannelsTornDown,

    // Queue operations
    /// Action appended to the durable queue
    ActionEnqueued,
    /// Action removed by explicit cancellation
    ActionCancelled,
    /// Drain pass started
    DrainStarted,
    /// Drain pass skipped (another drain in flight, or offline)
    DrainSkipped,
    /// Executor confirmed an action
    ActionExecuted,
    /// Executor rejected an action, drain halts
    ActionFailed,
    /// Drain pass finished
    DrainComplete,

    // Cache transitions
    /// Speculative value recorded
    CacheApplied,
    /// Speculative value promoted to authoritative
    CacheResolved,
    /// Speculative value discarded
    CacheRolledBack,

    // Connectivity
    /// OFFLINE -> ONLINE transition observed
    ConnectivityOnline,
    /// ONLINE -> OFFLINE transition observed
    ConnectivityOffline,

    // Durable store
    /// Pending actions reloaded from the store at boot
    StoreReplayed,
    /// Store log rewritten with only pending records
    StoreCompacted,
    /// Checksum mismatch in the store log
    StoreCorruption,
    /// Incomplete trailing record discarded during replay
    StoreTornTail,
}

impl Event {
    /// Returns the event name used in log output
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ChannelSubscribed => "CHANNEL_SUBSCRIBED",
            Event::ChannelActive => "CHANNEL_ACTIVE",
            Event::ChannelRetry => "CHANNEL_RETRY",
            Event::ChannelFailed => "CHANNEL_FAILED",
            Event::ChannelUnsubscribed => "CHANNEL_UNSUBSCRIBED",
            Event::ChannelsTornDown => "CHANNELS_TORN_DOWN",
            Event::ActionEnqueued => "ACTION_ENQUEUED",
            Event::ActionCancelled => "ACTION_CANCELLED",
            Event::DrainStarted => "DRAIN_STARTED",
            Event::DrainSkipped => "DRAIN_SKIPPED",
            Event::ActionExecuted => "ACTION_EXECUTED",
            Event::ActionFailed => "ACTION_FAILED",
            Event::DrainComplete => "DRAIN_COMPLETE",
            Event::CacheApplied => "CACHE_APPLIED",
            Event::CacheResolved => "CACHE_RESOLVED",
            Event::CacheRolledBack => "CACHE_ROLLED_BACK",
            Event::ConnectivityOnline => "CONNECTIVITY_ONLINE",
            Event::ConnectivityOffline => "CONNECTIVITY_OFFLINE",
            Event::StoreReplayed => "STORE_REPLAYED",
            Event::StoreCompacted => "STORE_COMPACTED",
            Event::StoreCorruption => "STORE_CORRUPTION",
            Event::StoreTornTail => "STORE_TORN_TAIL",
        }
    }

    /// Default severity when logging this event
    pub fn severity(&self) -> Severity {
        match self {
            Event::ChannelRetry
            | Event::DrainSkipped
            | Event::ActionFailed
            | Event::StoreTornTail => Severity::Warn,
            Event::ChannelFailed | Event::StoreCorruption => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_screaming_snake() {
        let events = [
            Event::ChannelSubscribed,
            Event::ActionEnqueued,
            Event::DrainComplete,
            Event::CacheRolledBack,
            Event::StoreCorruption,
        ];
        for event in events {
            let name = event.as_str();
            assert!(!name.is_empty());
            assert!(name.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_event_severities() {
        assert_eq!(Event::ActionEnqueued.severity(), Severity::Info);
        assert_eq!(Event::ChannelRetry.severity(), Severity::Warn);
        assert_eq!(Event::ChannelFailed.severity(), Severity::Error);
        assert_eq!(Event::StoreCorruption.severity(), Severity::Error);
    }
}
