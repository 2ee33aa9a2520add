//! Change feed transport seam
//!
//! The hosted push API behind the change feed varies by deployment, so
//! the manager only sees this trait. Establishing a stream is async and
//! may fail transiently; the manager owns the retry policy.

use std::collections::HashMap;
use std::sync::RwLock;

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

use super::errors::SubscriptionResult;
use super::event::ChangeEvent;

/// Receiving half of an established feed stream
pub type EventStream = mpsc::UnboundedReceiver<ChangeEvent>;

/// Sending half kept by a transport implementation
pub type EventSink = mpsc::UnboundedSender<ChangeEvent>;

/// A transport capable of opening a stream of change events for a topic
///
/// Delivery is at-least-once: the same event may arrive on a stream more
/// than once, and again after a re-establishment. Channel callbacks are
/// expected to be idempotent.
pub trait ChangeTransport: Send + Sync + 'static {
    /// Open a stream of events for `topic`
    ///
    /// A returned stream that later ends (sender dropped) is treated the
    /// same as a transient establishment failure: the channel re-connects
    /// under its backoff schedule.
    fn establish(&self, topic: &str) -> BoxFuture<'static, SubscriptionResult<EventStream>>;
}

/// In-memory transport
///
/// Routes published events to every established stream for the matching
/// topic. Used by tests and by hosts that generate change events locally.
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    sinks: RwLock<HashMap<String, Vec<EventSink>>>,
}

impl InMemoryTransport {
    /// Create a transport with no streams
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an event to every stream established for its topic
    ///
    /// Returns the number of streams that accepted the event.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let topic = event.topic();
        let mut delivered = 0;

        if let Ok(mut sinks) = self.sinks.write() {
            if let Some(topic_sinks) = sinks.get_mut(&topic) {
                // Closed streams are dropped on the way through
                topic_sinks.retain(|sink| !sink.is_closed());
                for sink in topic_sinks.iter() {
                    if sink.send(event.clone()).is_ok() {
                        delivered += 1;
                    }
                }
            }
        }

        delivered
    }

    /// Number of live streams across all topics
    pub fn stream_count(&self) -> usize {
        self.sinks
            .read()
            .map(|sinks| {
                sinks
                    .values()
                    .map(|topic_sinks| {
                        topic_sinks.iter().filter(|sink| !sink.is_closed()).count()
                    })
                    .sum()
            })
            .unwrap_or(0)
    }
}

impl ChangeTransport for InMemoryTransport {
    fn establish(&self, topic: &str) -> BoxFuture<'static, SubscriptionResult<EventStream>> {
        let (tx, rx) = mpsc::unbounded_channel();

        if let Ok(mut sinks) = self.sinks.write() {
            sinks.entry(topic.to_string()).or_default().push(tx);
        }

        Box::pin(async move { Ok(rx) })
    }
}
