//! Channel management
//!
//! Named subscriptions onto the backend change feed. Each channel owns a
//! delivery task that establishes a transport stream, dispatches matching
//! events to the callback in receipt order, and re-establishes the stream
//! under a capped exponential backoff when the transport drops.
//!
//! Invariants:
//! - Callbacks for one channel fire strictly in receipt order.
//! - After `unsubscribe` returns, no callback for that handle fires.
//! - `on_error` fires at most once, only when the retry budget is
//!   exhausted; the channel is terminal afterwards.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::observability::{Event, Logger, MetricsRegistry};

use super::backoff::Backoff;
use super::errors::{SubscriptionError, SubscriptionResult};
use super::event::ChangeEvent;
use super::filter::EventFilter;
use super::transport::ChangeTransport;

/// Callback invoked with each matching event, in receipt order
pub type EventCallback = Box<dyn Fn(ChangeEvent) + Send + Sync>;

/// Callback invoked exactly once if the channel becomes terminal
pub type ErrorCallback = Box<dyn FnOnce(SubscriptionError) + Send>;

/// Lifecycle state of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelStatus {
    /// Registered, transport stream not yet established
    Pending = 0,
    /// Transport stream established, events flowing
    Active = 1,
    /// Retry budget exhausted, no further delivery
    Error = 2,
}

impl ChannelStatus {
    /// Convert from u8, returns None for invalid values
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ChannelStatus::Pending),
            1 => Some(ChannelStatus::Active),
            2 => Some(ChannelStatus::Error),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Opaque reference to a live channel
///
/// Handles from a replaced or unsubscribed channel go stale: they no
/// longer resolve, and can never affect the channel that took the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelHandle {
    id: Uuid,
    name: String,
}

impl ChannelHandle {
    /// The channel name this handle was issued for
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// State shared between the manager and a channel's delivery task
#[derive(Debug)]
struct ChannelShared {
    status: AtomicU8,
    alive: AtomicBool,
}

impl ChannelShared {
    fn new() -> Self {
        Self {
            status: AtomicU8::new(ChannelStatus::Pending.as_u8()),
            alive: AtomicBool::new(true),
        }
    }

    fn status(&self) -> ChannelStatus {
        ChannelStatus::from_u8(self.status.load(Ordering::SeqCst)).unwrap_or(ChannelStatus::Error)
    }

    fn set_status(&self, status: ChannelStatus) {
        self.status.store(status.as_u8(), Ordering::SeqCst);
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

/// A registered channel
struct ChannelEntry {
    handle: ChannelHandle,
    shared: Arc<ChannelShared>,
    task: JoinHandle<()>,
}

/// Manager of named change-feed channels
///
/// One live channel per name; re-subscribing a name replaces the prior
/// channel. No ordering is guaranteed across different channels.
pub struct ChangeSubscriptionManager {
    transport: Arc<dyn ChangeTransport>,
    channels: RwLock<HashMap<String, ChannelEntry>>,
    metrics: Arc<MetricsRegistry>,
    max_channels: usize,
    retry_budget: u32,
    backoff_base: Duration,
    backoff_cap: Duration,
}

impl ChangeSubscriptionManager {
    /// Create a manager over the given transport
    pub fn new(transport: Arc<dyn ChangeTransport>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            transport,
            channels: RwLock::new(HashMap::new()),
            metrics,
            max_channels: 100,
            retry_budget: 5,
            backoff_base: Duration::from_millis(500),
            backoff_cap: Duration::from_secs(30),
        }
    }

    /// Override the per-session channel cap
    pub fn with_max_channels(mut self, max_channels: usize) -> Self {
        self.max_channels = max_channels;
        self
    }

    /// Override the re-establishment policy
    ///
    /// `retry_budget` counts re-establishment attempts within one outage
    /// streak; a successful establishment resets the streak.
    pub fn with_retry_policy(mut self, retry_budget: u32, base: Duration, cap: Duration) -> Self {
        self.retry_budget = retry_budget;
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    /// Establish a named channel delivering events matching `filter`
    ///
    /// The channel starts `Pending` and becomes `Active` once the
    /// transport stream is up. If a channel already holds `name`, it is
    /// replaced and its callbacks stop firing.
    pub fn subscribe(
        &self,
        name: impl Into<String>,
        filter: EventFilter,
        callback: EventCallback,
        on_error: ErrorCallback,
    ) -> SubscriptionResult<ChannelHandle> {
        let name = name.into();

        let mut channels = self
            .channels
            .write()
            .map_err(|_| SubscriptionError::Internal("Lock poisoned".into()))?;

        if !channels.contains_key(&name) && channels.len() >= self.max_channels {
            return Err(SubscriptionError::TooManyChannels(self.max_channels));
        }

        if let Some(prior) = channels.remove(&name) {
            prior.shared.kill();
            prior.task.abort();
            Logger::event(
                Event::ChannelUnsubscribed,
                &[("channel", &name), ("reason", "replaced")],
            );
        }

        let handle = ChannelHandle {
            id: Uuid::new_v4(),
            name: name.clone(),
        };
        let shared = Arc::new(ChannelShared::new());

        let task = tokio::spawn(run_channel(
            Arc::clone(&self.transport),
            name.clone(),
            filter,
            callback,
            on_error,
            Arc::clone(&shared),
            Arc::clone(&self.metrics),
            self.retry_budget,
            Backoff::new(self.backoff_base, self.backoff_cap),
        ));

        channels.insert(
            name.clone(),
            ChannelEntry {
                handle: handle.clone(),
                shared,
                task,
            },
        );

        Logger::event(Event::ChannelSubscribed, &[("channel", &name)]);

        Ok(handle)
    }

    /// Remove a channel; synchronous and final
    ///
    /// After this returns, no callback for `handle` fires. Designed for a
    /// current-thread runtime, where no delivery can be concurrently
    /// mid-callback.
    pub fn unsubscribe(&self, handle: &ChannelHandle) -> SubscriptionResult<()> {
        let entry = {
            let mut channels = self
                .channels
                .write()
                .map_err(|_| SubscriptionError::Internal("Lock poisoned".into()))?;

            match channels.get(&handle.name) {
                Some(entry) if entry.handle.id == handle.id => channels.remove(&handle.name),
                _ => None,
            }
        };

        match entry {
            Some(entry) => {
                entry.shared.kill();
                entry.task.abort();
                Logger::event(Event::ChannelUnsubscribed, &[("channel", &handle.name)]);
                Ok(())
            }
            None => Err(SubscriptionError::ChannelNotFound(handle.name.clone())),
        }
    }

    /// Remove every channel; used at session end, errors swallowed
    pub fn teardown_all(&self) {
        let entries: Vec<ChannelEntry> = {
            if let Ok(mut channels) = self.channels.write() {
                channels.drain().map(|(_, entry)| entry).collect()
            } else {
                return;
            }
        };

        let count = entries.len().to_string();
        for entry in entries {
            entry.shared.kill();
            entry.task.abort();
        }

        Logger::event(Event::ChannelsTornDown, &[("channels", &count)]);
    }

    /// Current status of a channel, None for stale handles
    pub fn status(&self, handle: &ChannelHandle) -> Option<ChannelStatus> {
        let channels = self.channels.read().ok()?;
        let entry = channels.get(&handle.name)?;
        if entry.handle.id == handle.id {
            Some(entry.shared.status())
        } else {
            None
        }
    }

    /// Number of registered channels
    pub fn len(&self) -> usize {
        self.channels.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Check if no channels are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Delivery loop for one channel
///
/// Establishes the transport stream, forwards matching events to the
/// callback serially, and re-establishes on transport loss until the
/// retry budget for the current outage streak runs out.
#[allow(clippy::too_many_arguments)]
async fn run_channel(
    transport: Arc<dyn ChangeTransport>,
    name: String,
    filter: EventFilter,
    callback: EventCallback,
    on_error: ErrorCallback,
    shared: Arc<ChannelShared>,
    metrics: Arc<MetricsRegistry>,
    retry_budget: u32,
    mut backoff: Backoff,
) {
    let topic = filter.topic();

    loop {
        if !shared.is_alive() {
            return;
        }

        if let Ok(mut stream) = transport.establish(&topic).await {
            if !shared.is_alive() {
                return;
            }

            shared.set_status(ChannelStatus::Active);
            backoff.reset();
            Logger::event(Event::ChannelActive, &[("channel", &name)]);

            while let Some(event) = stream.recv().await {
                if !shared.is_alive() {
                    return;
                }
                if filter.matches(&event) {
                    callback(event);
                    metrics.increment_events_delivered();
                }
            }
            // Stream ended: the transport dropped the connection
        }

        if !shared.is_alive() {
            return;
        }

        if backoff.attempt() >= retry_budget {
            shared.set_status(ChannelStatus::Error);
            shared.kill();
            metrics.increment_channels_failed();
            Logger::event(Event::ChannelFailed, &[("channel", &name)]);
            on_error(SubscriptionError::RetriesExhausted(retry_budget));
            return;
        }

        shared.set_status(ChannelStatus::Pending);
        let delay = backoff.next_delay();
        let attempt = backoff.attempt().to_string();
        metrics.increment_channel_retries();
        Logger::event(Event::ChannelRetry, &[("channel", &name), ("attempt", &attempt)]);
        tokio::time::sleep(delay).await;
    }
}
