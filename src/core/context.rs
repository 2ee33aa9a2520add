//! Sync session context
//!
//! The explicitly constructed session object wiring the cache, queue,
//! subscriptions, and connectivity monitor. Consumers receive a context
//! by injection; there is no global instance, so independent sessions
//! (and tests) can coexist in one process.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::cache::{CacheRead, OptimisticUpdateCache};
use crate::connectivity::{ConnectivityMonitor, ConnectivityState};
use crate::observability::MetricsRegistry;
use crate::queue::{
    ActionExecutor, ActionPayload, DrainReport, OfflineActionQueue, RollbackHook,
};
use crate::subscription::{
    ChangeSubscriptionManager, ChangeTransport, ChannelHandle, ErrorCallback, EventCallback,
    EventFilter,
};

use super::config::SyncConfig;
use super::error::SyncResult;

/// One client sync session
///
/// Owns the four components and exposes the public API consumed by the
/// rest of the application.
pub struct SyncContext {
    session_id: Uuid,
    config: SyncConfig,
    metrics: Arc<MetricsRegistry>,
    cache: Arc<OptimisticUpdateCache>,
    queue: Arc<OfflineActionQueue>,
    subscriptions: ChangeSubscriptionManager,
    connectivity: ConnectivityMonitor,
}

impl SyncContext {
    /// Open a session: replays the durable queue, wires the components
    ///
    /// `transport` is the backend change feed; `executor` performs the
    /// queued writes once connectivity allows.
    pub fn open(
        config: SyncConfig,
        transport: Arc<dyn ChangeTransport>,
        executor: Arc<dyn ActionExecutor>,
    ) -> SyncResult<Self> {
        let metrics = Arc::new(MetricsRegistry::new());
        let cache = Arc::new(OptimisticUpdateCache::new(Arc::clone(&metrics)));
        let state = Arc::new(ConnectivityState::new(config.start_online));

        let queue = Arc::new(OfflineActionQueue::open(
            &config.data_dir,
            executor,
            Arc::clone(&cache),
            Arc::clone(&state),
            Arc::clone(&metrics),
        )?);

        let subscriptions = ChangeSubscriptionManager::new(transport, Arc::clone(&metrics))
            .with_max_channels(config.max_channels)
            .with_retry_policy(
                config.channel_retry_budget,
                config.backoff_base,
                config.backoff_cap,
            );

        let connectivity = ConnectivityMonitor::new(state, Arc::clone(&queue));

        Ok(Self {
            session_id: Uuid::new_v4(),
            config,
            metrics,
            cache,
            queue,
            subscriptions,
            connectivity,
        })
    }

    /// Unique ID of this session
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The session configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Establish a named channel on the change feed
    pub fn subscribe(
        &self,
        name: impl Into<String>,
        filter: EventFilter,
        callback: EventCallback,
        on_error: ErrorCallback,
    ) -> SyncResult<ChannelHandle> {
        Ok(self.subscriptions.subscribe(name, filter, callback, on_error)?)
    }

    /// Remove a channel; synchronous and final
    pub fn unsubscribe(&self, handle: &ChannelHandle) -> SyncResult<()> {
        Ok(self.subscriptions.unsubscribe(handle)?)
    }

    /// Apply a speculative value and enqueue the confirming write
    ///
    /// The speculative value is readable immediately; the payload drains
    /// once online. Executor success resolves `key` with the server
    /// value; failure rolls `key` back. If the enqueue itself fails
    /// (validation, store), the just-applied entry is rolled back and
    /// the error returned.
    pub fn optimistic_update(
        &self,
        key: impl Into<String>,
        speculative_value: Value,
        payload: ActionPayload,
    ) -> SyncResult<Uuid> {
        let key = key.into();
        self.cache.apply(key.clone(), speculative_value);

        match self.queue.enqueue(payload, Some(key.clone())) {
            Ok(id) => Ok(id),
            Err(error) => {
                self.cache.rollback(&key);
                Err(error.into())
            }
        }
    }

    /// `optimistic_update` with a hook fired if the action fails or is
    /// cancelled
    ///
    /// The sync layer rolls the cache back silently either way; the hook
    /// is how a caller surfaces the rollback in its own UI.
    pub fn optimistic_update_with_rollback(
        &self,
        key: impl Into<String>,
        speculative_value: Value,
        payload: ActionPayload,
        hook: RollbackHook,
    ) -> SyncResult<Uuid> {
        let key = key.into();
        self.cache.apply(key.clone(), speculative_value);

        match self.queue.enqueue_with_rollback(payload, Some(key.clone()), hook) {
            Ok(id) => Ok(id),
            Err(error) => {
                self.cache.rollback(&key);
                Err(error.into())
            }
        }
    }

    /// Read the current value for `key` (speculative > authoritative)
    pub fn read(&self, key: &str) -> CacheRead {
        self.cache.read(key)
    }

    /// Absorb an authoritative value pushed by the change feed
    pub fn absorb(&self, key: impl Into<String>, server_value: Value) {
        self.cache.absorb(key, server_value);
    }

    /// Manually drain the queue
    pub async fn drain(&self) -> DrainReport {
        self.queue.drain().await
    }

    /// End the session: removes every channel, best-effort
    ///
    /// The queue's durable store is left intact; pending actions replay
    /// on the next session.
    pub fn teardown(&self) {
        self.subscriptions.teardown_all();
    }

    /// The session's connectivity monitor, fed by the runtime signal
    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// The session's cache
    pub fn cache(&self) -> &OptimisticUpdateCache {
        &self.cache
    }

    /// The session's queue
    pub fn queue(&self) -> &OfflineActionQueue {
        &self.queue
    }

    /// The session's channel manager
    pub fn subscriptions(&self) -> &ChangeSubscriptionManager {
        &self.subscriptions
    }

    /// The session's metrics registry
    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }
}
