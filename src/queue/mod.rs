//! # Offline Action Queue
//!
//! Ordered, durable queue of pending write actions. Writes are appended
//! while offline (or while the backend is slow) and drained serially
//! once connectivity returns.
//!
//! Invariants:
//! - Actions execute strictly FIFO within one queue.
//! - A failed action halts the drain; it and everything behind it stay
//!   queued in original order. Nothing skips ahead of a failing action.
//! - An action leaves the queue only on executor success or explicit
//!   cancellation; failure never discards it.
//! - At most one drain runs at a time, however it was triggered.

pub mod action;
pub mod errors;
pub mod store;

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use serde_json::Value;
use uuid::Uuid;

use crate::cache::OptimisticUpdateCache;
use crate::connectivity::ConnectivityState;
use crate::observability::{Event, Logger, MetricsRegistry, Severity};

pub use action::{ActionPayload, ExecutorError, QueuedAction};
pub use errors::{QueueError, QueueResult};
pub use store::QueueStore;

/// Executes confirmed writes against the backend
///
/// Registered once per session; the queue looks actions up here instead
/// of persisting closures, so durable actions stay executable across
/// restarts. The `Ok` value is the server-confirmed record state used to
/// resolve the cache. A slow executor is responsible for its own
/// timeout.
pub trait ActionExecutor: Send + Sync + 'static {
    /// Perform the write the action describes
    fn execute<'a>(&'a self, action: &'a QueuedAction)
        -> BoxFuture<'a, Result<Value, ExecutorError>>;
}

/// Hook fired if an action's executor fails or the action is cancelled
///
/// Session-scoped; not persisted, so hooks do not survive restart.
pub type RollbackHook = Box<dyn FnOnce() + Send>;

/// Summary of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Actions confirmed and removed
    pub executed: usize,
    /// Actions whose executor rejected (0 or 1; a failure halts the pass)
    pub failed: usize,
    /// Actions still queued when the pass ended
    pub remaining: usize,
    /// True if the pass never ran (another drain was in flight)
    pub skipped: bool,
}

impl DrainReport {
    fn skipped(remaining: usize) -> Self {
        Self {
            skipped: true,
            remaining,
            ..Self::default()
        }
    }
}

/// Durable FIFO of pending write actions
pub struct OfflineActionQueue {
    store: Mutex<QueueStore>,
    pending: Mutex<VecDeque<QueuedAction>>,
    draining: AtomicBool,
    executor: Arc<dyn ActionExecutor>,
    cache: Arc<OptimisticUpdateCache>,
    connectivity: Arc<ConnectivityState>,
    rollback_hooks: Mutex<HashMap<Uuid, RollbackHook>>,
    metrics: Arc<MetricsRegistry>,
}

impl OfflineActionQueue {
    /// Opens the queue, replaying pending actions from the durable store
    pub fn open(
        data_dir: &Path,
        executor: Arc<dyn ActionExecutor>,
        cache: Arc<OptimisticUpdateCache>,
        connectivity: Arc<ConnectivityState>,
        metrics: Arc<MetricsRegistry>,
    ) -> QueueResult<Self> {
        let (store, replayed) = QueueStore::open(data_dir)?;

        Ok(Self {
            store: Mutex::new(store),
            pending: Mutex::new(VecDeque::from(replayed)),
            draining: AtomicBool::new(false),
            executor,
            cache,
            connectivity,
            rollback_hooks: Mutex::new(HashMap::new()),
            metrics,
        })
    }

    /// Appends an action to the tail and persists it
    ///
    /// Validates first; a malformed payload never enters the queue. The
    /// enqueue is acknowledged only after the store fsync. Never blocks
    /// on network.
    pub fn enqueue(
        &self,
        payload: ActionPayload,
        cache_key: Option<String>,
    ) -> QueueResult<Uuid> {
        payload.validate()?;

        let action = QueuedAction::new(payload, cache_key);
        let id = action.id;

        {
            let mut store = self.store.lock().map_err(|_| {
                QueueError::StoreAppend(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "store lock poisoned",
                ))
            })?;
            store.append_enqueue(&action)?;
        }

        let kind = action.payload.kind();
        let id_text = id.to_string();
        if let Ok(mut pending) = self.pending.lock() {
            pending.push_back(action);
        }

        self.metrics.increment_actions_enqueued();
        Logger::event(Event::ActionEnqueued, &[("action_id", &id_text), ("kind", kind)]);

        Ok(id)
    }

    /// Enqueue with a hook fired on executor failure or cancellation
    pub fn enqueue_with_rollback(
        &self,
        payload: ActionPayload,
        cache_key: Option<String>,
        hook: RollbackHook,
    ) -> QueueResult<Uuid> {
        let id = self.enqueue(payload, cache_key)?;
        if let Ok(mut hooks) = self.rollback_hooks.lock() {
            hooks.insert(id, hook);
        }
        Ok(id)
    }

    /// Removes a pending action before the drain reaches it
    ///
    /// Rolls back the action's speculative cache entry, since no
    /// executor will ever resolve it.
    pub fn cancel(&self, id: Uuid) -> QueueResult<()> {
        let removed = {
            let mut pending = self
                .pending
                .lock()
                .map_err(|_| QueueError::NotFound(id))?;
            let position = pending
                .iter()
                .position(|action| action.id == id)
                .ok_or(QueueError::NotFound(id))?;
            pending.remove(position).ok_or(QueueError::NotFound(id))?
        };

        {
            let mut store = self
                .store
                .lock()
                .map_err(|_| QueueError::NotFound(id))?;
            store.append_cancel(id)?;
        }

        if let Some(key) = &removed.cache_key {
            self.cache.rollback(key);
        }
        if let Ok(mut hooks) = self.rollback_hooks.lock() {
            if let Some(hook) = hooks.remove(&id) {
                hook();
            }
        }

        self.metrics.increment_actions_cancelled();
        let id_text = id.to_string();
        Logger::event(Event::ActionCancelled, &[("action_id", &id_text)]);

        Ok(())
    }

    /// Executes pending actions in order until empty, offline, or a
    /// failure
    ///
    /// On success the action is removed permanently and its cache key is
    /// resolved with the server value. On failure the drain halts: the
    /// failed action and everything behind it stay queued in original
    /// order, the action's speculative entry rolls back, and its
    /// rollback hook fires. Executor errors never propagate.
    pub async fn drain(&self) -> DrainReport {
        if self.draining.swap(true, Ordering::SeqCst) {
            self.metrics.increment_drains_skipped();
            Logger::event(Event::DrainSkipped, &[("reason", "in_progress")]);
            return DrainReport::skipped(self.len());
        }

        Logger::event(Event::DrainStarted, &[]);
        let mut report = DrainReport::default();

        loop {
            if !self.connectivity.is_online() {
                break;
            }

            let Some(action) = self.peek_head() else {
                break;
            };

            match self.executor.execute(&action).await {
                Ok(server_value) => {
                    if !self.complete(&action, server_value) {
                        break;
                    }
                    report.executed += 1;
                }
                Err(error) => {
                    self.record_failure(&action, &error);
                    report.failed = 1;
                    break;
                }
            }
        }

        report.remaining = self.len();
        self.draining.store(false, Ordering::SeqCst);

        let executed = report.executed.to_string();
        let remaining = report.remaining.to_string();
        self.metrics.increment_drains_completed();
        Logger::event(
            Event::DrainComplete,
            &[("executed", &executed), ("remaining", &remaining)],
        );

        report
    }

    /// Number of pending actions
    pub fn len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the pending actions, head first
    pub fn pending_snapshot(&self) -> Vec<QueuedAction> {
        self.pending
            .lock()
            .map(|pending| pending.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn peek_head(&self) -> Option<QueuedAction> {
        self.pending.lock().ok()?.front().cloned()
    }

    /// Removes the head after a confirmed execution
    ///
    /// The head is popped only if it is still the same action; a
    /// cancellation racing the in-flight executor leaves nothing to
    /// complete. Returns false if the drain should halt (store append
    /// failed; the action stays queued and will re-execute later,
    /// which at-least-once executors must tolerate).
    fn complete(&self, action: &QueuedAction, server_value: Value) -> bool {
        {
            let Ok(mut store) = self.store.lock() else {
                return false;
            };
            if let Err(error) = store.append_complete(action.id) {
                let detail = error.to_string();
                Logger::log(Severity::Error, "STORE_APPEND_FAILED", &[("error", &detail)]);
                return false;
            }
        }

        let popped = {
            let Ok(mut pending) = self.pending.lock() else {
                return false;
            };
            if pending.front().map(|head| head.id) == Some(action.id) {
                pending.pop_front().is_some()
            } else {
                false
            }
        };

        if popped {
            if let Some(key) = &action.cache_key {
                self.cache.resolve(key, server_value);
            }
            if let Ok(mut hooks) = self.rollback_hooks.lock() {
                hooks.remove(&action.id);
            }

            self.metrics.increment_actions_executed();
            let id_text = action.id.to_string();
            Logger::event(Event::ActionExecuted, &[("action_id", &id_text)]);
        }

        true
    }

    /// Records an executor failure: attempts bump, rollback, hook
    fn record_failure(&self, action: &QueuedAction, error: &ExecutorError) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(head) = pending.front_mut() {
                if head.id == action.id {
                    head.attempts += 1;
                }
            }
        }

        if let Some(key) = &action.cache_key {
            self.cache.rollback(key);
        }
        if let Ok(mut hooks) = self.rollback_hooks.lock() {
            if let Some(hook) = hooks.remove(&action.id) {
                hook();
            }
        }

        self.metrics.increment_actions_failed();
        let id_text = action.id.to_string();
        let detail = error.to_string();
        Logger::event(
            Event::ActionFailed,
            &[("action_id", &id_text), ("error", &detail)],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    struct RecordingExecutor {
        executed: StdMutex<Vec<String>>,
    }

    impl RecordingExecutor {
        fn new() -> Self {
            Self {
                executed: StdMutex::new(Vec::new()),
            }
        }
    }

    impl ActionExecutor for RecordingExecutor {
        fn execute<'a>(
            &'a self,
            action: &'a QueuedAction,
        ) -> BoxFuture<'a, Result<Value, ExecutorError>> {
            Box::pin(async move {
                self.executed
                    .lock()
                    .unwrap()
                    .push(action.payload.record_id().to_string());
                Ok(json!({"confirmed": action.payload.record_id()}))
            })
        }
    }

    fn update(record_id: &str) -> ActionPayload {
        ActionPayload::Update {
            entity: "scores".to_string(),
            record_id: record_id.to_string(),
            fields: json!({"points": 1}),
        }
    }

    fn open_queue(
        dir: &TempDir,
        executor: Arc<dyn ActionExecutor>,
        online: bool,
    ) -> OfflineActionQueue {
        let metrics = Arc::new(MetricsRegistry::new());
        OfflineActionQueue::open(
            dir.path(),
            executor,
            Arc::new(OptimisticUpdateCache::new(Arc::clone(&metrics))),
            Arc::new(ConnectivityState::new(online)),
            metrics,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_rejects_invalid_payload() {
        let dir = TempDir::new().unwrap();
        let queue = open_queue(&dir, Arc::new(RecordingExecutor::new()), true);

        let result = queue.enqueue(
            ActionPayload::Delete {
                entity: String::new(),
                record_id: "r-1".to_string(),
            },
            None,
        );

        assert!(matches!(result, Err(QueueError::Validation(_))));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_drain_while_offline_executes_nothing() {
        let dir = TempDir::new().unwrap();
        let executor = Arc::new(RecordingExecutor::new());
        let queue = open_queue(&dir, Arc::clone(&executor) as Arc<dyn ActionExecutor>, false);

        queue.enqueue(update("s-1"), None).unwrap();
        let report = queue.drain().await;

        assert_eq!(report.executed, 0);
        assert_eq!(report.remaining, 1);
        assert!(executor.executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drain_executes_fifo() {
        let dir = TempDir::new().unwrap();
        let executor = Arc::new(RecordingExecutor::new());
        let queue = open_queue(&dir, Arc::clone(&executor) as Arc<dyn ActionExecutor>, true);

        for i in 0..3 {
            queue.enqueue(update(&format!("s-{}", i)), None).unwrap();
        }
        let report = queue.drain().await;

        assert_eq!(report.executed, 3);
        assert_eq!(report.remaining, 0);
        assert!(queue.is_empty());
        assert_eq!(
            executor.executed.lock().unwrap().as_slice(),
            &["s-0", "s-1", "s-2"]
        );
    }

    #[tokio::test]
    async fn test_cancel_removes_action() {
        let dir = TempDir::new().unwrap();
        let executor = Arc::new(RecordingExecutor::new());
        let queue = open_queue(&dir, Arc::clone(&executor) as Arc<dyn ActionExecutor>, true);

        let id = queue.enqueue(update("s-1"), None).unwrap();
        queue.enqueue(update("s-2"), None).unwrap();

        queue.cancel(id).unwrap();
        assert_eq!(queue.len(), 1);

        let report = queue.drain().await;
        assert_eq!(report.executed, 1);
        assert_eq!(executor.executed.lock().unwrap().as_slice(), &["s-2"]);

        assert!(matches!(queue.cancel(id), Err(QueueError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_drain_is_skipped() {
        struct SlowExecutor;

        impl ActionExecutor for SlowExecutor {
            fn execute<'a>(
                &'a self,
                _action: &'a QueuedAction,
            ) -> BoxFuture<'a, Result<Value, ExecutorError>> {
                Box::pin(async {
                    tokio::task::yield_now().await;
                    tokio::task::yield_now().await;
                    Ok(json!({}))
                })
            }
        }

        let dir = TempDir::new().unwrap();
        let queue = Arc::new(open_queue(&dir, Arc::new(SlowExecutor), true));
        queue.enqueue(update("s-1"), None).unwrap();

        let first = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.drain().await })
        };
        tokio::task::yield_now().await;

        let second = queue.drain().await;
        assert!(second.skipped);

        let first = first.await.unwrap();
        assert!(!first.skipped);
        assert_eq!(first.executed, 1);
    }
}
