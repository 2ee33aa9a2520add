//! aerosync - client-side synchronization layer
//!
//! Optimistic updates, a durable offline action queue, realtime change
//! subscriptions, and a connectivity monitor, wired by an explicitly
//! constructed session context. The client applies user actions
//! immediately, survives disconnection, and reconciles with
//! server-confirmed state without losing or reordering operations.

pub mod cache;
pub mod connectivity;
pub mod core;
pub mod observability;
pub mod queue;
pub mod subscription;

pub use crate::core::{SyncConfig, SyncContext, SyncError, SyncResult};
pub use cache::{CacheRead, OptimisticUpdateCache};
pub use connectivity::{ConnectivityMonitor, ConnectivityState};
pub use queue::{
    ActionExecutor, ActionPayload, DrainReport, ExecutorError, OfflineActionQueue, QueueError,
    QueuedAction,
};
pub use subscription::{
    ChangeEvent, ChangeOperation, ChangeSubscriptionManager, ChangeTransport, ChannelHandle,
    ChannelStatus, EventFilter, FieldPredicate, FilterOp, InMemoryTransport, SubscriptionError,
};
