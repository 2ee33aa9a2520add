//! # Connectivity Monitor
//!
//! Two-state machine (OFFLINE, ONLINE) fed by the runtime connectivity
//! signal. The OFFLINE→ONLINE transition drains the offline queue;
//! ONLINE→OFFLINE only updates state. One monitor per session: all
//! draining in the system is triggered here or by an explicit `drain()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::observability::{Event, Logger};
use crate::queue::{DrainReport, OfflineActionQueue};

/// Shared online/offline flag
///
/// Owned by the monitor; the queue's drain loop reads it between
/// actions, so a mid-drain offline flap stops the loop.
#[derive(Debug)]
pub struct ConnectivityState {
    online: AtomicBool,
}

impl ConnectivityState {
    /// Create the state with an initial value
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Current state
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Store a new state, returning the previous one
    fn replace(&self, online: bool) -> bool {
        self.online.swap(online, Ordering::SeqCst)
    }
}

/// Consumes runtime online/offline transitions
pub struct ConnectivityMonitor {
    state: Arc<ConnectivityState>,
    queue: Arc<OfflineActionQueue>,
}

impl ConnectivityMonitor {
    /// Create the monitor over the session's shared state and queue
    pub fn new(state: Arc<ConnectivityState>, queue: Arc<OfflineActionQueue>) -> Self {
        Self { state, queue }
    }

    /// Current state
    pub fn is_online(&self) -> bool {
        self.state.is_online()
    }

    /// Report the runtime as online
    ///
    /// On an OFFLINE→ONLINE transition, awaits a queue drain and returns
    /// its report. Reporting online while already online is a no-op.
    pub async fn set_online(&self) -> Option<DrainReport> {
        let was_online = self.state.replace(true);
        if was_online {
            return None;
        }

        Logger::event(Event::ConnectivityOnline, &[]);
        Some(self.queue.drain().await)
    }

    /// Report the runtime as offline; state change only, no side effect
    pub fn set_offline(&self) {
        let was_online = self.state.replace(false);
        if was_online {
            Logger::event(Event::ConnectivityOffline, &[]);
        }
    }
}
