//! Subscription Delivery Invariant Tests
//!
//! Tests for invariants:
//! - Callbacks for one channel fire strictly in receipt order
//! - After unsubscribe() returns, zero further callbacks fire for that
//!   handle, regardless of subsequent matching events
//! - Re-subscribing a name replaces the prior channel
//! - Transient transport failures are retried; exhausting the budget
//!   surfaces exactly one error and marks the channel terminal

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::json;

use aerosync::observability::MetricsRegistry;
use aerosync::subscription::{
    ChangeSubscriptionManager, ChangeTransport, EventStream, SubscriptionResult,
};
use aerosync::{ChangeEvent, ChannelStatus, EventFilter, InMemoryTransport, SubscriptionError};

// =============================================================================
// Test Utilities
// =============================================================================

fn manager_over(transport: Arc<InMemoryTransport>) -> ChangeSubscriptionManager {
    ChangeSubscriptionManager::new(transport, Arc::new(MetricsRegistry::new()))
}

/// Let spawned delivery tasks run on the current-thread runtime
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

// =============================================================================
// INVARIANT: Receipt Order Per Channel
// =============================================================================

#[tokio::test]
async fn test_callbacks_fire_in_receipt_order() {
    let transport = Arc::new(InMemoryTransport::new());
    let manager = manager_over(Arc::clone(&transport));

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);

    manager
        .subscribe(
            "lesson-feed",
            EventFilter::entity("lessons"),
            Box::new(move |event| {
                seen_clone.lock().unwrap().push(event.record_id);
            }),
            Box::new(|_| {}),
        )
        .unwrap();
    settle().await;

    for i in 0..10 {
        transport.publish(ChangeEvent::update(
            "lessons",
            format!("l-{}", i),
            json!({"step": i}),
        ));
    }
    settle().await;

    let expected: Vec<String> = (0..10).map(|i| format!("l-{}", i)).collect();
    assert_eq!(*seen.lock().unwrap(), expected);
}

/// Two channels on different entities deliver independently; each still
/// preserves its own receipt order.
#[tokio::test]
async fn test_order_is_per_channel() {
    let transport = Arc::new(InMemoryTransport::new());
    let manager = manager_over(Arc::clone(&transport));

    let lessons: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let badges: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let lessons_clone = Arc::clone(&lessons);
    manager
        .subscribe(
            "lesson-feed",
            EventFilter::entity("lessons"),
            Box::new(move |event| lessons_clone.lock().unwrap().push(event.record_id)),
            Box::new(|_| {}),
        )
        .unwrap();

    let badges_clone = Arc::clone(&badges);
    manager
        .subscribe(
            "badge-feed",
            EventFilter::entity("badges"),
            Box::new(move |event| badges_clone.lock().unwrap().push(event.record_id)),
            Box::new(|_| {}),
        )
        .unwrap();
    settle().await;

    for i in 0..3 {
        transport.publish(ChangeEvent::create("lessons", format!("l-{}", i), json!({})));
        transport.publish(ChangeEvent::create("badges", format!("b-{}", i), json!({})));
    }
    settle().await;

    assert_eq!(*lessons.lock().unwrap(), vec!["l-0", "l-1", "l-2"]);
    assert_eq!(*badges.lock().unwrap(), vec!["b-0", "b-1", "b-2"]);
}

// =============================================================================
// INVARIANT: Unsubscribe Is Final
// =============================================================================

#[tokio::test]
async fn test_no_callbacks_after_unsubscribe_returns() {
    let transport = Arc::new(InMemoryTransport::new());
    let manager = manager_over(Arc::clone(&transport));

    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = Arc::clone(&count);

    let handle = manager
        .subscribe(
            "lesson-feed",
            EventFilter::entity("lessons"),
            Box::new(move |_| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
            Box::new(|_| {}),
        )
        .unwrap();
    settle().await;

    transport.publish(ChangeEvent::create("lessons", "l-0", json!({})));
    settle().await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    manager.unsubscribe(&handle).unwrap();

    for i in 1..20 {
        transport.publish(ChangeEvent::create("lessons", format!("l-{}", i), json!({})));
    }
    settle().await;

    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unsubscribe_twice_reports_not_found() {
    let transport = Arc::new(InMemoryTransport::new());
    let manager = manager_over(transport);

    let handle = manager
        .subscribe(
            "lesson-feed",
            EventFilter::entity("lessons"),
            Box::new(|_| {}),
            Box::new(|_| {}),
        )
        .unwrap();

    manager.unsubscribe(&handle).unwrap();
    assert!(matches!(
        manager.unsubscribe(&handle),
        Err(SubscriptionError::ChannelNotFound(_))
    ));
}

// =============================================================================
// INVARIANT: One Channel Per Name
// =============================================================================

#[tokio::test]
async fn test_resubscribe_replaces_and_stales_old_handle() {
    let transport = Arc::new(InMemoryTransport::new());
    let manager = manager_over(Arc::clone(&transport));

    let old_count = Arc::new(AtomicUsize::new(0));
    let new_count = Arc::new(AtomicUsize::new(0));

    let old_clone = Arc::clone(&old_count);
    let old_handle = manager
        .subscribe(
            "lesson-feed",
            EventFilter::entity("lessons"),
            Box::new(move |_| {
                old_clone.fetch_add(1, Ordering::SeqCst);
            }),
            Box::new(|_| {}),
        )
        .unwrap();
    settle().await;

    let new_clone = Arc::clone(&new_count);
    let new_handle = manager
        .subscribe(
            "lesson-feed",
            EventFilter::entity("lessons"),
            Box::new(move |_| {
                new_clone.fetch_add(1, Ordering::SeqCst);
            }),
            Box::new(|_| {}),
        )
        .unwrap();
    settle().await;

    transport.publish(ChangeEvent::create("lessons", "l-0", json!({})));
    settle().await;

    assert_eq!(old_count.load(Ordering::SeqCst), 0);
    assert_eq!(new_count.load(Ordering::SeqCst), 1);
    assert_eq!(manager.len(), 1);

    // The stale handle cannot touch the replacement channel
    assert!(manager.status(&old_handle).is_none());
    assert!(manager.unsubscribe(&old_handle).is_err());
    assert_eq!(manager.status(&new_handle), Some(ChannelStatus::Active));
}

// =============================================================================
// INVARIANT: Retry, Then Exactly One Terminal Error
// =============================================================================

/// Transport that fails a configured number of establishments before
/// delegating to an in-memory feed
struct FlakyTransport {
    inner: InMemoryTransport,
    failures_left: Mutex<u32>,
    attempts: AtomicUsize,
}

impl FlakyTransport {
    fn failing(times: u32) -> Self {
        Self {
            inner: InMemoryTransport::new(),
            failures_left: Mutex::new(times),
            attempts: AtomicUsize::new(0),
        }
    }
}

impl ChangeTransport for FlakyTransport {
    fn establish(&self, topic: &str) -> BoxFuture<'static, SubscriptionResult<EventStream>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let mut failures_left = self.failures_left.lock().unwrap();
        if *failures_left > 0 {
            *failures_left -= 1;
            return Box::pin(async { Err(SubscriptionError::Transport("link down".into())) });
        }
        self.inner.establish(topic)
    }
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_recover_within_budget() {
    let transport = Arc::new(FlakyTransport::failing(2));
    let manager = ChangeSubscriptionManager::new(
        Arc::clone(&transport) as Arc<dyn ChangeTransport>,
        Arc::new(MetricsRegistry::new()),
    )
    .with_retry_policy(5, Duration::from_millis(10), Duration::from_millis(100));

    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = Arc::clone(&count);
    let errors = Arc::new(AtomicUsize::new(0));
    let errors_clone = Arc::clone(&errors);

    let handle = manager
        .subscribe(
            "lesson-feed",
            EventFilter::entity("lessons"),
            Box::new(move |_| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
            Box::new(move |_| {
                errors_clone.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

    // Paused clock: backoff sleeps auto-advance until the channel is up
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(manager.status(&handle), Some(ChannelStatus::Active));
    assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);

    transport.inner.publish(ChangeEvent::create("lessons", "l-0", json!({})));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(errors.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_budget_errors_exactly_once() {
    let transport = Arc::new(FlakyTransport::failing(u32::MAX));
    let manager = ChangeSubscriptionManager::new(
        Arc::clone(&transport) as Arc<dyn ChangeTransport>,
        Arc::new(MetricsRegistry::new()),
    )
    .with_retry_policy(3, Duration::from_millis(10), Duration::from_millis(100));

    let errors = Arc::new(Mutex::new(Vec::new()));
    let errors_clone = Arc::clone(&errors);

    let handle = manager
        .subscribe(
            "lesson-feed",
            EventFilter::entity("lessons"),
            Box::new(|_| {}),
            Box::new(move |err| {
                errors_clone.lock().unwrap().push(err);
            }),
        )
        .unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        SubscriptionError::RetriesExhausted(3)
    ));

    // Terminal: status is Error and no further attempts happen
    assert_eq!(manager.status(&handle), Some(ChannelStatus::Error));
    let attempts_at_error = transport.attempts.load(Ordering::SeqCst);
    drop(errors);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.attempts.load(Ordering::SeqCst), attempts_at_error);
}

// =============================================================================
// Teardown
// =============================================================================

#[tokio::test]
async fn test_teardown_all_silences_every_channel() {
    let transport = Arc::new(InMemoryTransport::new());
    let manager = manager_over(Arc::clone(&transport));

    let count = Arc::new(AtomicUsize::new(0));
    for name in ["a-feed", "b-feed"] {
        let count_clone = Arc::clone(&count);
        manager
            .subscribe(
                name,
                EventFilter::entity("lessons"),
                Box::new(move |_| {
                    count_clone.fetch_add(1, Ordering::SeqCst);
                }),
                Box::new(|_| {}),
            )
            .unwrap();
    }
    settle().await;

    manager.teardown_all();
    assert!(manager.is_empty());

    transport.publish(ChangeEvent::create("lessons", "l-0", json!({})));
    settle().await;
    assert_eq!(count.load(Ordering::SeqCst), 0);
}
