//! Tests for `ConnectionRegistry` and `ProgressNotifier`.
//!
//! These exercise registration, replacement and removal directly, and check
//! that notifications are delivered only to the connection registered under
//! the matching job id.

use std::sync::Arc;

use job_engine::{ConnectionRegistry, JobId, ProgressEvent, ProgressNotifier, ProgressStatus};

fn id(raw: &str) -> JobId {
    JobId::parse(raw).unwrap()
}

// ---------------------------------------------------------------------------
// Test: register() makes the channel visible to lookup()
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_then_lookup_returns_open_channel() {
    let registry = ConnectionRegistry::new();

    let _rx = registry.register(id("job-1"));

    assert_eq!(registry.connection_count(), 1);
    assert!(registry.lookup("job-1").is_some());
    assert!(registry.lookup("job-2").is_none());
}

// ---------------------------------------------------------------------------
// Test: a second register() replaces the first connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_replaces_prior_entry() {
    let registry = ConnectionRegistry::new();

    let mut old_rx = registry.register(id("job-1"));
    let mut new_rx = registry.register(id("job-1"));
    assert_eq!(registry.connection_count(), 1);

    // The old sender was dropped by the replacement.
    assert!(old_rx.recv().await.is_none());

    let tx = registry.lookup("job-1").expect("replacement should be registered");
    tx.send(ProgressEvent::new(ProgressStatus::Processing, 10)).unwrap();
    assert_eq!(new_rx.recv().await.unwrap().progress, 10);
}

// ---------------------------------------------------------------------------
// Test: unregister() of an unknown id is a no-op
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unregister_unknown_id_is_noop() {
    let registry = ConnectionRegistry::new();

    let _rx = registry.register(id("job-1"));

    assert!(!registry.unregister("nonexistent"));
    assert_eq!(registry.connection_count(), 1);
    assert!(registry.unregister("job-1"));
    assert_eq!(registry.connection_count(), 0);
}

// ---------------------------------------------------------------------------
// Test: a closed channel is treated as absent and dropped on lookup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lookup_drops_closed_channel() {
    let registry = ConnectionRegistry::new();

    let rx = registry.register(id("job-1"));
    drop(rx);

    assert!(registry.lookup("job-1").is_none());
    assert_eq!(registry.connection_count(), 0);
}

// ---------------------------------------------------------------------------
// Test: release() leaves a newer, still open, connection alone
// ---------------------------------------------------------------------------

#[tokio::test]
async fn release_keeps_open_replacement() {
    let registry = ConnectionRegistry::new();

    let old_rx = registry.register(id("job-1"));
    let _new_rx = registry.register(id("job-1"));
    drop(old_rx);

    assert!(!registry.release("job-1"));
    assert!(registry.lookup("job-1").is_some());
}

// ---------------------------------------------------------------------------
// Test: notify() pushes the event to the registered connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn notify_delivers_to_registered_connection() {
    let registry = Arc::new(ConnectionRegistry::new());
    let notifier = ProgressNotifier::new(Arc::clone(&registry));

    let mut rx = registry.register(id("job-1"));

    assert!(notifier.notify(&id("job-1"), ProgressStatus::Starting, 0));
    assert!(notifier.notify(&id("job-1"), ProgressStatus::Processing, 40));

    assert_eq!(
        rx.recv().await.unwrap(),
        ProgressEvent::new(ProgressStatus::Starting, 0)
    );
    assert_eq!(
        rx.recv().await.unwrap(),
        ProgressEvent::new(ProgressStatus::Processing, 40)
    );
}

// ---------------------------------------------------------------------------
// Test: notify() without a connection is a silent miss
// ---------------------------------------------------------------------------

#[tokio::test]
async fn notify_without_connection_is_silent() {
    let registry = Arc::new(ConnectionRegistry::new());
    let notifier = ProgressNotifier::new(Arc::clone(&registry));

    assert!(!notifier.notify(&id("nobody"), ProgressStatus::Processing, 50));
    assert_eq!(registry.connection_count(), 0);
}

// ---------------------------------------------------------------------------
// Test: after unregister(), notify() has no observable effect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn notify_after_unregister_has_no_effect() {
    let registry = Arc::new(ConnectionRegistry::new());
    let notifier = ProgressNotifier::new(Arc::clone(&registry));

    let mut rx = registry.register(id("job-1"));
    registry.unregister("job-1");

    assert!(!notifier.notify(&id("job-1"), ProgressStatus::Processing, 70));
    assert!(rx.recv().await.is_none());
}

// ---------------------------------------------------------------------------
// Test: events for one job never reach another job's connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn notify_is_isolated_per_job() {
    let registry = Arc::new(ConnectionRegistry::new());
    let notifier = ProgressNotifier::new(Arc::clone(&registry));

    let mut rx1 = registry.register(id("job-1"));
    let mut rx2 = registry.register(id("job-2"));

    notifier.notify(&id("job-1"), ProgressStatus::Processing, 50);

    assert_eq!(rx1.recv().await.unwrap().progress, 50);
    assert!(rx2.try_recv().is_err());
}
