//! Failure scenario tests
//!
//! These tests verify that the scheduler keeps going when:
//! - The store rejects an outcome
//! - The store cannot be read before a probe
//! - A target is deleted while its probe is in flight
//! - Notification delivery fails or has no chat to go to

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use site_monitor::probe::ProbeResult;
use site_monitor::storage::{MemoryBackend, StorageBackend};
use tokio::time::sleep;

use crate::helpers::*;

#[tokio::test(start_paused = true)]
async fn test_persistence_failure_drops_outcome_and_rearms() {
    let store = Arc::new(FlakyStore::default());
    let prober = Arc::new(ScriptedProber::default());
    let registry = start_registry(
        store.clone(),
        prober.clone(),
        Arc::new(RecordingSink::default()),
        10,
    );

    let target = registry
        .add_target(OWNER, "https://example.com", Some(10))
        .await
        .unwrap();

    store.fail_writes.store(true, Ordering::SeqCst);
    sleep(Duration::from_secs(21)).await;

    assert_eq!(prober.calls(), 2);
    assert!(store.inner.list_recent_outcomes(target.id, 10).await.unwrap().is_empty());

    let stats = registry.stats().await.unwrap().scheduler.unwrap();
    assert_eq!(stats.record_failures, 2);
    assert_eq!(stats.jobs, 1);

    // store recovers, monitoring continues on the same job
    store.fail_writes.store(false, Ordering::SeqCst);
    sleep(Duration::from_secs(10)).await;

    assert_eq!(store.inner.list_recent_outcomes(target.id, 10).await.unwrap().len(), 1);

    registry.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_read_failure_skips_probe_and_rearms() {
    let store = Arc::new(FlakyStore::default());
    let prober = Arc::new(ScriptedProber::default());
    let registry = start_registry(
        store.clone(),
        prober.clone(),
        Arc::new(RecordingSink::default()),
        10,
    );

    let target = registry
        .add_target(OWNER, "https://example.com", Some(10))
        .await
        .unwrap();

    store.fail_reads.store(true, Ordering::SeqCst);
    sleep(Duration::from_secs(11)).await;

    assert_eq!(prober.calls(), 0);
    let stats = registry.stats().await.unwrap().scheduler.unwrap();
    assert_eq!(stats.read_failures, 1);
    assert_eq!(registry.job_info(target.id).await.unwrap().interval_secs, 10);

    store.fail_reads.store(false, Ordering::SeqCst);
    sleep(Duration::from_secs(10)).await;
    assert_eq!(prober.calls(), 1);

    registry.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_delete_while_probe_in_flight() {
    let store = Arc::new(MemoryBackend::new());
    let prober = Arc::new(ScriptedProber::delayed(Duration::from_secs(10)));
    let registry = start_registry(
        store.clone(),
        prober.clone(),
        Arc::new(RecordingSink::default()),
        10,
    );

    let doomed = registry
        .add_target(OWNER, "https://doomed.example", Some(30))
        .await
        .unwrap();
    let survivor = registry
        .add_target(OWNER, "https://survivor.example", Some(30))
        .await
        .unwrap();

    // both probes run from 30s to 40s
    sleep(Duration::from_secs(32)).await;
    assert!(registry.remove_target(Some(OWNER), doomed.id).await.unwrap());

    sleep(Duration::from_secs(40)).await;

    assert!(store.get_target(doomed.id).await.unwrap().is_none());
    assert!(store.list_recent_outcomes(doomed.id, 10).await.unwrap().is_empty());
    assert!(registry.job_info(doomed.id).await.is_none());

    // the other target kept its schedule
    assert_eq!(store.list_recent_outcomes(survivor.id, 10).await.unwrap().len(), 2);

    registry.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_delivery_failure_does_not_stop_ticks() {
    let store = Arc::new(MemoryBackend::new());
    let prober = Arc::new(ScriptedProber::new(vec![
        ProbeResult::response(200, 5, b"ok"),
        ProbeResult::response(502, 5, b"bad gateway"),
        ProbeResult::response(200, 5, b"ok"),
    ]));
    let sink = Arc::new(RecordingSink::default());
    sink.fail.store(true, Ordering::SeqCst);
    let registry = start_registry(store.clone(), prober.clone(), sink.clone(), 10);

    registry.register_owner(OWNER, CHAT).await.unwrap();
    let target = registry
        .add_target(OWNER, "https://example.com", Some(10))
        .await
        .unwrap();

    sleep(Duration::from_secs(41)).await;
    settle().await;

    assert_eq!(prober.calls(), 4);
    assert_eq!(store.list_recent_outcomes(target.id, 10).await.unwrap().len(), 4);

    let notifier = registry.stats().await.unwrap().notifier.unwrap();
    assert_eq!(notifier.failed, 2);
    assert_eq!(notifier.delivered, 0);

    registry.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_owner_without_chat_is_skipped() {
    let store = Arc::new(MemoryBackend::new());
    let prober = Arc::new(ScriptedProber::new(vec![
        ProbeResult::response(200, 5, b"ok"),
        ProbeResult::failure(5, "dns error"),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let registry = start_registry(store, prober, sink.clone(), 10);

    registry
        .add_target(OWNER, "https://example.com", Some(10))
        .await
        .unwrap();

    sleep(Duration::from_secs(21)).await;
    settle().await;

    let notifier = registry.stats().await.unwrap().notifier.unwrap();
    assert_eq!(notifier.skipped, 1);
    assert!(sink.events().is_empty());

    registry.shutdown().await;
}
