//! Integration tests for storage persistence
//!
//! These tests verify that:
//! - Real probes against a mock site land in SQLite
//! - Targets survive a restart and are rebuilt by bootstrap
//! - Removing a target cascades its history

use std::sync::Arc;
use std::time::Duration;

use site_monitor::notify::LogSink;
use site_monitor::probe::{HttpProber, fingerprint};
use site_monitor::storage::StorageBackend;
use site_monitor::storage::sqlite::SqliteBackend;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_full_persistence_pipeline() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&mock_server)
        .await;

    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("monitor.db");

    let store: Arc<dyn StorageBackend> = Arc::new(SqliteBackend::new(&db_path).await.unwrap());
    let registry = start_registry(
        store.clone(),
        Arc::new(HttpProber::new().unwrap()),
        Arc::new(LogSink),
        10,
    );

    let target = registry
        .add_target(OWNER, &format!("{}/health", mock_server.uri()), Some(1))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(2_500)).await;

    let history = registry
        .history(Some(OWNER), target.id, 10)
        .await
        .unwrap()
        .unwrap();
    assert!(!history.is_empty());
    assert!(history.iter().all(|row| row.outcome.status_code == Some(200)));
    assert_eq!(history[0].outcome.fingerprint, Some(fingerprint(b"OK")));

    let cached = store.get_target(target.id).await.unwrap().unwrap();
    assert_eq!(cached.last_checked_at, Some(history[0].outcome.checked_at));

    registry.shutdown().await;
}

#[tokio::test]
async fn test_targets_survive_restart() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("monitor.db");

    let (kept, paused) = {
        let store: Arc<dyn StorageBackend> =
            Arc::new(SqliteBackend::new(&db_path).await.unwrap());
        let registry = start_registry(
            store,
            Arc::new(ScriptedProber::default()),
            Arc::new(LogSink),
            10,
        );

        registry.register_owner(OWNER, CHAT).await.unwrap();
        let kept = registry
            .add_target(OWNER, "https://kept.example", Some(120))
            .await
            .unwrap();
        let paused = registry
            .add_target(OWNER, "https://paused.example", Some(120))
            .await
            .unwrap();
        let removed = registry
            .add_target(OWNER, "https://removed.example", Some(120))
            .await
            .unwrap();

        assert!(registry.pause_target(None, paused.id).await.unwrap());
        assert!(registry.remove_target(None, removed.id).await.unwrap());
        assert!(registry.set_interval(None, kept.id, 45).await.unwrap());

        registry.shutdown().await;
        (kept, paused)
    };

    let store: Arc<dyn StorageBackend> = Arc::new(SqliteBackend::new(&db_path).await.unwrap());
    assert_eq!(store.owner_chat(OWNER).await.unwrap(), Some(CHAT));

    let registry = start_registry(
        store,
        Arc::new(ScriptedProber::default()),
        Arc::new(LogSink),
        10,
    );

    assert_eq!(registry.bootstrap().await.unwrap(), 1);
    assert_eq!(registry.job_info(kept.id).await.unwrap().interval_secs, 45);
    assert!(registry.job_info(paused.id).await.is_none());
    assert_eq!(registry.list_targets(OWNER).await.unwrap().len(), 2);

    registry.shutdown().await;
}
