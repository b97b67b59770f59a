//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - All REST endpoints return correct responses
//! - The X-Owner-Id header scopes every target route
//! - Validation errors map to 400 and foreign targets to 404
//! - Intervals beyond one year are refused
//! - Mutations reach the scheduler's job table

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{Value, json};
use site_monitor::api::{ApiConfig, ApiState, spawn_api_server};
use site_monitor::notify::LogSink;
use site_monitor::storage::MemoryBackend;

use crate::helpers::*;

const OTHER_OWNER: i64 = 2;

// Helper to create test API server
async fn spawn_test_api() -> SocketAddr {
    let registry = start_registry(
        Arc::new(MemoryBackend::new()),
        Arc::new(ScriptedProber::default()),
        Arc::new(LogSink),
        10,
    );

    let config = ApiConfig::new("127.0.0.1:0".parse().unwrap()); // Random port
    spawn_api_server(config, ApiState::new(Arc::new(registry)))
        .await
        .unwrap()
}

async fn add_target(client: &reqwest::Client, addr: SocketAddr, body: Value) -> reqwest::Response {
    client
        .post(format!("http://{}/api/v1/targets", addr))
        .header("X-Owner-Id", OWNER.to_string())
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let addr = spawn_test_api().await;

    let response = reqwest::get(format!("http://{}/api/v1/health", addr))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = response.json().await.unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_missing_owner_header_is_rejected() {
    let addr = spawn_test_api().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{}/api/v1/targets", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .get(format!("http://{}/api/v1/targets", addr))
        .header("X-Owner-Id", "not-a-number")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json: Value = response.json().await.unwrap();
    assert!(json["error"].as_str().unwrap().contains("X-Owner-Id"));
}

#[tokio::test]
async fn test_add_and_list_targets() {
    let addr = spawn_test_api().await;
    let client = reqwest::Client::new();

    let response = add_target(
        &client,
        addr,
        json!({ "url": "https://example.com", "interval": 60 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let created: Value = response.json().await.unwrap();
    assert_eq!(created["url"], "https://example.com");
    assert_eq!(created["interval_secs"], 60);
    assert_eq!(created["active"], true);
    assert!(created["availability"].is_null());
    assert_eq!(created["job"]["interval_secs"], 60);

    // default interval when omitted
    let response = add_target(&client, addr, json!({ "url": "https://example.org" })).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["interval_secs"], 300);

    let response = client
        .get(format!("http://{}/api/v1/targets", addr))
        .header("X-Owner-Id", OWNER.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = response.json().await.unwrap();
    assert_eq!(json["count"], 2);

    // another owner sees nothing
    let response = client
        .get(format!("http://{}/api/v1/targets", addr))
        .header("X-Owner-Id", OTHER_OWNER.to_string())
        .send()
        .await
        .unwrap();
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn test_add_target_validation() {
    let addr = spawn_test_api().await;
    let client = reqwest::Client::new();

    let response = add_target(&client, addr, json!({ "url": "not a url" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = add_target(&client, addr, json!({ "url": "ftp://example.com" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = add_target(
        &client,
        addr,
        json!({ "url": "https://example.com", "interval": 0 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json: Value = response.json().await.unwrap();
    assert!(json["error"].as_str().unwrap().contains("interval"));
}

#[tokio::test]
async fn test_oversized_interval_is_rejected() {
    let addr = spawn_test_api().await;
    let client = reqwest::Client::new();

    let response = add_target(
        &client,
        addr,
        json!({ "url": "https://example.com", "interval": u64::MAX }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let created: Value = add_target(
        &client,
        addr,
        json!({ "url": "https://example.com", "interval": 60 }),
    )
    .await
    .json()
    .await
    .unwrap();

    let response = client
        .put(format!(
            "http://{}/api/v1/targets/{}/interval",
            addr, created["id"]
        ))
        .header("X-Owner-Id", OWNER.to_string())
        .json(&json!({ "seconds": u64::MAX }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // the server is still answering and the job kept its interval
    let response = client
        .get(format!("http://{}/api/v1/targets", addr))
        .header("X-Owner-Id", OWNER.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["count"], 1);

    let response = reqwest::get(format!("http://{}/api/v1/stats", addr))
        .await
        .unwrap();
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["scheduler"]["jobs"], 1);
}

#[tokio::test]
async fn test_target_lifecycle() {
    let addr = spawn_test_api().await;
    let client = reqwest::Client::new();

    let created: Value = add_target(
        &client,
        addr,
        json!({ "url": "https://example.com", "interval": 60 }),
    )
    .await
    .json()
    .await
    .unwrap();
    let id = created["id"].as_i64().unwrap();
    let base = format!("http://{}/api/v1/targets/{}", addr, id);

    // interval change
    let response = client
        .put(format!("{}/interval", base))
        .header("X-Owner-Id", OWNER.to_string())
        .json(&json!({ "seconds": 30 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["interval_secs"], 30);
    assert_eq!(json["job"]["interval_secs"], 30);

    let response = client
        .put(format!("{}/interval", base))
        .header("X-Owner-Id", OWNER.to_string())
        .json(&json!({ "seconds": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // pause drops the job
    let response = client
        .post(format!("{}/pause", base))
        .header("X-Owner-Id", OWNER.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["active"], false);
    assert!(json["job"].is_null());

    // resume brings it back
    let response = client
        .post(format!("{}/resume", base))
        .header("X-Owner-Id", OWNER.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["active"], true);
    assert_eq!(json["job"]["interval_secs"], 30);

    // history is empty before the first probe
    let response = client
        .get(format!("{}/history", base))
        .header("X-Owner-Id", OWNER.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["target_id"], id);
    assert_eq!(json["count"], 0);

    // delete, then it is gone
    let response = client
        .delete(&base)
        .header("X-Owner-Id", OWNER.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client
        .delete(&base)
        .header("X-Owner-Id", OWNER.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_foreign_target_is_not_found() {
    let addr = spawn_test_api().await;
    let client = reqwest::Client::new();

    let created: Value = add_target(&client, addr, json!({ "url": "https://example.com" }))
        .await
        .json()
        .await
        .unwrap();
    let base = format!("http://{}/api/v1/targets/{}", addr, created["id"]);

    let response = client
        .delete(&base)
        .header("X-Owner-Id", OTHER_OWNER.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .post(format!("{}/pause", base))
        .header("X-Owner-Id", OTHER_OWNER.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .get(format!("{}/history", base))
        .header("X-Owner-Id", OTHER_OWNER.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // still there for its owner
    let response = client
        .get(format!("{}/history", base))
        .header("X-Owner-Id", OWNER.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_history_limit_bounds() {
    let addr = spawn_test_api().await;
    let client = reqwest::Client::new();

    let created: Value = add_target(&client, addr, json!({ "url": "https://example.com" }))
        .await
        .json()
        .await
        .unwrap();
    let base = format!("http://{}/api/v1/targets/{}/history", addr, created["id"]);

    for (limit, status) in [
        ("0", StatusCode::BAD_REQUEST),
        ("1001", StatusCode::BAD_REQUEST),
        ("1", StatusCode::OK),
        ("1000", StatusCode::OK),
    ] {
        let response = client
            .get(&base)
            .query(&[("limit", limit)])
            .header("X-Owner-Id", OWNER.to_string())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), status, "limit={limit}");
    }
}

#[tokio::test]
async fn test_unknown_target_is_not_found() {
    let addr = spawn_test_api().await;
    let client = reqwest::Client::new();

    let response = client
        .put(format!("http://{}/api/v1/targets/999/interval", addr))
        .header("X-Owner-Id", OWNER.to_string())
        .json(&json!({ "seconds": 30 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json: Value = response.json().await.unwrap();
    assert_eq!(json["error"], "target 999 not found");
}

#[tokio::test]
async fn test_register_owner_and_stats() {
    let addr = spawn_test_api().await;
    let client = reqwest::Client::new();

    let response = client
        .put(format!("http://{}/api/v1/owner", addr))
        .header("X-Owner-Id", OWNER.to_string())
        .json(&json!({ "chat_id": CHAT }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    add_target(&client, addr, json!({ "url": "https://example.com" })).await;

    let response = reqwest::get(format!("http://{}/api/v1/stats", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = response.json().await.unwrap();
    assert!(json["timestamp"].is_string());
    assert!(json["storage"].is_string());
    assert_eq!(json["scheduler"]["jobs"], 1);
    assert_eq!(json["scheduler"]["limiter_capacity"], 10);
    assert_eq!(json["notifier"]["delivered"], 0);
}
