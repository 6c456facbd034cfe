#[path = "../common/mod.rs"]
mod common;

use common::*;
use sshrelay::config::parse_config;
use sshrelay::server::run_on_listener;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Test 1: Shutdown stops the listener and closes the remote session
// ---------------------------------------------------------------------------
#[tokio::test]
async fn shutdown_closes_session() {
    let host = FakeHost::new();
    let config = parse_config("[server]\nshutdown_timeout = 2\n").unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let shutdown = CancellationToken::new();

    let server = tokio::spawn(run_on_listener(
        config,
        listener,
        host.transport(),
        shutdown.clone(),
    ));

    let resp = reqwest::Client::new()
        .post(format!("{}/api/ssh/connect", base))
        .json(&serde_json::json!({
            "host": TEST_HOST,
            "user": TEST_USER,
            "password": TEST_PASSWORD
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(host.open_connections(), 1);

    let metrics = reqwest::get(format!("{}/metrics", base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("sshrelay_session_connected 1"));

    shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(host.open_connections(), 0);
    assert!(reqwest::get(format!("{}/health", base)).await.is_err());
}

// ---------------------------------------------------------------------------
// Test 2: Metrics route follows the config switch
// ---------------------------------------------------------------------------
#[tokio::test]
async fn metrics_disabled_by_config() {
    let host = FakeHost::new();
    let config = parse_config("[metrics]\nenabled = false\n").unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(run_on_listener(
        config,
        listener,
        host.transport(),
        shutdown.clone(),
    ));

    let resp = reqwest::get(format!("{}/metrics", base)).await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    let resp = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    shutdown.cancel();
    server.await.unwrap().unwrap();
}
