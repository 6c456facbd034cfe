#[path = "../common/mod.rs"]
mod common;

use common::*;
use sshrelay::session::{ConnectRequest, SessionError};
use std::time::Duration;

const CMD_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Test 1: Successful connect installs the session
// ---------------------------------------------------------------------------
#[tokio::test]
async fn connect_establishes_session() {
    let host = FakeHost::new();
    let sessions = manager(&host);

    let outcome = sessions.connect(connect_request()).await;
    assert!(outcome.connected);
    assert_eq!(outcome.message, "ok");

    let status = sessions.status();
    assert!(status.connected);
    assert_eq!(status.host, TEST_HOST);
    assert_eq!(status.user, TEST_USER);
    assert_eq!(status.working_dir, "");

    assert_eq!(host.connects(), 1);
    assert_eq!(host.count_commands("echo ok"), 1);
    assert_eq!(sessions.generation(), 1);
    assert!(sessions.connected_at().is_some());
}

// ---------------------------------------------------------------------------
// Test 2: Default and explicit ports, trimmed host/user
// ---------------------------------------------------------------------------
#[tokio::test]
async fn connect_uses_default_port_and_trims() {
    let host = FakeHost::new();
    let sessions = manager(&host);

    sessions.connect(connect_request()).await;
    assert_eq!(host.last_target().unwrap().port, 22);

    let req = ConnectRequest::new("  10.0.0.5 ", " admin ", Some(2222), "pw");
    assert!(sessions.connect(req).await.connected);
    let target = host.last_target().unwrap();
    assert_eq!(target.host, "10.0.0.5");
    assert_eq!(target.user, "admin");
    assert_eq!(target.port, 2222);
    assert_eq!(target.secret.as_str(), "pw");
}

// ---------------------------------------------------------------------------
// Test 3: Authentication failure is reported, not raised
// ---------------------------------------------------------------------------
#[tokio::test]
async fn auth_failure_reports_not_connected() {
    let host = FakeHost::new();
    host.set_fail_auth(true);
    let sessions = manager(&host);

    let outcome = sessions.connect(connect_request()).await;
    assert!(!outcome.connected);
    assert!(
        outcome.message.contains("authentication failed"),
        "unexpected message: {}",
        outcome.message
    );
    assert!(!sessions.status().connected);
    assert!(matches!(
        sessions.execute("ls", CMD_TIMEOUT).await,
        Err(SessionError::NotConnected)
    ));
}

// ---------------------------------------------------------------------------
// Test 4: Unreachable host
// ---------------------------------------------------------------------------
#[tokio::test]
async fn unreachable_host_reports_reason() {
    let host = FakeHost::new();
    host.set_unreachable(true);
    let sessions = manager(&host);

    let outcome = sessions.connect(connect_request()).await;
    assert!(!outcome.connected);
    assert!(outcome.message.contains("connection refused"));
    assert_eq!(host.connects(), 0);
}

// ---------------------------------------------------------------------------
// Test 5: A failed connect leaves the existing session untouched
// ---------------------------------------------------------------------------
#[tokio::test]
async fn failed_reconnect_keeps_existing_session() {
    let host = FakeHost::new();
    let sessions = connected_manager(&host).await;
    sessions.execute("cd /tmp", CMD_TIMEOUT).await.unwrap();

    host.set_fail_auth(true);
    let outcome = sessions.connect(ConnectRequest::new("other", "x", None, "y")).await;
    assert!(!outcome.connected);

    let status = sessions.status();
    assert!(status.connected);
    assert_eq!(status.host, TEST_HOST);
    assert_eq!(status.working_dir, "/tmp");
    assert_eq!(sessions.generation(), 1);
    assert_eq!(sessions.execute("echo hi", CMD_TIMEOUT).await.unwrap(), "hi\n");
}

// ---------------------------------------------------------------------------
// Test 6: Reconnect closes the previous connection and resets state
// ---------------------------------------------------------------------------
#[tokio::test]
async fn reconnect_replaces_connection() {
    let host = FakeHost::new();
    let sessions = connected_manager(&host).await;
    sessions.execute("cd /var/log", CMD_TIMEOUT).await.unwrap();

    let outcome = sessions.connect(connect_request()).await;
    assert!(outcome.connected);
    assert_eq!(host.connects(), 2);
    assert_eq!(host.open_connections(), 1);
    assert_eq!(sessions.generation(), 2);
    assert_eq!(sessions.status().working_dir, "");
}

// ---------------------------------------------------------------------------
// Test 7: Connect is bounded by the connect timeout
// ---------------------------------------------------------------------------
#[tokio::test(start_paused = true)]
async fn connect_times_out() {
    let host = FakeHost::new();
    host.set_connect_delay(Duration::from_secs(30));
    let sessions = manager(&host);

    let outcome = sessions.connect(connect_request()).await;
    assert!(!outcome.connected);
    assert!(outcome.message.contains("timed out"));
    assert!(!sessions.status().connected);
}

// ---------------------------------------------------------------------------
// Test 8: A failing trial command aborts the connect and closes the connection
// ---------------------------------------------------------------------------
#[tokio::test]
async fn failing_trial_command_closes_connection() {
    let host = FakeHost::new();
    host.respond_with_status("echo ok", "restricted shell\n", Some(1));
    let sessions = manager(&host);

    let outcome = sessions.connect(connect_request()).await;
    assert!(!outcome.connected);
    assert_eq!(host.connects(), 1);
    assert_eq!(host.open_connections(), 0);
    assert!(!sessions.status().connected);
}

// ---------------------------------------------------------------------------
// Test 9: Disconnect is idempotent and keeps identity for status
// ---------------------------------------------------------------------------
#[tokio::test]
async fn disconnect_is_idempotent() {
    let host = FakeHost::new();
    let sessions = connected_manager(&host).await;

    assert!(!sessions.disconnect().await.connected);
    assert!(!sessions.disconnect().await.connected);

    let status = sessions.status();
    assert!(!status.connected);
    assert_eq!(status.host, TEST_HOST);
    assert_eq!(status.user, TEST_USER);
    assert_eq!(host.open_connections(), 0);
    assert!(matches!(
        sessions.execute("ls", CMD_TIMEOUT).await,
        Err(SessionError::NotConnected)
    ));
}

#[tokio::test]
async fn disconnect_without_session() {
    let host = FakeHost::new();
    let sessions = manager(&host);
    assert!(!sessions.disconnect().await.connected);
    let status = sessions.status();
    assert!(!status.connected);
    assert!(status.host.is_empty());
}

// ---------------------------------------------------------------------------
// Test 10: Execute returns output and surfaces remote exit status
// ---------------------------------------------------------------------------
#[tokio::test]
async fn execute_returns_output() {
    let host = FakeHost::new();
    let sessions = connected_manager(&host).await;

    assert_eq!(
        sessions.execute("echo hello world", CMD_TIMEOUT).await.unwrap(),
        "hello world\n"
    );
    assert_eq!(host.last_command().as_deref(), Some("echo hello world"));
}

#[tokio::test]
async fn non_zero_exit_keeps_output() {
    let host = FakeHost::new();
    host.respond_with_status("grep", "partial match\n", Some(3));
    let sessions = connected_manager(&host).await;

    match sessions.execute("grep foo /etc/hosts", CMD_TIMEOUT).await {
        Err(SessionError::RemoteExit { status, output }) => {
            assert_eq!(status, Some(3));
            assert_eq!(output, "partial match\n");
        }
        other => panic!("expected RemoteExit, got {:?}", other),
    }

    match sessions.execute("frobnicate", CMD_TIMEOUT).await {
        Err(e @ SessionError::RemoteExit { .. }) => {
            assert_eq!(e.output(), Some("sh: 1: frobnicate: not found\n"));
        }
        other => panic!("expected RemoteExit, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Test 11: Dropped connection surfaces as transport error
// ---------------------------------------------------------------------------
#[tokio::test]
async fn dropped_connection_is_transport_error() {
    let host = FakeHost::new();
    let sessions = connected_manager(&host).await;
    host.drop_connections();

    assert!(!sessions.status().connected);
    assert!(matches!(
        sessions.execute("ls", CMD_TIMEOUT).await,
        Err(SessionError::Transport(_))
    ));
}

// ---------------------------------------------------------------------------
// Test 12: Many concurrent commands share one connection
// ---------------------------------------------------------------------------
#[tokio::test]
async fn concurrent_commands_share_connection() {
    let host = FakeHost::new();
    let sessions = connected_manager(&host).await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let sessions = sessions.clone();
        handles.push(tokio::spawn(async move {
            sessions.execute(&format!("echo {}", i), CMD_TIMEOUT).await
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap().unwrap(), format!("{}\n", i));
    }
    assert_eq!(host.connects(), 1);
}

// ---------------------------------------------------------------------------
// Test 13: Execute stamps activity
// ---------------------------------------------------------------------------
#[tokio::test(start_paused = true)]
async fn execute_stamps_activity() {
    let host = FakeHost::new();
    let sessions = connected_manager(&host).await;
    let before = sessions.last_activity();

    tokio::time::sleep(Duration::from_secs(5)).await;
    sessions.execute("true", CMD_TIMEOUT).await.unwrap();
    assert!(sessions.last_activity() >= before + Duration::from_secs(5));
}

// ---------------------------------------------------------------------------
// Test 14: The password never shows up in debug output
// ---------------------------------------------------------------------------
#[test]
fn connect_request_debug_redacts_password() {
    let req = ConnectRequest::new("h", "u", None, "super-secret");
    let rendered = format!("{:?}", req);
    assert!(!rendered.contains("super-secret"));
    assert!(rendered.contains("***"));
}

// ---------------------------------------------------------------------------
// Test 15: A timed-out command leaves activity at its dispatch instant
// ---------------------------------------------------------------------------
#[tokio::test(start_paused = true)]
async fn timed_out_command_stamps_dispatch_instant() {
    let host = FakeHost::new();
    let sessions = connected_manager(&host).await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    let dispatched = tokio::time::Instant::now();
    let err = sessions
        .execute("sleep 60", Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::CommandTimeout(_)));

    assert!(tokio::time::Instant::now() >= dispatched + Duration::from_secs(1));
    assert_eq!(sessions.last_activity(), dispatched);
}
