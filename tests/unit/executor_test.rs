#[path = "../common/mod.rs"]
mod common;

use common::*;
use sshrelay::session::executor::dispatch;
use sshrelay::session::SessionError;
use sshrelay::transport::{ConnectTarget, RemoteConnection, RemoteTransport};
use std::sync::Arc;
use std::time::Duration;

async fn open(host: &Arc<FakeHost>) -> Arc<dyn RemoteConnection> {
    let target = ConnectTarget::new(TEST_HOST, 22, TEST_USER, TEST_PASSWORD);
    host.transport()
        .connect(&target, Duration::from_secs(5))
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Test 1: Successful command returns combined output
// ---------------------------------------------------------------------------
#[tokio::test]
async fn dispatch_returns_output() {
    let host = FakeHost::new();
    host.respond("uname -a", "Linux box 6.1.0 x86_64\nwarning: on stderr\n");
    let conn = open(&host).await;

    let out = dispatch(conn.as_ref(), "uname -a", Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(out, "Linux box 6.1.0 x86_64\nwarning: on stderr\n");
}

// ---------------------------------------------------------------------------
// Test 2: Timeout kills the remote command and reports CommandTimeout
// ---------------------------------------------------------------------------
#[tokio::test(start_paused = true)]
async fn timeout_sends_kill() {
    let host = FakeHost::new();
    let conn = open(&host).await;

    let started = tokio::time::Instant::now();
    let err = dispatch(conn.as_ref(), "sleep 30", Duration::from_secs(2))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::CommandTimeout(d) if d == Duration::from_secs(2)));
    assert_eq!(host.kills(), 1);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(!conn.is_closed(), "a timeout must not close the connection");
}

// ---------------------------------------------------------------------------
// Test 3: Commands that finish within the timeout are not killed
// ---------------------------------------------------------------------------
#[tokio::test(start_paused = true)]
async fn slow_command_within_timeout() {
    let host = FakeHost::new();
    let conn = open(&host).await;

    let out = dispatch(conn.as_ref(), "sleep 1 && echo done", Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(out, "done\n");
    assert_eq!(host.kills(), 0);
}

// ---------------------------------------------------------------------------
// Test 4: Non-zero and missing exit status
// ---------------------------------------------------------------------------
#[tokio::test]
async fn exit_status_is_surfaced() {
    let host = FakeHost::new();
    host.respond_with_status("crash", "Segmentation fault\n", None);
    let conn = open(&host).await;

    match dispatch(conn.as_ref(), "exit 4", Duration::from_secs(1)).await {
        Err(SessionError::RemoteExit { status, .. }) => assert_eq!(status, Some(4)),
        other => panic!("expected RemoteExit, got {:?}", other),
    }
    match dispatch(conn.as_ref(), "crash now", Duration::from_secs(1)).await {
        Err(SessionError::RemoteExit { status, output }) => {
            assert_eq!(status, None);
            assert_eq!(output, "Segmentation fault\n");
        }
        other => panic!("expected RemoteExit, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Test 5: Closed connection cannot open channels
// ---------------------------------------------------------------------------
#[tokio::test]
async fn closed_connection_is_transport_error() {
    let host = FakeHost::new();
    let conn = open(&host).await;
    conn.close().await;

    assert!(matches!(
        dispatch(conn.as_ref(), "true", Duration::from_secs(1)).await,
        Err(SessionError::Transport(_))
    ));
}

// ---------------------------------------------------------------------------
// Test 6: Independent channels run concurrently on one connection
// ---------------------------------------------------------------------------
#[tokio::test(start_paused = true)]
async fn channels_run_concurrently() {
    let host = FakeHost::new();
    let conn = open(&host).await;

    let started = tokio::time::Instant::now();
    let (a, b) = tokio::join!(
        dispatch(conn.as_ref(), "sleep 3 && echo a", Duration::from_secs(5)),
        dispatch(conn.as_ref(), "sleep 3 && echo b", Duration::from_secs(5)),
    );
    assert_eq!(a.unwrap(), "a\n");
    assert_eq!(b.unwrap(), "b\n");
    assert!(started.elapsed() < Duration::from_secs(5));
}

// ---------------------------------------------------------------------------
// Test 7: Through the manager, a timeout keeps the session usable
// ---------------------------------------------------------------------------
#[tokio::test(start_paused = true)]
async fn session_survives_command_timeout() {
    let host = FakeHost::new();
    let sessions = connected_manager(&host).await;

    assert!(matches!(
        sessions.execute("sleep 60", Duration::from_secs(1)).await,
        Err(SessionError::CommandTimeout(_))
    ));
    assert!(sessions.status().connected);
    assert_eq!(
        sessions
            .execute("echo still here", Duration::from_secs(1))
            .await
            .unwrap(),
        "still here\n"
    );
}

// ---------------------------------------------------------------------------
// Test 8: The deadline also covers opening the channel
// ---------------------------------------------------------------------------
#[tokio::test(start_paused = true)]
async fn stalled_channel_open_times_out() {
    let host = FakeHost::new();
    let conn = open(&host).await;
    host.set_channels_stall(true);

    let started = tokio::time::Instant::now();
    let err = dispatch(conn.as_ref(), "ls", Duration::from_secs(2))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::CommandTimeout(d) if d == Duration::from_secs(2)));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(host.kills(), 0);
}

#[tokio::test(start_paused = true)]
async fn session_execute_returns_when_channel_open_stalls() {
    let host = FakeHost::new();
    let sessions = connected_manager(&host).await;
    host.set_channels_stall(true);

    let result = tokio::time::timeout(
        Duration::from_secs(60),
        sessions.execute("ls", Duration::from_secs(2)),
    )
    .await
    .expect("execute must honour its own deadline");
    assert!(matches!(result, Err(SessionError::CommandTimeout(_))));
    assert!(sessions.status().connected);
}
