#[path = "../common/mod.rs"]
mod common;

use common::*;
use serde_json::{json, Value};

async fn connected_api(host: &std::sync::Arc<FakeHost>) -> TestApi {
    let api = spawn_api(host, "", false).await;
    let resp = reqwest::Client::new()
        .post(api.url("/api/ssh/connect"))
        .json(&json!({ "host": TEST_HOST, "user": TEST_USER, "password": TEST_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    api
}

async fn get(api: &TestApi, path: &str) -> (u16, Value) {
    let resp = reqwest::get(api.url(path)).await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn process_action(api: &TestApi, pid: &str, action: &str) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(api.url("/api/process/action"))
        .json(&json!({ "pid": pid, "action": action }))
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

// ---------------------------------------------------------------------------
// Test 1: Every data route needs a session
// ---------------------------------------------------------------------------
#[tokio::test]
async fn data_routes_conflict_without_session() {
    let host = FakeHost::new();
    let api = spawn_api(&host, "", false).await;

    for path in [
        "/api/data/processes",
        "/api/data/ports",
        "/api/data/connections",
        "/api/data/resources",
        "/api/data/network",
        "/api/data/disk-usage",
        "/api/data/logs",
        "/api/data/users",
        "/api/data/client-ips",
        "/api/data/services",
        "/api/data/system-info",
    ] {
        let (status, body) = get(&api, path).await;
        assert_eq!(status, 409, "{}", path);
        assert_eq!(body["success"], false, "{}", path);
    }
}

// ---------------------------------------------------------------------------
// Test 2: Process table and sockets
// ---------------------------------------------------------------------------
#[tokio::test]
async fn processes_route() {
    let host = FakeHost::new();
    host.respond(
        "ps -eo",
        "    PID USER     COMMAND         %CPU   RSS\n   1234 root     java            87.5 2097152\n",
    );
    let api = connected_api(&host).await;

    let (status, body) = get(&api, "/api/data/processes").await;
    assert_eq!(status, 200);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["pid"], "1234");
    assert_eq!(rows[0]["name"], "java");
    assert_eq!(rows[0]["rss_mb"], 2048);
}

#[tokio::test]
async fn ports_and_connections_routes() {
    let host = FakeHost::new();
    host.respond(
        "ss -lntup",
        "Netid State  Recv-Q Send-Q Local Address:Port Peer Address:Port Process\n\
         tcp   LISTEN 0      511    0.0.0.0:80         0.0.0.0:*         users:((\"nginx\",pid=1200,fd=6))\n",
    );
    host.respond(
        "ss -tuanp",
        "Netid State Recv-Q Send-Q Local Address:Port Peer Address:Port Process\n\
         tcp   ESTAB 0     0      10.0.0.2:22        203.0.113.9:51000 users:((\"sshd\",pid=900,fd=4))\n",
    );
    let api = connected_api(&host).await;

    let (_, body) = get(&api, "/api/data/ports").await;
    assert_eq!(body["data"][0]["local"], "0.0.0.0:80");
    assert_eq!(body["data"][0]["process"], "nginx");

    let (_, body) = get(&api, "/api/data/connections").await;
    assert_eq!(body["data"][0]["state"], "ESTAB");
    assert_eq!(body["data"][0]["peer"], "203.0.113.9:51000");
    assert_eq!(body["data"][0]["pid"], "900");
}

// ---------------------------------------------------------------------------
// Test 3: Degraded collectors return empty data, not errors
// ---------------------------------------------------------------------------
#[tokio::test]
async fn missing_tools_yield_empty_results() {
    let host = FakeHost::new();
    host.respond("du -sh", "");
    let api = connected_api(&host).await;

    for path in [
        "/api/data/logs",
        "/api/data/users",
        "/api/data/services",
        "/api/data/disk-usage",
    ] {
        let (status, body) = get(&api, path).await;
        assert_eq!(status, 200, "{}", path);
        assert_eq!(body["success"], true, "{}", path);
    }

    let (_, body) = get(&api, "/api/data/system-info").await;
    assert_eq!(body["data"]["distro"], "Unknown Linux");
}

#[tokio::test]
async fn resources_route_shape() {
    let host = FakeHost::new();
    host.respond("grep '^cpu ' /proc/stat", "cpu  100 0 100 500 100 0 0 0 0 0\n");
    host.respond("cat /proc/loadavg", "1.50 1.00 0.50 2/300 1234\n");
    let api = connected_api(&host).await;

    let (status, body) = get(&api, "/api/data/resources").await;
    assert_eq!(status, 200);
    let data = &body["data"];
    assert_eq!(data["cpu"]["usage"], 0.0);
    assert_eq!(data["cpu"]["load"], 1.5);
    assert_eq!(data["ram"]["total"], 0.0);
    assert!(data["ssd"]["util"].is_number());
    assert!(data["gpu"]["usage"].is_number());
}

#[tokio::test]
async fn network_route_first_sample_has_no_rate() {
    let host = FakeHost::new();
    host.respond(
        "cat /proc/net/dev",
        "Inter-| Receive | Transmit\n face |bytes packets|bytes packets\n  eth0: 4096 1 0 0 0 0 0 0 2048 1 0 0 0 0 0 0\n",
    );
    let api = connected_api(&host).await;

    let (_, body) = get(&api, "/api/data/network").await;
    assert_eq!(body["data"]["rx_bytes"], 4096);
    assert_eq!(body["data"]["tx_bytes"], 2048);
    assert_eq!(body["data"]["interval_secs"], 0.0);
}

#[tokio::test]
async fn client_ips_route() {
    let host = FakeHost::new();
    host.respond(
        "ss -tuan",
        "Netid State Recv-Q Send-Q Local Address:Port Peer Address:Port\n\
         tcp   ESTAB 0     0      10.0.0.2:22        198.51.100.4:40000\n",
    );
    let api = connected_api(&host).await;

    let (_, body) = get(&api, "/api/data/client-ips").await;
    assert_eq!(body["data"], json!(["198.51.100.4"]));
}

// ---------------------------------------------------------------------------
// Test 4: Process actions
// ---------------------------------------------------------------------------
#[tokio::test]
async fn kill_process() {
    let host = FakeHost::new();
    host.respond("kill", "");
    let api = connected_api(&host).await;

    let (status, body) = process_action(&api, "4242", "KILL").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["pid"], "4242");
    assert_eq!(body["data"]["action"], "kill");
    assert_eq!(host.last_command().as_deref(), Some("kill -9 4242"));
}

#[tokio::test]
async fn invalid_pid_and_action_are_bad_requests() {
    let host = FakeHost::new();
    let api = connected_api(&host).await;

    let (status, body) = process_action(&api, "12 && reboot", "kill").await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("invalid pid"));

    let (status, body) = process_action(&api, "12", "suspend").await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("invalid action"));
}

#[tokio::test]
async fn restart_of_unknown_process_is_not_found() {
    let host = FakeHost::new();
    host.respond_with_status("ps -p", "", Some(1));
    let api = connected_api(&host).await;

    let (status, _) = process_action(&api, "31337", "restart").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn process_action_without_session_is_conflict() {
    let host = FakeHost::new();
    let api = spawn_api(&host, "", false).await;

    let (status, _) = process_action(&api, "1", "terminate").await;
    assert_eq!(status, 409);
}
