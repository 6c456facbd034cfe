use super::{data_lines, parse_ss_process};
use crate::session::{SessionError, SessionManager};
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;

const LISTEN_COMMAND: &str = "ss -lntup";
const CONNECTIONS_COMMAND: &str = "ss -tuanp | head -n 20";
const PEERS_COMMAND: &str = "ss -tuan";
const SS_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenRow {
    pub proto: String,
    pub local: String,
    pub pid: String,
    #[serde(rename = "proc")]
    pub process: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionRow {
    pub proto: String,
    pub state: String,
    pub local: String,
    pub peer: String,
    pub pid: String,
    #[serde(rename = "proc")]
    pub process: String,
}

/// Parse `ss -lntup`: `Netid State Recv-Q Send-Q Local Peer [Process]`.
pub fn parse_listen_ports(output: &str) -> Vec<ListenRow> {
    data_lines(output, false)
        .map(str::trim)
        .filter(|line| !line.starts_with("Netid") && !line.starts_with("State"))
        .filter_map(|line| {
            let f: Vec<&str> = line.split_whitespace().collect();
            if f.len() < 5 {
                return None;
            }
            let (pid, process) = if f.len() > 6 {
                parse_ss_process(&f[6..].join(" "))
            } else {
                Default::default()
            };
            Some(ListenRow {
                proto: f[0].to_uppercase(),
                local: f[4].to_string(),
                pid,
                process,
            })
        })
        .collect()
}

/// Parse `ss -tuanp`: `Netid State Recv-Q Send-Q Local Peer [Process]`.
pub fn parse_connections(output: &str) -> Vec<ConnectionRow> {
    data_lines(output, true)
        .filter_map(|line| {
            let f: Vec<&str> = line.split_whitespace().collect();
            if f.len() < 6 {
                return None;
            }
            let (pid, process) = if f.len() > 6 {
                parse_ss_process(&f[6..].join(" "))
            } else {
                Default::default()
            };
            Some(ConnectionRow {
                proto: f[0].to_uppercase(),
                state: f[1].to_string(),
                local: f[4].to_string(),
                peer: f[5].to_string(),
                pid,
                process,
            })
        })
        .collect()
}

/// Distinct peer addresses from `ss -tuan`, without ports, skipping
/// loopback and wildcard entries.
pub fn parse_client_ips(output: &str) -> Vec<String> {
    let ips: BTreeSet<String> = data_lines(output, true)
        .filter_map(|line| line.split_whitespace().nth(5))
        .filter_map(|peer| {
            let host = peer.rsplit_once(':').map(|(h, _)| h).unwrap_or(peer);
            let host = host.trim_start_matches('[').trim_end_matches(']');
            let host = host.split('%').next().unwrap_or(host);
            let skip = host.is_empty()
                || host == "*"
                || host == "0.0.0.0"
                || host == "::"
                || host == "::1"
                || host.starts_with("127.");
            (!skip).then(|| host.to_string())
        })
        .collect();
    ips.into_iter().collect()
}

pub async fn collect_listen_ports(
    sessions: &SessionManager,
) -> Result<Vec<ListenRow>, SessionError> {
    let output = sessions.execute(LISTEN_COMMAND, SS_TIMEOUT).await?;
    Ok(parse_listen_ports(&output))
}

pub async fn collect_connections(
    sessions: &SessionManager,
) -> Result<Vec<ConnectionRow>, SessionError> {
    let output = sessions.execute(CONNECTIONS_COMMAND, SS_TIMEOUT).await?;
    Ok(parse_connections(&output))
}

pub async fn collect_client_ips(sessions: &SessionManager) -> Result<Vec<String>, SessionError> {
    let output = sessions.execute(PEERS_COMMAND, SS_TIMEOUT).await?;
    Ok(parse_client_ips(&output))
}
