use super::{data_lines, first_successful};
use crate::session::{SessionError, SessionManager};
use serde::Serialize;
use std::time::Duration;

const LOG_COMMANDS: &[&str] = &[
    "journalctl --no-pager -n 20 --output=short",
    "tail -n 20 /var/log/syslog",
    "tail -n 20 /var/log/messages",
];
const LOG_TIMEOUT: Duration = Duration::from_secs(3);

const SYSTEMCTL_COMMAND: &str =
    "systemctl list-units --type=service --state=running --no-pager --no-legend | head -15";
const PS_SERVICES_COMMAND: &str =
    "ps aux | grep -E '[s]shd|[n]ginx|[a]pache|[m]ysql|[p]ostgres|[r]edis|[d]ocker' | head -10";
const SERVICES_TIMEOUT: Duration = Duration::from_secs(3);

const DISTRO_COMMANDS: &[&str] = &[
    "grep PRETTY_NAME /etc/os-release | cut -d= -f2 | tr -d '\"'",
    "lsb_release -d | cut -f2",
    "cat /etc/redhat-release 2>/dev/null",
];
const DEBIAN_VERSION_COMMAND: &str = "cat /etc/debian_version 2>/dev/null";
const INFO_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize)]
pub struct LogSnapshot {
    /// Command the lines came from, empty when none worked.
    pub source: String,
    pub lines: Vec<String>,
}

pub async fn collect_logs(sessions: &SessionManager) -> Result<LogSnapshot, SessionError> {
    let found = first_successful(sessions, LOG_COMMANDS, LOG_TIMEOUT).await?;
    Ok(match found {
        Some((source, out)) => LogSnapshot {
            source: source.to_string(),
            lines: data_lines(&out, false).map(str::to_string).collect(),
        },
        None => LogSnapshot {
            source: String::new(),
            lines: Vec::new(),
        },
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRow {
    pub name: String,
    pub load: String,
    pub active: String,
    pub sub: String,
    pub description: String,
}

/// Parse `systemctl list-units --no-legend`: `UNIT LOAD ACTIVE SUB DESCRIPTION...`.
pub fn parse_systemctl_services(output: &str) -> Vec<ServiceRow> {
    data_lines(output, false)
        .map(|line| line.trim().trim_start_matches('●').trim_start())
        .filter(|line| !line.starts_with("UNIT"))
        .filter_map(|line| {
            let f: Vec<&str> = line.split_whitespace().collect();
            if f.len() < 4 || !f[0].ends_with(".service") {
                return None;
            }
            Some(ServiceRow {
                name: f[0].to_string(),
                load: f[1].to_string(),
                active: f[2].to_string(),
                sub: f[3].to_string(),
                description: f[4..].join(" "),
            })
        })
        .collect()
}

/// Parse `ps aux` lines into pseudo-services named after the executable.
pub fn parse_ps_services(output: &str) -> Vec<ServiceRow> {
    data_lines(output, false)
        .filter_map(|line| {
            let f: Vec<&str> = line.split_whitespace().collect();
            if f.len() < 11 || f[1] == "PID" {
                return None;
            }
            let name = f[10].rsplit('/').next().unwrap_or(f[10]);
            Some(ServiceRow {
                name: name.to_string(),
                load: "loaded".to_string(),
                active: "active".to_string(),
                sub: "running".to_string(),
                description: format!(
                    "Process {} (PID {}, User {})",
                    f[10..].join(" "),
                    f[1],
                    f[0]
                ),
            })
        })
        .collect()
}

pub async fn collect_services(sessions: &SessionManager) -> Result<Vec<ServiceRow>, SessionError> {
    if let Some((_, out)) =
        first_successful(sessions, &[SYSTEMCTL_COMMAND], SERVICES_TIMEOUT).await?
    {
        let rows = parse_systemctl_services(&out);
        if !rows.is_empty() {
            return Ok(rows);
        }
    }
    Ok(
        match first_successful(sessions, &[PS_SERVICES_COMMAND], SERVICES_TIMEOUT).await? {
            Some((_, out)) => parse_ps_services(&out),
            None => Vec::new(),
        },
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub uptime: String,
    pub distro: String,
    pub kernel: String,
    pub arch: String,
}

/// Trimmed output of a single command, empty when it failed.
async fn probe(sessions: &SessionManager, command: &str) -> Result<String, SessionError> {
    let found = first_successful(sessions, &[command], INFO_TIMEOUT).await?;
    Ok(found
        .map(|(_, out)| out.trim().to_string())
        .unwrap_or_default())
}

pub async fn collect_system_info(sessions: &SessionManager) -> Result<SystemInfo, SessionError> {
    let uptime = probe(sessions, "uptime").await?;
    let kernel = probe(sessions, "uname -r").await?;
    let arch = probe(sessions, "uname -m").await?;

    let distro = match first_successful(sessions, DISTRO_COMMANDS, INFO_TIMEOUT).await? {
        Some((_, out)) => out.trim().to_string(),
        None => match probe(sessions, DEBIAN_VERSION_COMMAND).await? {
            version if !version.is_empty() => format!("Debian {}", version),
            _ => "Unknown Linux".to_string(),
        },
    };

    Ok(SystemInfo {
        uptime,
        distro,
        kernel,
        arch,
    })
}
