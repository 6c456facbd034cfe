use super::data_lines;
use crate::session::{SessionError, SessionManager};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

const PS_COMMAND: &str = "ps -eo pid,user,comm,pcpu,rss --sort=-pcpu | head -n 15";
const PS_TIMEOUT: Duration = Duration::from_secs(2);
const ACTION_TIMEOUT: Duration = Duration::from_secs(5);
const RESTART_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessRow {
    pub pid: String,
    pub user: String,
    pub name: String,
    /// Percent of one CPU, as reported by `ps`.
    pub cpu: f64,
    pub rss_mb: u64,
}

/// Parse `ps -eo pid,user,comm,pcpu,rss` output.
pub fn parse_processes(output: &str) -> Vec<ProcessRow> {
    data_lines(output, true)
        .filter_map(|line| {
            let f: Vec<&str> = line.split_whitespace().collect();
            if f.len() < 5 {
                return None;
            }
            let cpu = f[3]
                .parse::<f64>()
                .ok()
                .filter(|v| (0.0..=999.0).contains(v))
                .unwrap_or(0.0);
            let rss_mb = f[4].parse::<u64>().map(|kib| kib / 1024).unwrap_or(0);
            Some(ProcessRow {
                pid: truncate(f[0], 10),
                user: truncate(f[1], 20),
                name: truncate(f[2], 30),
                cpu,
                rss_mb,
            })
        })
        .collect()
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

pub async fn collect_processes(sessions: &SessionManager) -> Result<Vec<ProcessRow>, SessionError> {
    let output = sessions.execute(PS_COMMAND, PS_TIMEOUT).await?;
    Ok(parse_processes(&output))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessAction {
    /// SIGKILL
    Kill,
    /// SIGTERM
    Terminate,
    /// Terminate, then relaunch the same command line detached.
    Restart,
}

impl FromStr for ProcessAction {
    type Err = ProcessActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kill" => Ok(ProcessAction::Kill),
            "terminate" => Ok(ProcessAction::Terminate),
            "restart" => Ok(ProcessAction::Restart),
            other => Err(ProcessActionError::InvalidAction(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProcessActionError {
    #[error("invalid action '{0}': use kill, terminate or restart")]
    InvalidAction(String),
    #[error("invalid pid '{0}': must be numeric")]
    InvalidPid(String),
    #[error("process {0} not found or has no command line")]
    NotFound(String),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Accept only a non-empty run of ASCII digits, so the pid can be spliced
/// into a shell command.
pub fn validate_pid(pid: &str) -> Result<&str, ProcessActionError> {
    let pid = pid.trim();
    if pid.is_empty() || pid.len() > 10 || !pid.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProcessActionError::InvalidPid(pid.to_string()));
    }
    Ok(pid)
}

pub async fn perform_action(
    sessions: &SessionManager,
    pid: &str,
    action: ProcessAction,
) -> Result<String, ProcessActionError> {
    let pid = validate_pid(pid)?;
    info!(pid, action = ?action, "process action requested");

    let output = match action {
        ProcessAction::Kill => {
            sessions
                .execute(&format!("kill -9 {}", pid), ACTION_TIMEOUT)
                .await?
        }
        ProcessAction::Terminate => {
            sessions
                .execute(&format!("kill {}", pid), ACTION_TIMEOUT)
                .await?
        }
        ProcessAction::Restart => {
            let cmdline = sessions
                .execute(&format!("ps -p {} -o args=", pid), ACTION_TIMEOUT)
                .await
                .map_err(|e| match e {
                    SessionError::RemoteExit { .. } => {
                        ProcessActionError::NotFound(pid.to_string())
                    }
                    other => other.into(),
                })?;
            let cmdline = cmdline.trim();
            if cmdline.is_empty() {
                return Err(ProcessActionError::NotFound(pid.to_string()));
            }
            sessions
                .execute(&format!("kill {}", pid), ACTION_TIMEOUT)
                .await?;
            tokio::time::sleep(RESTART_GRACE).await;
            sessions
                .execute(
                    &format!("nohup {} > /dev/null 2>&1 &", cmdline),
                    ACTION_TIMEOUT,
                )
                .await?
        }
    };
    Ok(output)
}
