use super::data_lines;
use crate::session::{SessionError, SessionManager};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

const WATCHED_DIRS: &[&str] = &["/var", "/tmp", "/home", "/opt", "/usr", "/etc", "/root"];
const DU_TIMEOUT: Duration = Duration::from_secs(2);
const DU_FALLBACK: &str = "du -sh /* 2>/dev/null | head -10";
const DU_FALLBACK_TIMEOUT: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirUsage {
    pub size: String,
    pub path: String,
}

/// Parse `du -sh` lines: `<size>\t<path>`.
pub fn parse_disk_usage(output: &str) -> Vec<DirUsage> {
    data_lines(output, false)
        .filter_map(|line| {
            let mut f = line.split_whitespace();
            let size = f.next()?;
            let path = f.collect::<Vec<_>>().join(" ");
            (!path.is_empty()).then(|| DirUsage {
                size: size.to_string(),
                path,
            })
        })
        .collect()
}

/// `du` exits non-zero on unreadable subdirectories but still prints a
/// total, so partial output is kept.
async fn du(
    sessions: &SessionManager,
    command: &str,
    timeout: Duration,
) -> Result<Option<String>, SessionError> {
    match sessions.execute(command, timeout).await {
        Ok(out) => Ok(Some(out)),
        Err(SessionError::NotConnected) => Err(SessionError::NotConnected),
        Err(SessionError::RemoteExit { output, .. }) if !output.trim().is_empty() => {
            Ok(Some(output))
        }
        Err(e) => {
            debug!(command, error = %e, "du failed");
            Ok(None)
        }
    }
}

pub async fn collect_disk_usage(sessions: &SessionManager) -> Result<Vec<DirUsage>, SessionError> {
    let mut rows = Vec::new();
    for dir in WATCHED_DIRS {
        let command = format!("du -sh {} 2>/dev/null", dir);
        if let Some(out) = du(sessions, &command, DU_TIMEOUT).await? {
            rows.extend(parse_disk_usage(&out));
        }
    }
    if rows.is_empty() {
        if let Some(out) = du(sessions, DU_FALLBACK, DU_FALLBACK_TIMEOUT).await? {
            rows = parse_disk_usage(&out);
        }
    }
    Ok(rows)
}
