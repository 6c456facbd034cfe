use super::data_lines;
use crate::session::{SessionError, SessionManager};
use serde::Serialize;
use std::time::Duration;

const USER_COMMANDS: &[&str] = &["who", "w -h", "users"];
const USERS_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSession {
    pub user: String,
    pub tty: String,
    pub time: String,
    pub ip: String,
}

/// Parse `who` (or `w -h`) lines: `user tty date time [(host)]`.
pub fn parse_who(output: &str) -> Vec<UserSession> {
    data_lines(output, false)
        .filter_map(|line| {
            let f: Vec<&str> = line.split_whitespace().collect();
            if f.len() < 2 {
                return None;
            }
            let time = if f.len() >= 4 {
                format!("{} {}", f[2], f[3])
            } else {
                String::new()
            };
            let ip = f
                .get(4)
                .filter(|v| v.starts_with('('))
                .map(|v| v.trim_matches(|c| c == '(' || c == ')').to_string())
                .unwrap_or_default();
            Some(UserSession {
                user: f[0].to_string(),
                tty: f[1].to_string(),
                time,
                ip,
            })
        })
        .collect()
}

/// Parse the single-line output of `users`.
pub fn parse_users_list(output: &str) -> Vec<UserSession> {
    output
        .split_whitespace()
        .map(|user| UserSession {
            user: user.to_string(),
            tty: "unknown".to_string(),
            time: "active".to_string(),
            ip: String::new(),
        })
        .collect()
}

pub async fn collect_users(sessions: &SessionManager) -> Result<Vec<UserSession>, SessionError> {
    let found = super::first_successful(sessions, USER_COMMANDS, USERS_TIMEOUT).await?;
    Ok(match found {
        Some(("users", out)) => parse_users_list(&out),
        Some((_, out)) => parse_who(&out),
        None => Vec::new(),
    })
}
