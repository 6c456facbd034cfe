//! Remote data collectors.
//!
//! Each collector runs one or more commands through the session and turns
//! the text into rows. Parsers are pure functions so they can be tested
//! against captured output.

pub mod disk;
pub mod network;
pub mod processes;
pub mod resources;
pub mod sockets;
pub mod system;
pub mod users;

use crate::session::{SessionError, SessionManager};
use std::time::Duration;
use tracing::debug;

/// Run `commands` in order and return the first non-empty successful output
/// together with the command that produced it.
///
/// `NotConnected` aborts immediately; any other failure moves on to the next
/// candidate.
pub async fn first_successful<'a>(
    sessions: &SessionManager,
    commands: &[&'a str],
    timeout: Duration,
) -> Result<Option<(&'a str, String)>, SessionError> {
    for &command in commands {
        match sessions.execute(command, timeout).await {
            Ok(output) if !output.trim().is_empty() => return Ok(Some((command, output))),
            Ok(_) => debug!(command, "collector command returned nothing"),
            Err(SessionError::NotConnected) => return Err(SessionError::NotConnected),
            Err(e) => debug!(command, error = %e, "collector command failed, trying next"),
        }
    }
    Ok(None)
}

/// Extract `(pid, process name)` from an `ss` users column such as
/// `users:(("sshd",pid=812,fd=3))`. Missing parts come back empty.
pub fn parse_ss_process(field: &str) -> (String, String) {
    let pid = field
        .find("pid=")
        .map(|i| {
            field[i + 4..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
        })
        .unwrap_or_default();
    let name = field
        .split('"')
        .nth(1)
        .map(str::to_string)
        .unwrap_or_default();
    (pid, name)
}

/// Data lines of a command output: blank lines dropped, first line skipped
/// when `has_header` is set.
fn data_lines(output: &str, has_header: bool) -> impl Iterator<Item = &str> {
    output
        .lines()
        .skip(usize::from(has_header))
        .filter(|line| !line.trim().is_empty())
}
