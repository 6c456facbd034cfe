//! Working-directory emulation.
//!
//! Every command runs in a fresh remote shell, so a persistent `cd` is
//! simulated locally: validated directories are remembered and later
//! commands are prefixed with `cd <dir> &&`. Planning here is pure; the
//! session manager performs the dispatch.

use std::borrow::Cow;

/// How a user command should be carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Bare `cd`: forget the working directory, no round trip.
    Home,
    /// `cd <arg>`: run `probe` remotely; its last output line is the
    /// resolved directory.
    ChangeDir { arg: String, probe: String },
    /// `pwd` while a directory is known: answer locally.
    CachedPwd(String),
    /// Anything else, already prefixed with the working directory.
    Run(String),
}

/// True when `command` is a standalone `cd`, with or without an argument.
/// `cd` chained with other shell operators is treated as an ordinary command.
pub fn is_change_dir(command: &str) -> bool {
    cd_argument(command).is_some()
}

fn cd_argument(command: &str) -> Option<&str> {
    let trimmed = command.trim();
    let rest = trimmed.strip_prefix("cd")?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let arg = rest.trim();
    if arg.contains([';', '|', '&', '\n']) {
        return None;
    }
    Some(arg)
}

pub fn plan(command: &str, working_dir: &str) -> Plan {
    if let Some(arg) = cd_argument(command) {
        if arg.is_empty() {
            return Plan::Home;
        }
        let probe = if arg.starts_with('/') || working_dir.is_empty() {
            format!("cd {} && pwd", arg)
        } else {
            format!("cd {} && cd {} && pwd", shell_quote(working_dir), arg)
        };
        return Plan::ChangeDir {
            arg: arg.to_string(),
            probe,
        };
    }

    if working_dir.is_empty() {
        return Plan::Run(command.to_string());
    }
    if command.trim() == "pwd" {
        return Plan::CachedPwd(working_dir.to_string());
    }
    Plan::Run(format!("cd {} && {}", shell_quote(working_dir), command))
}

/// Last non-empty line of a `... && pwd` probe.
pub fn resolved_dir(output: &str) -> Option<&str> {
    output
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
}

/// Quote `s` for a POSIX shell unless it is made only of safe characters.
pub fn shell_quote(s: &str) -> Cow<'_, str> {
    let safe = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+,:@%=".contains(c));
    if safe {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(format!("'{}'", s.replace('\'', r"'\''")))
    }
}
