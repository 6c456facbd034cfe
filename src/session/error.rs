use crate::transport::TransportError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("ssh not connected")]
    NotConnected,
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("ssh command timeout after {0:?}")]
    CommandTimeout(Duration),
    #[error("remote command failed ({})", describe_exit(.status))]
    RemoteExit { status: Option<u32>, output: String },
    #[error("cd: {0}: No such file or directory")]
    DirectoryNotFound(String),
    #[error("transport error: {0}")]
    Transport(String),
}

fn describe_exit(status: &Option<u32>) -> String {
    match status {
        Some(code) => format!("exit status {}", code),
        None => "no exit status".to_string(),
    }
}

impl SessionError {
    /// Stable label used in metrics and API error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::NotConnected => "not_connected",
            SessionError::AuthenticationFailed(_) => "auth_failed",
            SessionError::CommandTimeout(_) => "timeout",
            SessionError::RemoteExit { .. } => "remote_exit",
            SessionError::DirectoryNotFound(_) => "directory_not_found",
            SessionError::Transport(_) => "transport",
        }
    }

    /// Output captured before a non-zero exit, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            SessionError::RemoteExit { output, .. } => Some(output),
            _ => None,
        }
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Auth(msg) => SessionError::AuthenticationFailed(msg),
            other => SessionError::Transport(other.to_string()),
        }
    }
}
