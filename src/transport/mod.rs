//! Remote-execution transport seam.
//!
//! The session layer only needs three capabilities from the wire: open an
//! authenticated connection, open one independent command channel per
//! command, and close the connection. [`ssh::SshTransport`] provides them
//! over russh; tests plug in a scripted transport.

pub mod ssh;

pub use ssh::SshTransport;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("channel error: {0}")]
    Channel(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Where and how to authenticate. The secret is wiped from memory on drop.
#[derive(Clone)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub secret: Zeroizing<String>,
}

impl ConnectTarget {
    pub fn new(host: &str, port: u16, user: &str, secret: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            user: user.to_string(),
            secret: Zeroizing::new(secret.to_string()),
        }
    }

    /// `host:port`, with IPv6 literals bracketed.
    pub fn addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("secret", &"***")
            .finish()
    }
}

/// Result of one remote command: stdout and stderr interleaved as received,
/// plus the exit status when the remote side reported one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub output: String,
    pub exit_status: Option<u32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }
}

#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Open and authenticate a connection, bounded by `timeout`.
    async fn connect(
        &self,
        target: &ConnectTarget,
        timeout: Duration,
    ) -> Result<Arc<dyn RemoteConnection>, TransportError>;
}

#[async_trait]
pub trait RemoteConnection: Send + Sync {
    /// Open a fresh channel for exactly one command.
    async fn open_channel(&self) -> Result<Box<dyn CommandChannel>, TransportError>;

    /// Tear the connection down. Safe to call more than once.
    async fn close(&self);

    /// Non-blocking check whether the connection is known to be gone.
    fn is_closed(&self) -> bool;
}

#[async_trait]
pub trait CommandChannel: Send {
    /// Execute `command` and collect combined output until the remote side
    /// closes the channel.
    async fn run(&mut self, command: &str) -> Result<CommandOutput, TransportError>;

    /// Ask the remote side to SIGKILL the running command.
    async fn kill(&mut self) -> Result<(), TransportError>;

    /// Release the channel.
    async fn close(self: Box<Self>);
}
