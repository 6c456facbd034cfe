use super::{
    CommandChannel, CommandOutput, ConnectTarget, RemoteConnection, RemoteTransport,
    TransportError,
};
use async_trait::async_trait;
use russh::client::{self, AuthResult, Handle};
use russh::{ChannelMsg, Disconnect, Sig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Password-authenticated SSH transport backed by russh.
pub struct SshTransport {
    config: Arc<client::Config>,
}

impl SshTransport {
    pub fn new() -> Self {
        let config = client::Config {
            // Liveness is driven by the session supervisor, not the transport.
            inactivity_timeout: None,
            ..Default::default()
        };
        Self {
            config: Arc::new(config),
        }
    }

    async fn establish(
        &self,
        target: &ConnectTarget,
    ) -> Result<Handle<HostKeyLogger>, TransportError> {
        if target.secret.is_empty() {
            return Err(TransportError::Auth("no password provided".to_string()));
        }

        let addr = target.addr();
        let handler = HostKeyLogger { addr: addr.clone() };
        let mut handle = client::connect(self.config.clone(), addr.as_str(), handler)
            .await
            .map_err(|e| TransportError::Connect {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;

        let result = handle
            .authenticate_password(&target.user, target.secret.as_str())
            .await
            .map_err(|e| TransportError::Auth(e.to_string()))?;

        match result {
            AuthResult::Success => {
                debug!(host = %addr, user = %target.user, "ssh password auth success");
                Ok(handle)
            }
            AuthResult::Failure { .. } => {
                let _ = handle
                    .disconnect(Disconnect::ByApplication, "authentication failed", "en")
                    .await;
                Err(TransportError::Auth(format!(
                    "server rejected credentials for user '{}'",
                    target.user
                )))
            }
        }
    }
}

impl Default for SshTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteTransport for SshTransport {
    async fn connect(
        &self,
        target: &ConnectTarget,
        timeout: Duration,
    ) -> Result<Arc<dyn RemoteConnection>, TransportError> {
        let handle = tokio::time::timeout(timeout, self.establish(target))
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;
        Ok(Arc::new(SshConnection {
            handle,
            addr: target.addr(),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Accepts every host key and records its fingerprint.
pub struct HostKeyLogger {
    addr: String,
}

impl client::Handler for HostKeyLogger {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            host = %self.addr,
            fingerprint = %server_public_key.fingerprint(russh::keys::HashAlg::Sha256),
            "Accepting server host key"
        );
        Ok(true)
    }
}

struct SshConnection {
    handle: Handle<HostKeyLogger>,
    addr: String,
    closed: AtomicBool,
}

#[async_trait]
impl RemoteConnection for SshConnection {
    async fn open_channel(&self) -> Result<Box<dyn CommandChannel>, TransportError> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))?;
        trace!(host = %self.addr, channel = ?channel.id(), "ssh channel opened");
        Ok(Box::new(SshChannel { channel }))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let disconnect = self
            .handle
            .disconnect(Disconnect::ByApplication, "session closed", "en");
        match tokio::time::timeout(DISCONNECT_TIMEOUT, disconnect).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(host = %self.addr, error = %e, "ssh disconnect error ignored"),
            Err(_) => debug!(host = %self.addr, "ssh disconnect not acknowledged"),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.handle.is_closed()
    }
}

struct SshChannel {
    channel: russh::Channel<client::Msg>,
}

#[async_trait]
impl CommandChannel for SshChannel {
    async fn run(&mut self, command: &str) -> Result<CommandOutput, TransportError> {
        self.channel
            .exec(true, command)
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))?;

        let mut buf = Vec::new();
        let mut exit_status = None;
        while let Some(msg) = self.channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => buf.extend_from_slice(&data),
                ChannelMsg::ExtendedData { data, .. } => buf.extend_from_slice(&data),
                ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
                ChannelMsg::ExitSignal { signal_name, .. } => {
                    debug!(signal = ?signal_name, "remote command terminated by signal");
                }
                ChannelMsg::Failure => {
                    return Err(TransportError::Protocol(
                        "exec request rejected by server".to_string(),
                    ));
                }
                ChannelMsg::Close => break,
                _ => {}
            }
        }

        Ok(CommandOutput {
            output: String::from_utf8_lossy(&buf).into_owned(),
            exit_status,
        })
    }

    async fn kill(&mut self) -> Result<(), TransportError> {
        self.channel
            .signal(Sig::KILL)
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.channel.close().await {
            trace!(error = %e, "ssh channel already closed");
        }
    }
}
