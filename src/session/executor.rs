use super::SessionError;
use crate::transport::{CommandChannel, CommandOutput, RemoteConnection, TransportError};
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound for the kill and close sent after a timeout or on completion.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(1);

/// Run one command on a fresh channel of `connection`, racing channel setup
/// and the command itself against `timeout`.
///
/// On expiry the remote command is sent SIGKILL (best effort) and the
/// channel is closed before `CommandTimeout` is returned. A non-zero or
/// missing exit status becomes `RemoteExit` with the collected output.
pub async fn dispatch(
    connection: &dyn RemoteConnection,
    command: &str,
    timeout: Duration,
) -> Result<String, SessionError> {
    let mut channel: Option<Box<dyn CommandChannel>> = None;
    let attempt: Result<Result<CommandOutput, TransportError>, _> =
        tokio::time::timeout(timeout, async {
            let opened = channel.insert(connection.open_channel().await?);
            opened.run(command).await
        })
        .await;

    let output = match attempt {
        Ok(Ok(output)) => {
            release(channel).await;
            output
        }
        Ok(Err(e)) => {
            release(channel).await;
            return Err(e.into());
        }
        Err(_) => {
            match channel {
                Some(mut opened) => {
                    match tokio::time::timeout(CLEANUP_TIMEOUT, opened.kill()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => debug!(error = %e, "kill after timeout not delivered"),
                        Err(_) => debug!("kill after timeout not acknowledged"),
                    }
                    release(Some(opened)).await;
                }
                None => debug!("channel open did not complete before the deadline"),
            }
            warn!(command = %command, timeout = ?timeout, "ssh command timed out");
            return Err(SessionError::CommandTimeout(timeout));
        }
    };

    if output.success() {
        Ok(output.output)
    } else {
        Err(SessionError::RemoteExit {
            status: output.exit_status,
            output: output.output,
        })
    }
}

async fn release(channel: Option<Box<dyn CommandChannel>>) {
    if let Some(channel) = channel {
        if tokio::time::timeout(CLEANUP_TIMEOUT, channel.close())
            .await
            .is_err()
        {
            debug!("channel close not acknowledged");
        }
    }
}
