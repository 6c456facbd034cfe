use crate::api::{self, AppState};
use crate::config::types::AppConfig;
use crate::metrics::MetricsRegistry;
use crate::session::{SessionManager, SessionSettings};
use crate::transport::{RemoteTransport, SshTransport};

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Bind the configured listener and serve until Ctrl-C or SIGTERM.
pub async fn run(config: AppConfig) -> Result<()> {
    let listener = TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("binding HTTP listener on {}", config.server.listen))?;
    info!(addr = %config.server.listen, "HTTP API listening");

    let shutdown = CancellationToken::new();
    tokio::spawn(handle_signals(shutdown.clone()));

    let transport: Arc<dyn RemoteTransport> = Arc::new(SshTransport::new());
    run_on_listener(config, listener, transport, shutdown).await
}

/// Serve on a pre-bound listener with the given transport until `shutdown`
/// fires, then close the remote session.
pub async fn run_on_listener(
    config: AppConfig,
    listener: TcpListener,
    transport: Arc<dyn RemoteTransport>,
    shutdown: CancellationToken,
) -> Result<()> {
    let settings = SessionSettings::from(&config.session);
    let metrics = config
        .metrics
        .enabled
        .then(|| Arc::new(MetricsRegistry::new()));
    let sessions = match metrics {
        Some(ref metrics) => SessionManager::with_metrics(transport, settings, metrics.clone()),
        None => SessionManager::new(transport, settings),
    };

    if config.api.token.is_empty() {
        warn!("api.token is empty, HTTP endpoints are unauthenticated");
    }

    let state = AppState::new(sessions.clone(), metrics, &config.api.token, config.api.cors);
    let mut server = tokio::spawn(api::start_api_server_on_listener(
        listener,
        state,
        shutdown.clone(),
    ));

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout);
    let served = tokio::select! {
        joined = &mut server => Some(joined),
        _ = shutdown.cancelled() => {
            info!(timeout = ?shutdown_timeout, "Initiating graceful shutdown");
            match tokio::time::timeout(shutdown_timeout, &mut server).await {
                Ok(joined) => Some(joined),
                Err(_) => {
                    warn!("Shutdown timeout reached, forcing exit");
                    server.abort();
                    None
                }
            }
        }
    };

    sessions.disconnect().await;

    match served {
        Some(Ok(result)) => result?,
        Some(Err(e)) => return Err(e).context("HTTP server task panicked"),
        None => {}
    }
    info!("Graceful shutdown complete");
    Ok(())
}

async fn handle_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Could not install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Could not install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received, initiating graceful shutdown"),
        _ = terminate => info!("SIGTERM received, initiating graceful shutdown"),
    }
    shutdown.cancel();
}
