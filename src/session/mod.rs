//! Remote session lifecycle: one live connection, command execution with
//! working-directory emulation, and an idle/keepalive supervisor per
//! connection generation.

mod error;
pub mod executor;
pub mod state;
pub mod supervisor;
pub mod workdir;

pub use error::SessionError;
pub use state::RateSample;
pub use supervisor::SupervisorExit;

use crate::config::types::SessionConfig;
use crate::metrics::MetricsRegistry;
use crate::transport::{ConnectTarget, RemoteConnection, RemoteTransport};
use serde::{Deserialize, Serialize};
use state::{DispatchSnapshot, SessionState};
use std::fmt;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use workdir::Plan;

const TRIAL_COMMAND: &str = "echo ok";
const HOME_MESSAGE: &str = "Changed to home directory";

/// Timing knobs for connect, execute and the supervisor.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub idle_timeout: Duration,
    pub keepalive_interval: Duration,
    pub keepalive_timeout: Duration,
    pub default_port: u16,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(60),
            keepalive_interval: Duration::from_secs(25),
            keepalive_timeout: Duration::from_secs(3),
            default_port: 22,
        }
    }
}

impl From<&SessionConfig> for SessionSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            command_timeout: Duration::from_secs(config.command_timeout_secs),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            keepalive_interval: Duration::from_secs(config.keepalive_interval_secs),
            keepalive_timeout: Duration::from_secs(config.keepalive_timeout_secs),
            default_port: config.default_port,
        }
    }
}

/// Connection parameters as supplied by a client.
#[derive(Clone, Deserialize)]
pub struct ConnectRequest {
    pub host: String,
    pub user: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub password: String,
}

impl ConnectRequest {
    pub fn new(host: &str, user: &str, port: Option<u16>, password: &str) -> Self {
        Self {
            host: host.to_string(),
            user: user.to_string(),
            port,
            password: password.to_string(),
        }
    }

    fn into_target(self, default_port: u16) -> ConnectTarget {
        let target = ConnectTarget::new(
            self.host.trim(),
            self.port.unwrap_or(default_port),
            self.user.trim(),
            &self.password,
        );
        // The request's copy is wiped here; the target keeps its own.
        drop(zeroize::Zeroizing::new(self.password));
        target
    }
}

impl fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("port", &self.port)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub connected: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DisconnectOutcome {
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionStatus {
    pub connected: bool,
    pub host: String,
    pub user: String,
    pub working_dir: String,
}

pub(crate) struct SessionShared {
    transport: Arc<dyn RemoteTransport>,
    settings: SessionSettings,
    state: Mutex<SessionState>,
    /// Serializes `cd` validations against each other.
    cd_lock: tokio::sync::Mutex<()>,
    /// Serializes connect attempts.
    lifecycle: tokio::sync::Mutex<()>,
    supervisor: Mutex<Option<JoinHandle<SupervisorExit>>>,
    supervisors: AtomicUsize,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl SessionShared {
    /// Lock the state, recovering from poisoning; no code path leaves the
    /// state half-updated across a panic point.
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Owner of the process-wide remote session. Cheap to clone.
#[derive(Clone)]
pub struct SessionManager {
    shared: Arc<SessionShared>,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn RemoteTransport>, settings: SessionSettings) -> Self {
        Self::build(transport, settings, None)
    }

    pub fn with_metrics(
        transport: Arc<dyn RemoteTransport>,
        settings: SessionSettings,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self::build(transport, settings, Some(metrics))
    }

    fn build(
        transport: Arc<dyn RemoteTransport>,
        settings: SessionSettings,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                transport,
                settings,
                state: Mutex::new(SessionState::new()),
                cd_lock: tokio::sync::Mutex::new(()),
                lifecycle: tokio::sync::Mutex::new(()),
                supervisor: Mutex::new(None),
                supervisors: AtomicUsize::new(0),
                metrics,
            }),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.shared.settings
    }

    /// Establish a new session, replacing any existing one on success.
    ///
    /// Never fails: errors are reported as `connected: false` and leave the
    /// current session untouched.
    pub async fn connect(&self, request: ConnectRequest) -> ConnectOutcome {
        let _serial = self.shared.lifecycle.lock().await;
        let target = request.into_target(self.shared.settings.default_port);
        debug!(
            host = %target.host,
            user = %target.user,
            port = target.port,
            "ssh connect requested"
        );

        let connection = match self.trial(&target).await {
            Ok(connection) => connection,
            Err(e) => {
                warn!(
                    host = %target.host,
                    user = %target.user,
                    error = %e,
                    "ssh connect failed"
                );
                if let Some(ref metrics) = self.shared.metrics {
                    metrics.record_connect_attempt(false);
                }
                return ConnectOutcome {
                    connected: false,
                    message: e.to_string(),
                };
            }
        };

        let host = target.host.clone();
        let user = target.user.clone();
        let (previous, generation) =
            self.shared
                .lock_state()
                .install(connection, &target, Instant::now());
        drop(target);
        if let Some(previous) = previous {
            previous.close().await;
            debug!("previous ssh connection closed");
        }

        let handle = supervisor::spawn(self.shared.clone(), generation);
        let superseded = self
            .shared
            .supervisor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle);
        // The old supervisor observes the generation change on its next tick.
        drop(superseded);

        if let Some(ref metrics) = self.shared.metrics {
            metrics.record_connect_attempt(true);
            metrics.set_connected(true);
        }
        info!(host = %host, user = %user, generation, "ssh session established");
        ConnectOutcome {
            connected: true,
            message: "ok".to_string(),
        }
    }

    /// Authenticate and prove the connection can run a command, all within
    /// the connect timeout. The trial connection becomes the session.
    async fn trial(
        &self,
        target: &ConnectTarget,
    ) -> Result<Arc<dyn RemoteConnection>, SessionError> {
        let budget = self.shared.settings.connect_timeout;
        let started = Instant::now();
        let connection = self.shared.transport.connect(target, budget).await?;

        let remaining = budget.saturating_sub(started.elapsed());
        match executor::dispatch(connection.as_ref(), TRIAL_COMMAND, remaining).await {
            Ok(_) => Ok(connection),
            Err(e) => {
                connection.close().await;
                Err(e)
            }
        }
    }

    /// Close the current session, if any. Idempotent.
    pub async fn disconnect(&self) -> DisconnectOutcome {
        let previous = self.shared.lock_state().clear();
        match previous {
            Some(connection) => {
                connection.close().await;
                if let Some(ref metrics) = self.shared.metrics {
                    metrics.set_connected(false);
                }
                info!("ssh session closed");
            }
            None => debug!("disconnect requested with no active session"),
        }
        DisconnectOutcome { connected: false }
    }

    pub fn status(&self) -> SessionStatus {
        let state = self.shared.lock_state();
        let (host, user) = state
            .credentials()
            .map(|c| (c.host.clone(), c.user.clone()))
            .unwrap_or_default();
        SessionStatus {
            connected: state.is_connected(),
            host,
            user,
            working_dir: state.working_dir().to_string(),
        }
    }

    /// Run a command against the current connection.
    pub async fn execute(&self, command: &str, timeout: Duration) -> Result<String, SessionError> {
        let started = Instant::now();
        let result = self.execute_inner(command, timeout).await;
        if let Some(ref metrics) = self.shared.metrics {
            let outcome = match &result {
                Ok(_) => "ok",
                Err(e) => e.kind(),
            };
            metrics.record_command(outcome, started.elapsed());
        }
        result
    }

    async fn execute_inner(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<String, SessionError> {
        if workdir::is_change_dir(command) {
            let _serial = self.shared.cd_lock.lock().await;
            let snapshot = self.begin_dispatch()?;
            let plan = workdir::plan(command, &snapshot.working_dir);
            return self.carry_out(plan, snapshot, timeout).await;
        }
        let snapshot = self.begin_dispatch()?;
        let plan = workdir::plan(command, &snapshot.working_dir);
        self.carry_out(plan, snapshot, timeout).await
    }

    /// Snapshot the identity fields and stamp activity in one critical
    /// section.
    fn begin_dispatch(&self) -> Result<DispatchSnapshot, SessionError> {
        let mut state = self.shared.lock_state();
        let snapshot = state.snapshot().ok_or(SessionError::NotConnected)?;
        state.touch(Instant::now());
        Ok(snapshot)
    }

    async fn carry_out(
        &self,
        plan: Plan,
        snapshot: DispatchSnapshot,
        timeout: Duration,
    ) -> Result<String, SessionError> {
        match plan {
            Plan::Home => {
                self.shared
                    .lock_state()
                    .set_working_dir(snapshot.generation, String::new());
                Ok(HOME_MESSAGE.to_string())
            }
            Plan::CachedPwd(dir) => Ok(dir),
            Plan::Run(command) => {
                debug!(command = %command, generation = snapshot.generation, "dispatching");
                executor::dispatch(snapshot.connection.as_ref(), &command, timeout).await
            }
            Plan::ChangeDir { arg, probe } => {
                let output =
                    match executor::dispatch(snapshot.connection.as_ref(), &probe, timeout).await {
                        Ok(output) => output,
                        Err(SessionError::RemoteExit { .. }) => {
                            return Err(SessionError::DirectoryNotFound(arg))
                        }
                        Err(e) => return Err(e),
                    };
                let dir = workdir::resolved_dir(&output)
                    .ok_or_else(|| SessionError::DirectoryNotFound(arg.clone()))?
                    .to_string();
                let stored = self
                    .shared
                    .lock_state()
                    .set_working_dir(snapshot.generation, dir.clone());
                if !stored {
                    debug!(dir = %dir, "cd result discarded, connection replaced");
                }
                Ok(format!("Changed directory to: {}", dir))
            }
        }
    }

    /// Record fresh interface counters and return the previous sample.
    /// Returns `None` while disconnected or on the first sample after a
    /// connect.
    pub fn swap_rate_counters(&self, sample: RateSample) -> Option<RateSample> {
        self.shared.lock_state().swap_rate_counters(sample)
    }

    pub fn last_activity(&self) -> Instant {
        self.shared.lock_state().last_activity()
    }

    pub fn generation(&self) -> u64 {
        self.shared.lock_state().generation()
    }

    /// Connection start time of the live session.
    pub fn connected_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.shared.lock_state().connected_at()
    }

    /// Number of supervisor tasks still running.
    pub fn active_supervisors(&self) -> usize {
        self.shared
            .supervisors
            .load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Detach the current supervisor's join handle, e.g. to await its exit
    /// reason. The supervisor keeps running either way.
    pub fn take_supervisor(&self) -> Option<JoinHandle<SupervisorExit>> {
        self.shared
            .supervisor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}
