use crate::transport::{ConnectTarget, RemoteConnection};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Cumulative interface byte counters observed at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub at: Instant,
}

/// Who the session is connected as. The password is not kept: it is only
/// needed for authentication and is wiped with the connect target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub host: String,
    pub port: u16,
    pub user: String,
}

impl From<&ConnectTarget> for SessionIdentity {
    fn from(target: &ConnectTarget) -> Self {
        Self {
            host: target.host.clone(),
            port: target.port,
            user: target.user.clone(),
        }
    }
}

/// Consistent view of the identity fields taken at dispatch time.
#[derive(Clone)]
pub struct DispatchSnapshot {
    pub connection: Arc<dyn RemoteConnection>,
    pub generation: u64,
    pub working_dir: String,
}

/// What the liveness supervisor should do on a tick.
pub enum Liveness {
    /// A newer connection replaced ours.
    Superseded,
    /// Our connection was closed by an explicit disconnect.
    Disconnected,
    /// Idle threshold exceeded; the connection has already been detached
    /// from the state and must be closed by the caller.
    Idle(Arc<dyn RemoteConnection>),
    /// Still in use; send a keepalive over this connection.
    Alive(Arc<dyn RemoteConnection>),
}

/// Process-wide session record.
///
/// Connection-related fields are only replaced wholesale by
/// [`SessionState::install`] and [`SessionState::clear`]; everything else is
/// a read or a monotonic update.
pub struct SessionState {
    connection: Option<Arc<dyn RemoteConnection>>,
    credentials: Option<SessionIdentity>,
    working_dir: String,
    last_activity: Instant,
    generation: u64,
    rate_counters: Option<RateSample>,
    connected_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            connection: None,
            credentials: None,
            working_dir: String::new(),
            last_activity: Instant::now(),
            generation: 0,
            rate_counters: None,
            connected_at: None,
        }
    }

    /// Install a freshly authenticated connection. Returns the previous
    /// connection (to be closed by the caller) and the new generation.
    pub fn install(
        &mut self,
        connection: Arc<dyn RemoteConnection>,
        credentials: &ConnectTarget,
        now: Instant,
    ) -> (Option<Arc<dyn RemoteConnection>>, u64) {
        let previous = self.connection.replace(connection);
        self.credentials = Some(SessionIdentity::from(credentials));
        self.working_dir.clear();
        self.rate_counters = None;
        self.last_activity = now;
        self.generation += 1;
        self.connected_at = Some(Utc::now());
        (previous, self.generation)
    }

    /// Detach the current connection, invalidating its generation.
    /// Credentials are kept for status reporting.
    pub fn clear(&mut self) -> Option<Arc<dyn RemoteConnection>> {
        self.working_dir.clear();
        self.rate_counters = None;
        self.connected_at = None;
        self.generation += 1;
        self.connection.take()
    }

    /// Stamp activity; never moves the timestamp backwards.
    pub fn touch(&mut self, now: Instant) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    pub fn snapshot(&self) -> Option<DispatchSnapshot> {
        self.connection.as_ref().map(|connection| DispatchSnapshot {
            connection: connection.clone(),
            generation: self.generation,
            working_dir: self.working_dir.clone(),
        })
    }

    /// Store a validated working directory, unless the connection it was
    /// validated against has since been replaced.
    pub fn set_working_dir(&mut self, generation: u64, dir: String) -> bool {
        if self.generation != generation || self.connection.is_none() {
            return false;
        }
        self.working_dir = dir;
        true
    }

    pub fn liveness(&mut self, generation: u64, idle_timeout: Duration, now: Instant) -> Liveness {
        if self.generation != generation {
            return if self.connection.is_some() {
                Liveness::Superseded
            } else {
                Liveness::Disconnected
            };
        }
        let Some(connection) = self.connection.clone() else {
            return Liveness::Disconnected;
        };
        if now.saturating_duration_since(self.last_activity) > idle_timeout {
            self.clear();
            return Liveness::Idle(connection);
        }
        Liveness::Alive(connection)
    }

    /// Replace the cached rate counters, returning the previous sample.
    /// Ignored while disconnected.
    pub fn swap_rate_counters(&mut self, sample: RateSample) -> Option<RateSample> {
        if self.connection.is_none() {
            return None;
        }
        self.rate_counters.replace(sample)
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .map(|c| !c.is_closed())
            .unwrap_or(false)
    }

    pub fn credentials(&self) -> Option<&SessionIdentity> {
        self.credentials.as_ref()
    }

    pub fn working_dir(&self) -> &str {
        &self.working_dir
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn rate_counters(&self) -> Option<RateSample> {
        self.rate_counters
    }

    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.connected_at
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
