use super::executor;
use super::state::Liveness;
use super::SessionShared;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const KEEPALIVE_COMMAND: &str = "echo ping";

/// Why a supervisor stopped. Supervisors never restart themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    /// No command activity within the idle threshold; the connection was
    /// closed by the supervisor.
    IdleClosed,
    /// A newer connect replaced the generation this supervisor watched.
    Superseded,
    /// The connection was closed by an explicit disconnect.
    Disconnected,
}

impl fmt::Display for SupervisorExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorExit::IdleClosed => write!(f, "idle"),
            SupervisorExit::Superseded => write!(f, "superseded"),
            SupervisorExit::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Decrements the running-supervisor count however the task ends.
struct RunningGuard(Arc<SessionShared>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.supervisors.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(super) fn spawn(shared: Arc<SessionShared>, generation: u64) -> JoinHandle<SupervisorExit> {
    shared.supervisors.fetch_add(1, Ordering::SeqCst);
    tokio::spawn(async move {
        let _guard = RunningGuard(shared.clone());
        let exit = run(&shared, generation).await;
        debug!(generation, reason = %exit, "session supervisor stopped");
        exit
    })
}

async fn run(shared: &SessionShared, generation: u64) -> SupervisorExit {
    let settings = &shared.settings;
    let period = settings.keepalive_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let liveness = shared
            .lock_state()
            .liveness(generation, settings.idle_timeout, Instant::now());

        let connection = match liveness {
            Liveness::Superseded => return SupervisorExit::Superseded,
            Liveness::Disconnected => return SupervisorExit::Disconnected,
            Liveness::Idle(connection) => {
                connection.close().await;
                if let Some(ref metrics) = shared.metrics {
                    metrics.record_idle_disconnect();
                }
                info!(
                    generation,
                    idle_timeout = ?settings.idle_timeout,
                    "ssh session closed after inactivity"
                );
                return SupervisorExit::IdleClosed;
            }
            Liveness::Alive(connection) => connection,
        };

        // Keepalives bypass the activity stamp so they never hold an idle
        // session open.
        match executor::dispatch(
            connection.as_ref(),
            KEEPALIVE_COMMAND,
            settings.keepalive_timeout,
        )
        .await
        {
            Ok(_) => debug!(generation, "keepalive ok"),
            Err(e) => {
                warn!(generation, error = %e, "keepalive failed");
                if let Some(ref metrics) = shared.metrics {
                    metrics.record_keepalive_failure();
                }
            }
        }
    }
}
