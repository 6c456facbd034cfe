pub mod labels;

use labels::{HttpDurationLabel, HttpRequestLabel, OutcomeLabel, ResultLabel};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::{Family, MetricConstructor};
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;
use std::time::Duration;

/// Constructor for remote command duration histograms.
#[derive(Clone)]
pub struct CommandDurationHistogramBuilder;

impl MetricConstructor<Histogram> for CommandDurationHistogramBuilder {
    fn new_metric(&self) -> Histogram {
        // Buckets: 10ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s, 30s
        Histogram::new([0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
    }
}

/// Constructor for HTTP request duration histograms with predefined buckets.
#[derive(Clone)]
pub struct HttpDurationHistogramBuilder;

impl MetricConstructor<Histogram> for HttpDurationHistogramBuilder {
    fn new_metric(&self) -> Histogram {
        // Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s
        Histogram::new([0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0])
    }
}

/// Process-wide Prometheus registry for the relay.
pub struct MetricsRegistry {
    pub registry: Registry,
    pub commands_total: Family<OutcomeLabel, Counter>,
    pub command_duration_seconds: Family<OutcomeLabel, Histogram, CommandDurationHistogramBuilder>,
    pub connect_attempts_total: Family<ResultLabel, Counter>,
    pub session_connected: Gauge,
    pub idle_disconnects_total: Counter,
    pub keepalive_failures_total: Counter,
    pub http_requests_total: Family<HttpRequestLabel, Counter>,
    pub http_request_duration_seconds:
        Family<HttpDurationLabel, Histogram, HttpDurationHistogramBuilder>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        // Counters are encoded with a `_total` suffix.
        let commands_total = Family::<OutcomeLabel, Counter>::default();
        registry.register(
            "sshrelay_commands",
            "Remote commands executed, by outcome",
            commands_total.clone(),
        );

        let command_duration_seconds =
            Family::<OutcomeLabel, Histogram, CommandDurationHistogramBuilder>::new_with_constructor(
                CommandDurationHistogramBuilder,
            );
        registry.register(
            "sshrelay_command_duration_seconds",
            "Remote command latency in seconds",
            command_duration_seconds.clone(),
        );

        let connect_attempts_total = Family::<ResultLabel, Counter>::default();
        registry.register(
            "sshrelay_connect_attempts",
            "SSH connect attempts, by result",
            connect_attempts_total.clone(),
        );

        let session_connected = Gauge::default();
        registry.register(
            "sshrelay_session_connected",
            "1 while an SSH session is established",
            session_connected.clone(),
        );

        let idle_disconnects_total = Counter::default();
        registry.register(
            "sshrelay_idle_disconnects",
            "Sessions closed by the supervisor after inactivity",
            idle_disconnects_total.clone(),
        );

        let keepalive_failures_total = Counter::default();
        registry.register(
            "sshrelay_keepalive_failures",
            "Keepalive probes that failed or timed out",
            keepalive_failures_total.clone(),
        );

        let http_requests_total = Family::<HttpRequestLabel, Counter>::default();
        registry.register(
            "sshrelay_http_requests",
            "Total HTTP API requests",
            http_requests_total.clone(),
        );

        let http_request_duration_seconds =
            Family::<HttpDurationLabel, Histogram, HttpDurationHistogramBuilder>::new_with_constructor(
                HttpDurationHistogramBuilder,
            );
        registry.register(
            "sshrelay_http_request_duration_seconds",
            "HTTP API request duration in seconds",
            http_request_duration_seconds.clone(),
        );

        Self {
            registry,
            commands_total,
            command_duration_seconds,
            connect_attempts_total,
            session_connected,
            idle_disconnects_total,
            keepalive_failures_total,
            http_requests_total,
            http_request_duration_seconds,
        }
    }

    pub fn record_command(&self, outcome: &str, elapsed: Duration) {
        let label = OutcomeLabel {
            outcome: outcome.to_string(),
        };
        self.commands_total.get_or_create(&label).inc();
        self.command_duration_seconds
            .get_or_create(&label)
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_connect_attempt(&self, success: bool) {
        let result = if success { "success" } else { "failure" };
        self.connect_attempts_total
            .get_or_create(&ResultLabel {
                result: result.to_string(),
            })
            .inc();
    }

    pub fn set_connected(&self, connected: bool) {
        self.session_connected.set(i64::from(connected));
    }

    pub fn record_idle_disconnect(&self) {
        self.idle_disconnects_total.inc();
        self.session_connected.set(0);
    }

    pub fn record_keepalive_failure(&self) {
        self.keepalive_failures_total.inc();
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16) {
        self.http_requests_total
            .get_or_create(&HttpRequestLabel {
                method: method.to_string(),
                path: path.to_string(),
                status: status.to_string(),
            })
            .inc();
    }

    pub fn record_http_request_duration(&self, method: &str, path: &str, duration_secs: f64) {
        self.http_request_duration_seconds
            .get_or_create(&HttpDurationLabel {
                method: method.to_string(),
                path: path.to_string(),
            })
            .observe(duration_secs);
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
