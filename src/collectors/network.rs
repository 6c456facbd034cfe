use crate::session::{RateSample, SessionError, SessionManager};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

const NET_DEV_COMMAND: &str = "cat /proc/net/dev";
const NET_DEV_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Sum receive/transmit byte counters over all interfaces except `lo`.
pub fn parse_net_dev(output: &str) -> NetCounters {
    let mut totals = NetCounters::default();
    for line in output.lines() {
        let Some((iface, counters)) = line.split_once(':') else {
            continue;
        };
        let iface = iface.trim();
        if iface == "lo" || iface.contains('|') {
            continue;
        }
        let fields: Vec<&str> = counters.split_whitespace().collect();
        if fields.len() < 9 {
            continue;
        }
        totals.rx_bytes = totals
            .rx_bytes
            .saturating_add(fields[0].parse::<u64>().unwrap_or(0));
        totals.tx_bytes = totals
            .tx_bytes
            .saturating_add(fields[8].parse::<u64>().unwrap_or(0));
    }
    totals
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Throughput {
    pub rx_mbps: f64,
    pub tx_mbps: f64,
}

/// Megabits per second between two samples. Counter resets read as zero.
pub fn throughput_mbps(previous: &RateSample, current: &RateSample) -> Throughput {
    let secs = current.at.saturating_duration_since(previous.at).as_secs_f64();
    if secs <= 0.0 {
        return Throughput::default();
    }
    let rate = |before: u64, after: u64| {
        after.saturating_sub(before) as f64 / secs / (1024.0 * 1024.0) * 8.0
    };
    Throughput {
        rx_mbps: rate(previous.rx_bytes, current.rx_bytes),
        tx_mbps: rate(previous.tx_bytes, current.tx_bytes),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkSnapshot {
    pub rx_mbps: f64,
    pub tx_mbps: f64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    /// Seconds covered by the rate; 0 on the first sample of a session.
    pub interval_secs: f64,
}

/// Read interface counters and derive throughput against the previous
/// sample cached on the session.
pub async fn collect_network(sessions: &SessionManager) -> Result<NetworkSnapshot, SessionError> {
    let output = sessions.execute(NET_DEV_COMMAND, NET_DEV_TIMEOUT).await?;
    let counters = parse_net_dev(&output);
    let sample = RateSample {
        rx_bytes: counters.rx_bytes,
        tx_bytes: counters.tx_bytes,
        at: Instant::now(),
    };
    let previous = sessions.swap_rate_counters(sample);
    let (rate, interval_secs) = match previous {
        Some(prev) => (
            throughput_mbps(&prev, &sample),
            sample.at.saturating_duration_since(prev.at).as_secs_f64(),
        ),
        None => (Throughput::default(), 0.0),
    };
    Ok(NetworkSnapshot {
        rx_mbps: rate.rx_mbps,
        tx_mbps: rate.tx_mbps,
        rx_bytes: counters.rx_bytes,
        tx_bytes: counters.tx_bytes,
        interval_secs,
    })
}
