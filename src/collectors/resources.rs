use crate::session::{SessionError, SessionManager};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

const PROC_STAT_COMMAND: &str = "grep '^cpu ' /proc/stat";
const MEMORY_COMMAND: &str = "free -m";
const DISK_COMMANDS: &[&str] = &[
    "df / | awk 'NR==2{print $5}' | tr -d '%'",
    "df -h / | tail -n 1 | awk '{print $5}' | tr -d '%'",
];
const LOAD_COMMANDS: &[&str] = &[
    "cat /proc/loadavg",
    "uptime | grep -oE 'load average: [0-9.]+' | grep -oE '[0-9.]+' | head -1",
];
const GPU_COMMANDS: &[&str] = &[
    "nvidia-smi --query-gpu=utilization.gpu --format=csv,noheader,nounits 2>/dev/null | head -1",
    "cat /sys/class/drm/card0/device/gpu_busy_percent 2>/dev/null | head -1",
];
const STAT_TIMEOUT: Duration = Duration::from_secs(1);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const CPU_SAMPLE_GAP: Duration = Duration::from_millis(250);

/// Aggregate jiffies from the `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuTimes {
    pub values: Vec<u64>,
}

impl CpuTimes {
    fn total(&self) -> u64 {
        self.values.iter().sum()
    }

    /// idle + iowait
    fn idle(&self) -> u64 {
        self.values.get(3).copied().unwrap_or(0) + self.values.get(4).copied().unwrap_or(0)
    }
}

pub fn parse_proc_stat_cpu(output: &str) -> Option<CpuTimes> {
    let line = output.lines().find(|l| l.trim_start().starts_with("cpu "))?;
    let values = line
        .split_whitespace()
        .skip(1)
        .map(|v| v.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    (values.len() >= 4).then_some(CpuTimes { values })
}

/// Busy percentage between two samples, clamped to 0..=100.
pub fn cpu_usage_between(first: &CpuTimes, second: &CpuTimes) -> f64 {
    let (t1, t2) = (first.total(), second.total());
    if t2 <= t1 {
        return 0.0;
    }
    let total = (t2 - t1) as f64;
    let idle = second.idle().saturating_sub(first.idle()) as f64;
    ((total - idle) * 100.0 / total).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryUsage {
    /// GiB
    pub used: f64,
    /// GiB
    pub total: f64,
}

/// Parse the `Mem:` line of `free -m`. Used memory is total minus
/// available; older `free` without an available column falls back to the
/// used column.
pub fn parse_memory(output: &str) -> Option<MemoryUsage> {
    let has_available = output
        .lines()
        .next()
        .is_some_and(|header| header.contains("available"));
    let line = output.lines().find(|l| l.trim_start().starts_with("Mem:"))?;
    let f: Vec<&str> = line.split_whitespace().collect();
    let total_mb: f64 = f.get(1)?.parse().ok()?;
    if total_mb.is_nan() || total_mb <= 0.0 {
        return None;
    }
    let used_mb = if has_available {
        let available: f64 = f.get(6)?.parse().ok()?;
        total_mb - available
    } else {
        f.get(2)?.parse().ok()?
    };
    let total = total_mb / 1024.0;
    let used = (used_mb / 1024.0).clamp(0.0, total);
    Some(MemoryUsage { used, total })
}

/// First number in `output`, clamped to `0..=max`.
pub fn parse_bounded(output: &str, max: f64) -> Option<f64> {
    output
        .split_whitespace()
        .next()?
        .trim_end_matches('%')
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, max))
}

#[derive(Debug, Clone, Serialize)]
pub struct CpuSummary {
    pub usage: f64,
    pub load: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GpuSummary {
    pub usage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiskSummary {
    /// Percent used on `/`.
    pub util: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceSnapshot {
    pub cpu: CpuSummary,
    pub gpu: GpuSummary,
    pub ram: MemoryUsage,
    pub ssd: DiskSummary,
}

/// Sample CPU, load, memory, root-disk and GPU utilisation. Individual
/// probes that fail report zero; only `NotConnected` is an error.
pub async fn collect_resources(
    sessions: &SessionManager,
) -> Result<ResourceSnapshot, SessionError> {
    let usage = sample_cpu(sessions).await?;

    let ram = match sessions.execute(MEMORY_COMMAND, PROBE_TIMEOUT).await {
        Ok(out) => parse_memory(&out),
        Err(SessionError::NotConnected) => return Err(SessionError::NotConnected),
        Err(e) => {
            debug!(error = %e, "memory probe failed");
            None
        }
    }
    .unwrap_or(MemoryUsage {
        used: 0.0,
        total: 0.0,
    });

    let util = probe_number(sessions, DISK_COMMANDS, 100.0).await?;
    let load = probe_number(sessions, LOAD_COMMANDS, 50.0).await?;
    let gpu = probe_number(sessions, GPU_COMMANDS, 100.0).await?;

    Ok(ResourceSnapshot {
        cpu: CpuSummary { usage, load },
        gpu: GpuSummary { usage: gpu },
        ram,
        ssd: DiskSummary { util },
    })
}

async fn sample_cpu(sessions: &SessionManager) -> Result<f64, SessionError> {
    let first = match sessions.execute(PROC_STAT_COMMAND, STAT_TIMEOUT).await {
        Ok(out) => parse_proc_stat_cpu(&out),
        Err(SessionError::NotConnected) => return Err(SessionError::NotConnected),
        Err(_) => None,
    };
    let Some(first) = first else {
        return Ok(0.0);
    };
    tokio::time::sleep(CPU_SAMPLE_GAP).await;
    let second = match sessions.execute(PROC_STAT_COMMAND, STAT_TIMEOUT).await {
        Ok(out) => parse_proc_stat_cpu(&out),
        Err(SessionError::NotConnected) => return Err(SessionError::NotConnected),
        Err(_) => None,
    };
    Ok(second
        .map(|second| cpu_usage_between(&first, &second))
        .unwrap_or(0.0))
}

async fn probe_number(
    sessions: &SessionManager,
    commands: &[&str],
    max: f64,
) -> Result<f64, SessionError> {
    let found = super::first_successful(sessions, commands, PROBE_TIMEOUT).await?;
    Ok(found
        .and_then(|(_, out)| parse_bounded(&out, max))
        .unwrap_or(0.0))
}
