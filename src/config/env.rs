//! Environment variable overrides.
//!
//! Applied on top of the file (or built-in defaults), so a container can be
//! configured without mounting a config file.

use crate::config::types::*;

/// Overlay `SSHRELAY_*` variables onto `config`.
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Some(v) = opt_env("SSHRELAY_LISTEN") {
        config.server.listen = v;
    }

    if let Some(v) = opt_env("SSHRELAY_LOG_LEVEL") {
        if let Ok(level) = parse_log_level(&v) {
            config.logging.level = level;
        }
    }
    if let Some(v) = opt_env("SSHRELAY_LOG_FORMAT") {
        if let Ok(format) = parse_log_format(&v) {
            config.logging.format = format;
        }
    }

    config.session.idle_timeout_secs =
        parse_env("SSHRELAY_IDLE_TIMEOUT", config.session.idle_timeout_secs);
    config.session.keepalive_interval_secs = parse_env(
        "SSHRELAY_KEEPALIVE_INTERVAL",
        config.session.keepalive_interval_secs,
    );
    config.session.command_timeout_secs =
        parse_env("SSHRELAY_COMMAND_TIMEOUT", config.session.command_timeout_secs);
    config.session.connect_timeout_secs =
        parse_env("SSHRELAY_CONNECT_TIMEOUT", config.session.connect_timeout_secs);

    config.metrics.enabled = parse_bool_env("SSHRELAY_METRICS_ENABLED", config.metrics.enabled);

    if let Some(v) = opt_env("SSHRELAY_API_TOKEN") {
        config.api.token = v;
    }

    clear_sensitive_env_vars();
}

/// Drop secrets from the process environment once they have been read, so
/// they do not leak to child processes or `/proc/<pid>/environ`.
fn clear_sensitive_env_vars() {
    for key in ["SSHRELAY_API_TOKEN"] {
        if std::env::var_os(key).is_some() {
            std::env::remove_var(key);
        }
    }
}

fn opt_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    opt_env(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_bool_env(key: &str, default: bool) -> bool {
    opt_env(key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn parse_log_level(s: &str) -> anyhow::Result<LogLevel> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Ok(LogLevel::Trace),
        "debug" => Ok(LogLevel::Debug),
        "info" => Ok(LogLevel::Info),
        "warn" => Ok(LogLevel::Warn),
        "error" => Ok(LogLevel::Error),
        _ => anyhow::bail!("invalid log level: '{s}'"),
    }
}

fn parse_log_format(s: &str) -> anyhow::Result<LogFormat> {
    match s.to_ascii_lowercase().as_str() {
        "pretty" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        _ => anyhow::bail!("invalid log format: '{s}'"),
    }
}
