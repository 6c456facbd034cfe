pub mod env;
pub mod redact;
pub mod types;

use anyhow::{Context, Result};
use std::path::Path;
use types::AppConfig;

/// Maximum config file size (1 MB)
const MAX_CONFIG_SIZE: u64 = 1_048_576;

/// Minimum API token length when authentication is enabled.
const MIN_API_TOKEN_LEN: usize = 16;

/// Load and validate configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("reading config metadata: {}", path.display()))?;
    if metadata.len() > MAX_CONFIG_SIZE {
        anyhow::bail!(
            "config file too large: {} bytes (max {} bytes)",
            metadata.len(),
            MAX_CONFIG_SIZE
        );
    }

    check_config_file_permissions(path);

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config: {}", path.display()))?;
    parse_config(&content)
}

/// Load `path` if it exists, otherwise start from built-in defaults. Env
/// overrides are applied and the result re-validated either way.
pub fn load_effective_config(path: &Path) -> Result<AppConfig> {
    let mut config = if path.exists() {
        load_config(path)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        AppConfig::default()
    };
    env::apply_env_overrides(&mut config);
    validate_config(&config).context("validating config after environment overrides")?;
    Ok(config)
}

/// On Unix, warn if the config file is readable by group or others,
/// since it may contain the API token.
#[cfg(unix)]
fn check_config_file_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::metadata(path) {
        Ok(meta) => {
            let mode = meta.permissions().mode();
            if mode & 0o077 != 0 {
                tracing::warn!(
                    path = %path.display(),
                    mode = format!("{:04o}", mode & 0o7777),
                    "Config file is readable by group/others. \
                     Consider restricting permissions to 0600."
                );
            }
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Could not check config file permissions"
            );
        }
    }
}

#[cfg(not(unix))]
fn check_config_file_permissions(_path: &Path) {}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(content).context("parsing TOML configuration")?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    validate_server(config)?;
    validate_session(config)?;
    validate_api(config)?;
    Ok(())
}

fn validate_server(config: &AppConfig) -> Result<()> {
    if config.server.listen.trim().is_empty() {
        anyhow::bail!("server.listen must not be empty");
    }
    Ok(())
}

fn validate_session(config: &AppConfig) -> Result<()> {
    let s = &config.session;
    for (name, value) in [
        ("connect_timeout_secs", s.connect_timeout_secs),
        ("command_timeout_secs", s.command_timeout_secs),
        ("idle_timeout_secs", s.idle_timeout_secs),
        ("keepalive_interval_secs", s.keepalive_interval_secs),
        ("keepalive_timeout_secs", s.keepalive_timeout_secs),
    ] {
        if value == 0 {
            anyhow::bail!("session.{name} must be > 0");
        }
    }
    if s.keepalive_timeout_secs >= s.keepalive_interval_secs {
        anyhow::bail!(
            "session.keepalive_timeout_secs ({}) must be less than keepalive_interval_secs ({})",
            s.keepalive_timeout_secs,
            s.keepalive_interval_secs
        );
    }
    if s.idle_timeout_secs < s.keepalive_interval_secs {
        anyhow::bail!(
            "session.idle_timeout_secs ({}) must be >= keepalive_interval_secs ({})",
            s.idle_timeout_secs,
            s.keepalive_interval_secs
        );
    }
    if s.default_port == 0 {
        anyhow::bail!("session.default_port must be > 0");
    }
    Ok(())
}

fn validate_api(config: &AppConfig) -> Result<()> {
    let token = &config.api.token;
    if !token.is_empty() && token.len() < MIN_API_TOKEN_LEN {
        anyhow::bail!(
            "api.token must be at least {MIN_API_TOKEN_LEN} characters (or empty to disable auth)"
        );
    }
    Ok(())
}
