use crate::config::types::AppConfig;

/// Copy of `cfg` safe to print: the API token is replaced with "***".
pub fn redact_config(cfg: &AppConfig) -> AppConfig {
    let mut redacted = cfg.clone();
    if !redacted.api.token.is_empty() {
        redacted.api.token = "***".to_string();
    }
    redacted
}
