use clap::{CommandFactory, Parser};
use sshrelay::cli::{Cli, Command, ConfigFormat};

// ---------------------------------------------------------------------------
// Test 1: Default config path is "config.toml"
// ---------------------------------------------------------------------------
#[test]
fn default_config_path() {
    let cli = Cli::try_parse_from(["sshrelay"]).unwrap();
    assert_eq!(cli.config.to_str().unwrap(), "config.toml");
    assert!(cli.command.is_none());
    assert!(cli.log_level.is_none());
}

// ---------------------------------------------------------------------------
// Test 2: Custom config with -c and --config
// ---------------------------------------------------------------------------
#[test]
fn custom_config_flags() {
    let cli = Cli::try_parse_from(["sshrelay", "-c", "/etc/sshrelay/relay.toml"]).unwrap();
    assert_eq!(cli.config.to_str().unwrap(), "/etc/sshrelay/relay.toml");

    let cli = Cli::try_parse_from(["sshrelay", "--config", "local.toml"]).unwrap();
    assert_eq!(cli.config.to_str().unwrap(), "local.toml");
}

// ---------------------------------------------------------------------------
// Test 3: Log level override
// ---------------------------------------------------------------------------
#[test]
fn log_level_override() {
    let cli = Cli::try_parse_from(["sshrelay", "--log-level", "debug"]).unwrap();
    assert_eq!(cli.log_level.as_deref(), Some("debug"));
}

// ---------------------------------------------------------------------------
// Test 4: check-config
// ---------------------------------------------------------------------------
#[test]
fn check_config_subcommand() {
    let cli = Cli::try_parse_from(["sshrelay", "check-config"]).unwrap();
    assert!(matches!(cli.command, Some(Command::CheckConfig)));
}

// ---------------------------------------------------------------------------
// Test 5: show-config formats
// ---------------------------------------------------------------------------
#[test]
fn show_config_defaults_to_toml() {
    let cli = Cli::try_parse_from(["sshrelay", "show-config"]).unwrap();
    match cli.command {
        Some(Command::ShowConfig { format }) => assert_eq!(format, ConfigFormat::Toml),
        _ => panic!("expected ShowConfig command"),
    }
}

#[test]
fn show_config_json() {
    let cli = Cli::try_parse_from(["sshrelay", "show-config", "--format", "json"]).unwrap();
    match cli.command {
        Some(Command::ShowConfig { format }) => assert_eq!(format, ConfigFormat::Json),
        _ => panic!("expected ShowConfig command"),
    }
}

#[test]
fn show_config_rejects_unknown_format() {
    assert!(Cli::try_parse_from(["sshrelay", "show-config", "--format", "yaml"]).is_err());
}

// ---------------------------------------------------------------------------
// Test 6: health-check defaults and overrides
// ---------------------------------------------------------------------------
#[test]
fn health_check_defaults() {
    let cli = Cli::try_parse_from(["sshrelay", "health-check"]).unwrap();
    match cli.command {
        Some(Command::HealthCheck { addr, timeout }) => {
            assert_eq!(addr, "127.0.0.1:3002");
            assert_eq!(timeout, 5);
        }
        _ => panic!("expected HealthCheck command"),
    }
}

#[test]
fn health_check_custom() {
    let cli = Cli::try_parse_from([
        "sshrelay",
        "health-check",
        "--addr",
        "10.0.0.1:8080",
        "--timeout",
        "1",
    ])
    .unwrap();
    match cli.command {
        Some(Command::HealthCheck { addr, timeout }) => {
            assert_eq!(addr, "10.0.0.1:8080");
            assert_eq!(timeout, 1);
        }
        _ => panic!("expected HealthCheck command"),
    }
}

// ---------------------------------------------------------------------------
// Test 7: completions and manpage
// ---------------------------------------------------------------------------
#[test]
fn completions_subcommand() {
    let cli = Cli::try_parse_from(["sshrelay", "completions", "bash"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Command::Completions {
            shell: clap_complete::Shell::Bash
        })
    ));
    assert!(Cli::try_parse_from(["sshrelay", "completions", "tcsh"]).is_err());
}

#[test]
fn manpage_subcommand() {
    let cli = Cli::try_parse_from(["sshrelay", "manpage"]).unwrap();
    assert!(matches!(cli.command, Some(Command::Manpage)));
}

// ---------------------------------------------------------------------------
// Test 8: Unknown subcommand is rejected; definition is consistent
// ---------------------------------------------------------------------------
#[test]
fn unknown_subcommand_rejected() {
    assert!(Cli::try_parse_from(["sshrelay", "hash-password"]).is_err());
}

#[test]
fn command_definition_is_valid() {
    Cli::command().debug_assert();
}
