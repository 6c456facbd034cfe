use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use sshrelay::cli::{Cli, Command, ConfigFormat};
use sshrelay::config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Command::CheckConfig) => {
            let cfg = config::load_effective_config(&cli.config)?;
            println!("Configuration is valid.");
            println!("  HTTP listen: {}", cfg.server.listen);
            println!(
                "  Idle timeout: {}s (keepalive every {}s)",
                cfg.session.idle_timeout_secs, cfg.session.keepalive_interval_secs
            );
            println!(
                "  API auth: {}",
                if cfg.api.token.is_empty() {
                    "disabled"
                } else {
                    "bearer token"
                }
            );
            return Ok(());
        }
        Some(Command::ShowConfig { format }) => {
            let app_config = config::load_effective_config(&cli.config)?;
            let redacted = config::redact::redact_config(&app_config);
            match format {
                ConfigFormat::Json => println!("{}", serde_json::to_string_pretty(&redacted)?),
                ConfigFormat::Toml => println!("{}", toml::to_string_pretty(&redacted)?),
            }
            return Ok(());
        }
        Some(Command::HealthCheck { addr, timeout }) => {
            use std::net::{SocketAddr, TcpStream};
            use std::time::Duration;

            let timeout = Duration::from_secs(*timeout);
            let Ok(socket_addr) = addr.parse::<SocketAddr>() else {
                eprintln!("Invalid address: {}", addr);
                std::process::exit(1);
            };
            match TcpStream::connect_timeout(&socket_addr, timeout) {
                Ok(_) => {
                    println!("OK: {} is reachable", addr);
                    return Ok(());
                }
                Err(e) => {
                    eprintln!("FAIL: {} is not reachable: {}", addr, e);
                    std::process::exit(1);
                }
            }
        }
        Some(Command::Completions { shell }) => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "sshrelay", &mut std::io::stdout());
            return Ok(());
        }
        Some(Command::Manpage) => {
            use clap::CommandFactory;
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            man.render(&mut std::io::stdout())?;
            return Ok(());
        }
        None => {}
    }

    // Missing file means built-in defaults; env vars apply either way.
    let app_config = config::load_effective_config(&cli.config)?;

    // Setup logging (CLI override > config)
    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| app_config.logging.level.to_string());
    sshrelay::logging::setup_logging(&log_level, app_config.logging.format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %app_config.server.listen,
        "Starting sshrelay"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        if let Err(e) = sshrelay::server::run(app_config).await {
            error!(error = %e, "Server error");
            std::process::exit(1);
        }
    });

    Ok(())
}
