use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sshrelay",
    version,
    about = "HTTP relay for administering a remote host over a single SSH session"
)]
pub struct Cli {
    /// Path to configuration file (also settable via SSHRELAY_CONFIG env var)
    #[arg(short, long, default_value = "config.toml", env = "SSHRELAY_CONFIG")]
    pub config: PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Toml,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate configuration file
    CheckConfig,
    /// Show the effective configuration (with sensitive fields redacted)
    ShowConfig {
        /// Output format
        #[arg(long, value_enum, default_value = "toml")]
        format: ConfigFormat,
    },
    /// Health check: verify the HTTP listener is reachable via TCP connect
    HealthCheck {
        /// Address to check (host:port)
        #[arg(long, default_value = "127.0.0.1:3002")]
        addr: String,
        /// Timeout in seconds
        #[arg(long, default_value = "5")]
        timeout: u64,
    },
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page (roff format)
    Manpage,
}
