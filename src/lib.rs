pub mod api;
pub mod cli;
pub mod collectors;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod session;
pub mod transport;
