//! CLI command implementations
//!
//! Loads configuration, initializes logging, then serves until Ctrl-C.

use std::path::Path;

use tracing::{info, warn};

use super::args::Cli;
use super::errors::{CliError, CliResult};
use crate::http_server::{BrokerConfig, BrokerServer};
use crate::observability::{init_logging, Event};

/// Main CLI entry point
///
/// Parses arguments and runs the broker. This is the only function that
/// main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let config = resolve_config(&cli)?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::io_error(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(serve(config))
}

/// Build the effective configuration: file (if any), then `--addr`
pub fn resolve_config(cli: &Cli) -> CliResult<BrokerConfig> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BrokerConfig::default(),
    };

    match &cli.addr {
        Some(addr) => Ok(config.override_addr(addr)?),
        None => Ok(config),
    }
}

fn load_config(path: &Path) -> CliResult<BrokerConfig> {
    Ok(BrokerConfig::load(path)?)
}

/// Bind and serve until interrupted
pub async fn serve(config: BrokerConfig) -> CliResult<()> {
    init_logging(config.log_format);

    info!(
        event = %Event::BrokerStart,
        version = env!("CARGO_PKG_VERSION"),
        "starting pubmarine"
    );
    info!(
        event = %Event::ConfigLoaded,
        addr = %config.socket_addr(),
        ws_path = %config.ws_path,
        cors_origins = config.cors_origins.len(),
        outbound_capacity = config.outbound_capacity,
        "configuration loaded"
    );

    let server = BrokerServer::bind(config).await?;

    server
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!(event = %Event::ShutdownStart, "shutdown requested");
        })
        .await?;

    Ok(())
}
