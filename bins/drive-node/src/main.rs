//! Drivescore ledger node binary.
//!
//! Opens the RocksDB ledger, serves the vehicle contract over JSON-RPC and
//! runs until Ctrl+C.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use drive_node_lib::{start_rpc_server, Node, NodeConfig};
use tracing::info;

/// Drivescore node: driving-behaviour credits on a versioned ledger.
#[derive(Parser, Debug)]
#[command(
    name = "drive-node",
    version,
    about = "Drivescore node with RocksDB ledger and JSON-RPC server"
)]
struct Args {
    /// TOML config file; `DRIVESCORE_*` environment variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory for ledger storage
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// RPC server bind address
    #[arg(long)]
    rpc_bind: Option<String>,

    /// RPC server port
    #[arg(long)]
    rpc_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

impl Args {
    /// Layer explicit flags over the file/environment config.
    fn into_config(self) -> Result<(NodeConfig, String)> {
        let base = NodeConfig::load(self.config.as_deref()).context("failed to load node config")?;
        let config = NodeConfig {
            data_dir: self.data_dir.unwrap_or(base.data_dir),
            rpc_bind: self.rpc_bind.unwrap_or(base.rpc_bind),
            rpc_port: self.rpc_port.unwrap_or(base.rpc_port),
            log_level: self.log_level.unwrap_or(base.log_level),
            ..base
        };
        Ok((config, self.log_format))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let (config, log_format) = Args::parse().into_config()?;

    init_logging(&config.log_level, &log_format);

    info!("Drivescore node v{}", env!("CARGO_PKG_VERSION"));
    info!("data_dir: {:?}", config.data_dir);
    info!("rpc_addr: {}", config.rpc_addr());

    let node = Node::open(&config).context("failed to open node")?;

    let (addr, rpc_handle) = start_rpc_server(&config.rpc_addr(), node)
        .await
        .context("failed to start RPC server")?;
    info!("RPC server listening on {addr}");
    info!("Drivescore node running (Ctrl+C to stop)");

    tokio::signal::ctrl_c()
        .await
        .context("failed to install Ctrl+C handler")?;
    info!("received Ctrl+C, shutting down...");

    rpc_handle.stop().ok();
    rpc_handle.stopped().await;
    info!("Drivescore node shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// `RUST_LOG` takes precedence over `level_str`. Pass `format = "json"` for
/// structured JSON output; any other value gives human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "drive-node",
            "--data-dir",
            "/tmp/ds",
            "--rpc-port",
            "19999",
            "--log-format",
            "json",
        ]);
        let (config, format) = args.into_config().unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/ds"));
        assert_eq!(config.rpc_port, 19999);
        assert_eq!(format, "json");
    }
}
