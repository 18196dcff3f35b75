//! Node configuration for a Drivescore ledger node.
//!
//! Provides [`NodeConfig`] with defaults for data directory, RPC binding and
//! scoring knobs. [`NodeConfig::load`] layers an optional TOML file and
//! `DRIVESCORE_*` environment variables over those defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use drive_core::config::ScoringConfig;
use drive_core::constants::DEFAULT_RPC_PORT;
use drive_core::error::DriveError;

use crate::error::NodeError;

/// Environment variable prefix, e.g. `DRIVESCORE_RPC_PORT`,
/// `DRIVESCORE_SCORING__ZIGZAG_LATERAL_THRESHOLD`.
pub const ENV_PREFIX: &str = "DRIVESCORE";

/// Commit attempts a node makes before surfacing a read conflict.
pub const DEFAULT_COMMIT_ATTEMPTS: u32 = 3;

/// Configuration for a node instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    /// IP address for the JSON-RPC server to bind to.
    pub rpc_bind: String,
    pub rpc_port: u16,
    /// Log level filter string (e.g. "info", "drive_core=debug").
    pub log_level: String,
    /// Attempts per contract call when the commit hits a read conflict.
    pub commit_attempts: u32,
    pub scoring: ScoringConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("drivescore");

        Self {
            data_dir,
            rpc_bind: "127.0.0.1".to_string(),
            rpc_port: DEFAULT_RPC_PORT,
            log_level: "info".to_string(),
            commit_attempts: DEFAULT_COMMIT_ATTEMPTS,
            scoring: ScoringConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Defaults, then `path` (if given), then `DRIVESCORE_*` environment variables.
    ///
    /// Nested keys use `__` in the environment: `DRIVESCORE_SCORING__WINDOW_RECORDS=20`.
    pub fn load(path: Option<&Path>) -> Result<Self, NodeError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        let cfg: Self = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), NodeError> {
        if self.commit_attempts == 0 {
            return Err(NodeError::InvalidConfig("commit_attempts must be > 0".into()));
        }
        self.scoring.validate().map_err(DriveError::from)?;
        Ok(())
    }

    /// Path to the RocksDB ledger directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("ledger")
    }

    /// Socket address string for the RPC server.
    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_bind, self.rpc_port)
    }
}
