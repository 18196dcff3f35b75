//! Host-side errors: everything that can fail while bringing a node up.
use thiserror::Error;

use drive_core::error::DriveError;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error(transparent)] Drive(#[from] DriveError),
    #[error("config: {0}")] Config(#[from] ::config::ConfigError),
    #[error("io: {0}")] Io(#[from] std::io::Error),
    #[error("invalid node config: {0}")] InvalidConfig(String),
    #[error("rpc server: {0}")] Rpc(String),
}
