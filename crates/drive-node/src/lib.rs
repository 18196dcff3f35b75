//! # drive-node-lib: ledger host, node composition, RPC.
//!
//! - [`storage::RocksStore`]: persistent versioned state backed by RocksDB
//! - [`node::Node`]: runs each contract call in one optimistic transaction
//! - [`rpc`]: JSON-RPC server for external access
//! - [`config::NodeConfig`]: node configuration

pub mod config;
pub mod error;
pub mod node;
pub mod rpc;
pub mod storage;

pub use config::NodeConfig;
pub use error::NodeError;
pub use node::Node;
pub use rpc::start_rpc_server;
pub use storage::RocksStore;
