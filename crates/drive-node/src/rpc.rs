//! JSON-RPC server for a Drivescore node.
//!
//! Uses jsonrpsee 0.24 to expose the vehicle contract: wallet creation and
//! queries, telemetry ingestion, scoring, the last scoring report, and
//! telemetry history.

use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use serde::{Deserialize, Serialize};

use drive_core::error::DriveError;
use drive_core::scoring::ScoringReport;
use drive_core::types::{RawTelemetry, TelemetryInput, TelemetryRecord};

use crate::error::NodeError;
use crate::node::Node;

// --- Error codes ---

pub const RPC_UPSTREAM: i32 = -1;
pub const RPC_ALREADY_EXISTS: i32 = -4;
pub const RPC_NOT_FOUND: i32 = -5;
pub const RPC_INVALID_INPUT: i32 = -8;
pub const RPC_SERIALIZATION: i32 = -22;
pub const RPC_CONFLICT: i32 = -25;

/// History entries returned when the caller gives no limit.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// JSON representation of a vehicle wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletJson {
    pub vehicle_id: String,
    pub credits: i64,
}

/// Stable JSON-RPC error code for a contract error.
pub fn error_code(e: &DriveError) -> i32 {
    match e {
        DriveError::TelemetryNotFound(_)
        | DriveError::WalletNotFound(_)
        | DriveError::AnalysisNotFound(_) => RPC_NOT_FOUND,
        DriveError::AlreadyExists(_) => RPC_ALREADY_EXISTS,
        DriveError::InvalidInput(_) => RPC_INVALID_INPUT,
        DriveError::Serialization(_) => RPC_SERIALIZATION,
        DriveError::Conflict(_) => RPC_CONFLICT,
        DriveError::Upstream(_) => RPC_UPSTREAM,
    }
}

fn rpc_error(e: DriveError) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(error_code(&e), e.to_string(), None::<()>)
}

/// The Drivescore JSON-RPC interface.
#[rpc(server)]
pub trait DriveRpc {
    /// Creates a zero-credit wallet for the vehicle.
    #[method(name = "createwallet")]
    async fn create_wallet(&self, vehicle_id: String) -> Result<WalletJson, ErrorObjectOwned>;

    /// Stores a telemetry sample without scoring it.
    #[method(name = "storetelemetry")]
    async fn store_telemetry(
        &self,
        vehicle_id: String,
        telemetry: TelemetryInput,
    ) -> Result<TelemetryRecord, ErrorObjectOwned>;

    /// Stores a telemetry sample given as numeric strings.
    #[method(name = "storerawtelemetry")]
    async fn store_raw_telemetry(
        &self,
        vehicle_id: String,
        telemetry: RawTelemetry,
    ) -> Result<TelemetryRecord, ErrorObjectOwned>;

    /// Scores the vehicle's current record and updates its wallet.
    #[method(name = "runscoring")]
    async fn run_scoring(&self, vehicle_id: String) -> Result<ScoringReport, ErrorObjectOwned>;

    /// Stores and scores a sample in one transaction.
    #[method(name = "ingest")]
    async fn ingest(
        &self,
        vehicle_id: String,
        telemetry: TelemetryInput,
    ) -> Result<ScoringReport, ErrorObjectOwned>;

    #[method(name = "getwallet")]
    async fn get_wallet(&self, vehicle_id: String) -> Result<WalletJson, ErrorObjectOwned>;

    #[method(name = "gettelemetry")]
    async fn get_telemetry(&self, vehicle_id: String) -> Result<TelemetryRecord, ErrorObjectOwned>;

    /// Returns the report of the vehicle's last scoring cycle.
    #[method(name = "getanalysis")]
    async fn get_analysis(&self, vehicle_id: String) -> Result<ScoringReport, ErrorObjectOwned>;

    /// Returns up to `limit` stored records, newest first.
    #[method(name = "gettelemetryhistory")]
    async fn get_telemetry_history(
        &self,
        vehicle_id: String,
        limit: Option<usize>,
    ) -> Result<Vec<TelemetryRecord>, ErrorObjectOwned>;
}

/// Implementation of the Drivescore JSON-RPC server.
pub struct RpcServerImpl {
    node: Arc<Node>,
}

impl RpcServerImpl {
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }
}

#[async_trait]
impl DriveRpcServer for RpcServerImpl {
    async fn create_wallet(&self, vehicle_id: String) -> Result<WalletJson, ErrorObjectOwned> {
        let wallet = self.node.create_wallet(&vehicle_id).map_err(rpc_error)?;
        Ok(WalletJson { vehicle_id, credits: wallet.credits })
    }

    async fn store_telemetry(
        &self,
        vehicle_id: String,
        telemetry: TelemetryInput,
    ) -> Result<TelemetryRecord, ErrorObjectOwned> {
        self.node.store_telemetry(&vehicle_id, &telemetry).map_err(rpc_error)
    }

    async fn store_raw_telemetry(
        &self,
        vehicle_id: String,
        telemetry: RawTelemetry,
    ) -> Result<TelemetryRecord, ErrorObjectOwned> {
        self.node.store_raw_telemetry(&vehicle_id, &telemetry).map_err(rpc_error)
    }

    async fn run_scoring(&self, vehicle_id: String) -> Result<ScoringReport, ErrorObjectOwned> {
        self.node.run_scoring(&vehicle_id).map_err(rpc_error)
    }

    async fn ingest(
        &self,
        vehicle_id: String,
        telemetry: TelemetryInput,
    ) -> Result<ScoringReport, ErrorObjectOwned> {
        self.node.ingest(&vehicle_id, &telemetry).map_err(rpc_error)
    }

    async fn get_wallet(&self, vehicle_id: String) -> Result<WalletJson, ErrorObjectOwned> {
        let wallet = self.node.get_wallet(&vehicle_id).map_err(rpc_error)?;
        Ok(WalletJson { vehicle_id, credits: wallet.credits })
    }

    async fn get_telemetry(&self, vehicle_id: String) -> Result<TelemetryRecord, ErrorObjectOwned> {
        self.node.get_telemetry(&vehicle_id).map_err(rpc_error)
    }

    async fn get_analysis(&self, vehicle_id: String) -> Result<ScoringReport, ErrorObjectOwned> {
        self.node.get_analysis(&vehicle_id).map_err(rpc_error)
    }

    async fn get_telemetry_history(
        &self,
        vehicle_id: String,
        limit: Option<usize>,
    ) -> Result<Vec<TelemetryRecord>, ErrorObjectOwned> {
        self.node
            .get_telemetry_history(&vehicle_id, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .map_err(rpc_error)
    }
}

/// Start the JSON-RPC server on `addr`.
///
/// Returns the bound address (useful with port 0) and a [`ServerHandle`]
/// that stops the server.
pub async fn start_rpc_server(
    addr: &str,
    node: Arc<Node>,
) -> Result<(SocketAddr, ServerHandle), NodeError> {
    let server = Server::builder()
        .build(addr)
        .await
        .map_err(|e| NodeError::Rpc(e.to_string()))?;
    let local = server.local_addr().map_err(|e| NodeError::Rpc(e.to_string()))?;

    let handle = server.start(RpcServerImpl::new(node).into_rpc());
    Ok((local, handle))
}
