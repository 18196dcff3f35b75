//! Node composition: a versioned store plus the vehicle contract.
//!
//! Every writing call runs `begin → contract op → commit` on its own
//! [`Transaction`]. A commit that loses a read conflict is re-run from a
//! fresh transaction, up to [`NodeConfig::commit_attempts`] times. Read-only
//! calls never commit.

use std::sync::Arc;

use tracing::{info, warn};

use drive_core::contract::VehicleContract;
use drive_core::error::DriveError;
use drive_core::ledger::Transaction;
use drive_core::scoring::ScoringReport;
use drive_core::traits::VersionedStore;
use drive_core::types::{RawTelemetry, TelemetryInput, TelemetryRecord, VehicleWallet};

use crate::config::{NodeConfig, DEFAULT_COMMIT_ATTEMPTS};
use crate::error::NodeError;
use crate::storage::RocksStore;

/// Transaction type every node call runs in.
pub type NodeTx<'a> = Transaction<'a, dyn VersionedStore>;

/// A ledger node serving one [`VehicleContract`].
pub struct Node {
    store: Arc<dyn VersionedStore>,
    contract: VehicleContract,
    commit_attempts: u32,
}

impl Node {
    /// Open the RocksDB ledger under `config.data_dir` and build the contract.
    pub fn open(config: &NodeConfig) -> Result<Arc<Self>, NodeError> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;
        let store = RocksStore::open(config.db_path())?;
        let contract = VehicleContract::new(config.scoring.clone())?;
        info!(data_dir = %config.data_dir.display(), "node opened");
        Ok(Arc::new(
            Self::with_store(Arc::new(store), contract).with_commit_attempts(config.commit_attempts),
        ))
    }

    /// Node over any store (e.g. `MemoryStore` in tests).
    pub fn with_store(store: Arc<dyn VersionedStore>, contract: VehicleContract) -> Self {
        Self { store, contract, commit_attempts: DEFAULT_COMMIT_ATTEMPTS }
    }

    pub fn with_commit_attempts(mut self, attempts: u32) -> Self {
        self.commit_attempts = attempts.max(1);
        self
    }

    pub fn contract(&self) -> &VehicleContract {
        &self.contract
    }

    /// Run `op` in a fresh transaction and commit its writes.
    ///
    /// On [`DriveError::Conflict`] the whole call is re-run against the
    /// latest state; every other error is returned as-is with nothing applied.
    pub fn execute<T, F>(&self, op: F) -> Result<T, DriveError>
    where
        F: Fn(&VehicleContract, &mut NodeTx<'_>) -> Result<T, DriveError>,
    {
        let mut attempt = 1;
        loop {
            let mut tx = Transaction::begin(&*self.store);
            let out = op(&self.contract, &mut tx)?;
            match tx.commit() {
                Ok(_) => return Ok(out),
                Err(e) if e.is_retryable() && attempt < self.commit_attempts => {
                    warn!(attempt, error = %e, "commit conflict, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run `op` against a transaction that is dropped, never committed.
    pub fn query<T, F>(&self, op: F) -> Result<T, DriveError>
    where
        F: FnOnce(&VehicleContract, &NodeTx<'_>) -> Result<T, DriveError>,
    {
        let tx = Transaction::begin(&*self.store);
        op(&self.contract, &tx)
    }

    // --- Contract operations ---

    pub fn create_wallet(&self, vehicle_id: &str) -> Result<VehicleWallet, DriveError> {
        let wallet = self.execute(|c, tx| c.create_wallet(tx, vehicle_id))?;
        info!(vehicle = vehicle_id, "wallet created");
        Ok(wallet)
    }

    pub fn store_telemetry(
        &self,
        vehicle_id: &str,
        input: &TelemetryInput,
    ) -> Result<TelemetryRecord, DriveError> {
        self.execute(|c, tx| c.store_telemetry(tx, vehicle_id, input))
    }

    pub fn store_raw_telemetry(
        &self,
        vehicle_id: &str,
        raw: &RawTelemetry,
    ) -> Result<TelemetryRecord, DriveError> {
        self.execute(|c, tx| c.store_raw_telemetry(tx, vehicle_id, raw))
    }

    pub fn run_scoring(&self, vehicle_id: &str) -> Result<ScoringReport, DriveError> {
        self.execute(|c, tx| c.run_scoring(tx, vehicle_id))
    }

    /// Store and score one sample atomically.
    pub fn ingest(
        &self,
        vehicle_id: &str,
        input: &TelemetryInput,
    ) -> Result<ScoringReport, DriveError> {
        self.execute(|c, tx| c.ingest(tx, vehicle_id, input))
    }

    pub fn get_wallet(&self, vehicle_id: &str) -> Result<VehicleWallet, DriveError> {
        self.query(|c, tx| c.get_wallet(tx, vehicle_id))
    }

    pub fn get_telemetry(&self, vehicle_id: &str) -> Result<TelemetryRecord, DriveError> {
        self.query(|c, tx| c.get_telemetry(tx, vehicle_id))
    }

    pub fn get_analysis(&self, vehicle_id: &str) -> Result<ScoringReport, DriveError> {
        self.query(|c, tx| c.get_analysis(tx, vehicle_id))
    }

    pub fn get_telemetry_history(
        &self,
        vehicle_id: &str,
        limit: usize,
    ) -> Result<Vec<TelemetryRecord>, DriveError> {
        self.query(|c, tx| c.get_telemetry_history(tx, vehicle_id, limit))
    }
}
