//! The vehicle contract: every operation a client can invoke.
//!
//! Each method runs against one [`LedgerStub`] (one transaction). Writing
//! methods only stage writes; the host commits them, or drops them on error.

use tracing::debug;

use crate::bearing::bearing_rad;
use crate::config::ScoringConfig;
use crate::error::{DriveError, InputError};
use crate::scoring::{self, ScoringReport};
use crate::traits::LedgerStub;
use crate::types::{RawTelemetry, TelemetryInput, TelemetryRecord, VehicleWallet};
use crate::wallet;
use crate::window::{self, Window, WindowBound};

/// Reject ids that cannot be used as a ledger key or composite key component.
pub fn validate_vehicle_id(vehicle_id: &str) -> Result<(), InputError> {
    if vehicle_id.trim().is_empty() {
        return Err(InputError::EmptyVehicleId);
    }
    if vehicle_id.contains('\u{0}') {
        return Err(InputError::InvalidCompositeKeyPart(vehicle_id.to_string()));
    }
    Ok(())
}

/// Telemetry ingestion, wallet management, and scoring for vehicles.
#[derive(Debug, Clone, Default)]
pub struct VehicleContract {
    config: ScoringConfig,
}

impl VehicleContract {
    /// Create a contract with validated scoring knobs.
    pub fn new(config: ScoringConfig) -> Result<Self, DriveError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Store a telemetry sample, deriving its heading from the previous fix.
    ///
    /// The first record of a vehicle gets `direction = 0` and `sequence = 1`;
    /// each later record continues the sequence.
    pub fn store_telemetry<L: LedgerStub + ?Sized>(
        &self,
        stub: &mut L,
        vehicle_id: &str,
        input: &TelemetryInput,
    ) -> Result<TelemetryRecord, DriveError> {
        validate_vehicle_id(vehicle_id)?;
        input.validate()?;

        let (direction, sequence) = match stub.get_state(vehicle_id)? {
            Some(bytes) => {
                let previous = TelemetryRecord::from_bytes(&bytes)?;
                let direction = bearing_rad(
                    previous.latitude,
                    previous.longitude,
                    input.latitude,
                    input.longitude,
                )?;
                (direction, previous.sequence + 1)
            }
            None => (0.0, 1),
        };
        debug!(vehicle = vehicle_id, direction, sequence, "derived heading");

        let record = TelemetryRecord { sequence, ..TelemetryRecord::from_input(input, direction) };
        stub.put_state(vehicle_id, record.to_bytes()?)?;
        Ok(record)
    }

    /// [`store_telemetry`](Self::store_telemetry) for numeric-string input.
    pub fn store_raw_telemetry<L: LedgerStub + ?Sized>(
        &self,
        stub: &mut L,
        vehicle_id: &str,
        raw: &RawTelemetry,
    ) -> Result<TelemetryRecord, DriveError> {
        let input = raw.parse()?;
        self.store_telemetry(stub, vehicle_id, &input)
    }

    /// Create the vehicle's wallet with zero credits. Rejects re-creation.
    pub fn create_wallet<L: LedgerStub + ?Sized>(
        &self,
        stub: &mut L,
        vehicle_id: &str,
    ) -> Result<VehicleWallet, DriveError> {
        validate_vehicle_id(vehicle_id)?;
        wallet::create_wallet(stub, vehicle_id)
    }

    /// Score the vehicle's current record and apply the cycle's delta.
    pub fn run_scoring<L: LedgerStub + ?Sized>(
        &self,
        stub: &mut L,
        vehicle_id: &str,
    ) -> Result<ScoringReport, DriveError> {
        validate_vehicle_id(vehicle_id)?;
        scoring::run_scoring(stub, vehicle_id, &self.config)
    }

    /// Store a sample and score it in the same transaction.
    pub fn ingest<L: LedgerStub + ?Sized>(
        &self,
        stub: &mut L,
        vehicle_id: &str,
        input: &TelemetryInput,
    ) -> Result<ScoringReport, DriveError> {
        self.store_telemetry(stub, vehicle_id, input)?;
        scoring::run_scoring(stub, vehicle_id, &self.config)
    }

    pub fn get_wallet<L: LedgerStub + ?Sized>(
        &self,
        stub: &L,
        vehicle_id: &str,
    ) -> Result<VehicleWallet, DriveError> {
        validate_vehicle_id(vehicle_id)?;
        wallet::get_wallet(stub, vehicle_id)
    }

    pub fn get_telemetry<L: LedgerStub + ?Sized>(
        &self,
        stub: &L,
        vehicle_id: &str,
    ) -> Result<TelemetryRecord, DriveError> {
        validate_vehicle_id(vehicle_id)?;
        let bytes = stub
            .get_state(vehicle_id)?
            .ok_or_else(|| DriveError::TelemetryNotFound(vehicle_id.to_string()))?;
        TelemetryRecord::from_bytes(&bytes)
    }

    /// Report of the last scoring cycle run for the vehicle.
    ///
    /// # Errors
    ///
    /// - [`DriveError::AnalysisNotFound`] if the vehicle was never scored
    pub fn get_analysis<L: LedgerStub + ?Sized>(
        &self,
        stub: &L,
        vehicle_id: &str,
    ) -> Result<ScoringReport, DriveError> {
        validate_vehicle_id(vehicle_id)?;
        scoring::last_report(stub, vehicle_id)?
            .ok_or_else(|| DriveError::AnalysisNotFound(vehicle_id.to_string()))
    }

    /// Up to `limit` decodable records, newest first.
    pub fn get_telemetry_history<L: LedgerStub + ?Sized>(
        &self,
        stub: &L,
        vehicle_id: &str,
        limit: usize,
    ) -> Result<Vec<TelemetryRecord>, DriveError> {
        validate_vehicle_id(vehicle_id)?;
        let history = window::recent_history(stub, vehicle_id, &[WindowBound::Count(limit)])?;
        let window = Window::from_history(vehicle_id, &history, WindowBound::Count(limit));
        Ok(window.records().iter().rev().copied().collect())
    }
}
