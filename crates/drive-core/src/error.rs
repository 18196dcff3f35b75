//! Error types for the Drivescore engine.
use thiserror::Error;

/// Validation failures on caller-supplied or stored values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("invalid coordinate: {field} = {value}")] InvalidCoordinate { field: &'static str, value: f64 },
    #[error("non-finite value in {field}")] NonFinite { field: &'static str },
    #[error("negative speed: {0}")] NegativeSpeed(f64),
    #[error("malformed {field}: {value:?}")] Malformed { field: &'static str, value: String },
    #[error("empty vehicle id")] EmptyVehicleId,
    #[error("invalid composite key part: {0:?}")] InvalidCompositeKeyPart(String),
    #[error("credit overflow: balance {balance}, delta {delta}")] CreditOverflow { balance: i64, delta: i64 },
    #[error("invalid scoring config: {0}")] InvalidConfig(String),
}

/// Umbrella error returned by every contract operation.
///
/// `Conflict` is the only variant a caller should retry; the engine itself
/// never retries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriveError {
    #[error("telemetry not found for vehicle {0}")] TelemetryNotFound(String),
    #[error("wallet not found for vehicle {0}")] WalletNotFound(String),
    #[error("no scoring analysis for vehicle {0}")] AnalysisNotFound(String),
    #[error("wallet already exists for vehicle {0}")] AlreadyExists(String),
    #[error(transparent)] InvalidInput(#[from] InputError),
    #[error("serialization: {0}")] Serialization(String),
    #[error("ledger: {0}")] Upstream(String),
    #[error("read conflict on key {0:?}")] Conflict(String),
}

impl DriveError {
    /// Whether this error reports a missing telemetry record, wallet or analysis.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::TelemetryNotFound(_) | Self::WalletNotFound(_) | Self::AnalysisNotFound(_)
        )
    }

    /// Whether re-running the same call against fresh ledger state may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<serde_json::Error> for DriveError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
