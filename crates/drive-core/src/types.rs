//! Core record types: telemetry snapshots, vehicle wallets, and ledger history entries.
//!
//! Both persisted types are stored as JSON blobs. Field names on the wire are
//! camelCase and fixed by [`TELEMETRY_SCHEMA_VERSION`]; every numeric field is
//! typed, so a record that decodes is a record whose numbers parse.

use serde::{Deserialize, Serialize};

use crate::constants::TELEMETRY_SCHEMA_VERSION;
use crate::error::{DriveError, InputError};

fn default_schema() -> u16 {
    TELEMETRY_SCHEMA_VERSION
}

/// Caller-supplied fields of one telemetry sample.
///
/// `direction` is absent: it is derived from the previous stored fix when
/// the sample is written.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryInput {
    /// Unix seconds.
    pub timestamp: i64,
    /// Decimal degrees, `-90..=90`.
    pub latitude: f64,
    /// Decimal degrees, `-180..=180`.
    pub longitude: f64,
    /// km/h, non-negative.
    pub speed: f64,
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    /// Raised by the caller once per window to run the windowed detectors.
    pub window_flag: bool,
}

impl TelemetryInput {
    /// Check coordinate ranges, finiteness, and speed sign.
    pub fn validate(&self) -> Result<(), InputError> {
        check_coordinates(self.latitude, self.longitude)?;
        for (field, value) in [
            ("speed", self.speed),
            ("accelX", self.accel_x),
            ("accelY", self.accel_y),
            ("accelZ", self.accel_z),
        ] {
            if !value.is_finite() {
                return Err(InputError::NonFinite { field });
            }
        }
        if self.speed < 0.0 {
            return Err(InputError::NegativeSpeed(self.speed));
        }
        Ok(())
    }
}

/// Validate a latitude/longitude pair in decimal degrees.
pub fn check_coordinates(latitude: f64, longitude: f64) -> Result<(), InputError> {
    if !latitude.is_finite() {
        return Err(InputError::NonFinite { field: "latitude" });
    }
    if !longitude.is_finite() {
        return Err(InputError::NonFinite { field: "longitude" });
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(InputError::InvalidCoordinate { field: "latitude", value: latitude });
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(InputError::InvalidCoordinate { field: "longitude", value: longitude });
    }
    Ok(())
}

/// Telemetry sample as numeric strings, the shape ingestion clients send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTelemetry {
    pub timestamp: String,
    pub latitude: String,
    pub longitude: String,
    pub speed: String,
    pub accel_x: String,
    pub accel_y: String,
    pub accel_z: String,
    pub window_flag: String,
}

impl RawTelemetry {
    /// Parse every field, failing on the first malformed one.
    ///
    /// `window_flag` accepts `true`/`false` (case-insensitive) and treats an
    /// empty string as `false`.
    pub fn parse(&self) -> Result<TelemetryInput, InputError> {
        let timestamp = self
            .timestamp
            .trim()
            .parse::<i64>()
            .map_err(|_| malformed("timestamp", &self.timestamp))?;
        let window_flag = match self.window_flag.trim().to_ascii_lowercase().as_str() {
            "" | "false" => false,
            "true" => true,
            _ => return Err(malformed("windowFlag", &self.window_flag)),
        };
        let input = TelemetryInput {
            timestamp,
            latitude: parse_f64("latitude", &self.latitude)?,
            longitude: parse_f64("longitude", &self.longitude)?,
            speed: parse_f64("speed", &self.speed)?,
            accel_x: parse_f64("accelX", &self.accel_x)?,
            accel_y: parse_f64("accelY", &self.accel_y)?,
            accel_z: parse_f64("accelZ", &self.accel_z)?,
            window_flag,
        };
        input.validate()?;
        Ok(input)
    }
}

fn parse_f64(field: &'static str, raw: &str) -> Result<f64, InputError> {
    raw.trim().parse::<f64>().map_err(|_| malformed(field, raw))
}

fn malformed(field: &'static str, raw: &str) -> InputError {
    InputError::Malformed { field, value: raw.to_string() }
}

/// One stored telemetry snapshot for a vehicle.
///
/// Keyed by the raw vehicle id. Only the latest version is addressable by a
/// direct read; earlier versions stay in the key's history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    #[serde(default = "default_schema")]
    pub schema: u16,
    pub latitude: f64,
    pub longitude: f64,
    /// km/h.
    pub speed: f64,
    /// Bearing from the previous fix, radians in `[0, 2π)`; `0` for a vehicle's first record.
    pub direction: f64,
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    /// Unix seconds.
    pub timestamp: i64,
    pub window_flag: bool,
    /// Per-vehicle ordinal, `1` for the first stored record.
    #[serde(default)]
    pub sequence: u64,
}

impl TelemetryRecord {
    /// Build a record from validated input and a derived bearing.
    pub fn from_input(input: &TelemetryInput, direction: f64) -> Self {
        Self {
            schema: TELEMETRY_SCHEMA_VERSION,
            latitude: input.latitude,
            longitude: input.longitude,
            speed: input.speed,
            direction,
            accel_x: input.accel_x,
            accel_y: input.accel_y,
            accel_z: input.accel_z,
            timestamp: input.timestamp,
            window_flag: input.window_flag,
            sequence: 0,
        }
    }

    /// Encode as the JSON blob stored on the ledger.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DriveError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a stored JSON blob, rejecting unknown schema versions and
    /// out-of-range values.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DriveError> {
        let record: Self = serde_json::from_slice(bytes)?;
        if record.schema != TELEMETRY_SCHEMA_VERSION {
            return Err(InputError::Malformed {
                field: "schema",
                value: record.schema.to_string(),
            }
            .into());
        }
        record.check_values()?;
        Ok(record)
    }

    /// Range and finiteness checks applied to every decoded record.
    pub fn check_values(&self) -> Result<(), InputError> {
        check_coordinates(self.latitude, self.longitude)?;
        if !self.speed.is_finite() {
            return Err(InputError::NonFinite { field: "speed" });
        }
        if self.speed < 0.0 {
            return Err(InputError::NegativeSpeed(self.speed));
        }
        if !self.direction.is_finite() {
            return Err(InputError::NonFinite { field: "direction" });
        }
        Ok(())
    }
}

/// Credit balance of one vehicle, keyed by the `WALLET` composite key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleWallet {
    pub credits: i64,
}

impl VehicleWallet {
    pub fn to_bytes(&self) -> Result<Vec<u8>, DriveError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DriveError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// One historical version of a ledger key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Stored bytes at that version.
    pub value: Vec<u8>,
    /// Logical commit time at which the version was recorded; larger is newer.
    pub recorded_at: u64,
}
