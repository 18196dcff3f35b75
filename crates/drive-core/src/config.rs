//! Tunable detector thresholds and credit deltas.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::InputError;

/// Knobs for the window collector and the three behaviour detectors.
///
/// Defaults reproduce the production thresholds in [`crate::constants`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Records in a count-bounded window (zigzag).
    pub window_records: usize,
    /// Seconds covered by a time-bounded window (acceleration).
    pub window_span_secs: u64,
    pub accel_delta_kmh: f64,
    pub zigzag_lateral_threshold: f64,
    pub zigzag_trigger_count: usize,
    pub steering_threshold_rad: f64,
    pub sharp_turn_speed_kmh: f64,
    pub accel_penalty: i64,
    pub zigzag_penalty: i64,
    pub sharp_turn_penalty: i64,
    pub neutral_reward: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            window_records: WINDOW_RECORD_COUNT,
            window_span_secs: WINDOW_SPAN_SECS,
            accel_delta_kmh: ACCEL_DELTA_THRESHOLD_KMH,
            zigzag_lateral_threshold: ZIGZAG_LATERAL_THRESHOLD,
            zigzag_trigger_count: ZIGZAG_TRIGGER_COUNT,
            steering_threshold_rad: STEERING_THRESHOLD_RAD,
            sharp_turn_speed_kmh: SHARP_TURN_SPEED_KMH,
            accel_penalty: ACCEL_PENALTY,
            zigzag_penalty: ZIGZAG_PENALTY,
            sharp_turn_penalty: SHARP_TURN_PENALTY,
            neutral_reward: NEUTRAL_REWARD,
        }
    }
}

impl ScoringConfig {
    /// Reject configurations under which a detector can never behave sensibly.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.window_records == 0 {
            return Err(InputError::InvalidConfig("window_records must be > 0".into()));
        }
        if self.zigzag_trigger_count == 0 {
            return Err(InputError::InvalidConfig("zigzag_trigger_count must be > 0".into()));
        }
        for (name, value) in [
            ("accel_delta_kmh", self.accel_delta_kmh),
            ("zigzag_lateral_threshold", self.zigzag_lateral_threshold),
            ("steering_threshold_rad", self.steering_threshold_rad),
            ("sharp_turn_speed_kmh", self.sharp_turn_speed_kmh),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(InputError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}
