//! Driving-behaviour detectors.
//!
//! Pure functions of their input window or record: no storage, no IO, no
//! state carried between calls. Each returns a [`Verdict`]: the signed
//! credit delta for this cycle and whether the behaviour was flagged.

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::types::TelemetryRecord;
use crate::window::Window;

/// Outcome of one detector for one scoring cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub delta: i64,
    pub triggered: bool,
}

impl Verdict {
    fn penalty(delta: i64) -> Self {
        Self { delta, triggered: true }
    }

    fn neutral(cfg: &ScoringConfig) -> Self {
        Self { delta: cfg.neutral_reward, triggered: false }
    }
}

/// Which detector produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    AnomalousAcceleration,
    Zigzag,
    SharpTurn,
}

/// Speed change between the oldest and newest record of a time-span window.
///
/// Triggers when `|v_newest - v_oldest| > accel_delta_kmh`. A window with
/// fewer than two records has no speed change to measure and is treated
/// as normal driving.
///
/// # Examples
///
/// ```
/// use drive_core::config::ScoringConfig;
/// use drive_core::detectors::anomalous_acceleration;
/// use drive_core::window::Window;
///
/// let v = anomalous_acceleration(&Window::default(), &ScoringConfig::default());
/// assert_eq!((v.delta, v.triggered), (10, false));
/// ```
pub fn anomalous_acceleration(window: &Window, cfg: &ScoringConfig) -> Verdict {
    if window.len() < 2 {
        return Verdict::neutral(cfg);
    }
    let (Some(first), Some(last)) = (window.oldest(), window.newest()) else {
        return Verdict::neutral(cfg);
    };
    let delta_v = (last.speed - first.speed).abs();
    if delta_v > cfg.accel_delta_kmh {
        Verdict::penalty(cfg.accel_penalty)
    } else {
        Verdict::neutral(cfg)
    }
}

/// Lane-weaving heuristic over a count window, oldest to newest.
///
/// A step between adjacent samples qualifies when the vertical axis changed
/// and the newer sample's lateral magnitude exceeds
/// `zigzag_lateral_threshold`. Triggers at `zigzag_trigger_count` steps.
pub fn zigzag(window: &Window, cfg: &ScoringConfig) -> Verdict {
    let steps = zigzag_steps(window.records(), cfg.zigzag_lateral_threshold);
    if steps >= cfg.zigzag_trigger_count {
        Verdict::penalty(cfg.zigzag_penalty)
    } else {
        Verdict::neutral(cfg)
    }
}

/// Count qualifying zigzag steps in `records` (oldest first).
pub fn zigzag_steps(records: &[TelemetryRecord], lateral_threshold: f64) -> usize {
    records
        .windows(2)
        .filter(|pair| {
            let (prev, next) = (&pair[0], &pair[1]);
            prev.accel_z != next.accel_z && next.accel_y.abs() > lateral_threshold
        })
        .count()
}

/// Sharp turn at speed, judged on the most recent record alone.
///
/// A record with `direction == 0` carries no heading information (first fix
/// or stationary) and is neutral. Otherwise triggers when the heading is
/// above `steering_threshold_rad` and speed above `sharp_turn_speed_kmh`.
pub fn sharp_turn(record: &TelemetryRecord, cfg: &ScoringConfig) -> Verdict {
    if record.direction == 0.0 {
        return Verdict::neutral(cfg);
    }
    if record.direction > cfg.steering_threshold_rad && record.speed > cfg.sharp_turn_speed_kmh {
        Verdict::penalty(cfg.sharp_turn_penalty)
    } else {
        Verdict::neutral(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HistoryEntry, TelemetryInput};
    use crate::window::WindowBound;

    fn rec(speed: f64, accel_y: f64, accel_z: f64) -> TelemetryRecord {
        TelemetryRecord::from_input(
            &TelemetryInput {
                timestamp: 0,
                latitude: 0.0,
                longitude: 0.0,
                speed,
                accel_x: 0.0,
                accel_y,
                accel_z,
                window_flag: false,
            },
            0.0,
        )
    }

    fn window_of(records: &[TelemetryRecord]) -> Window {
        let history: Vec<HistoryEntry> = records
            .iter()
            .enumerate()
            .map(|(i, r)| HistoryEntry {
                value: r.to_bytes().unwrap(),
                recorded_at: i as u64 + 1,
            })
            .collect();
        Window::from_history("T", &history, WindowBound::Count(usize::MAX))
    }

    fn cfg() -> ScoringConfig {
        ScoringConfig::default()
    }

    #[test]
    fn acceleration_single_record_is_neutral() {
        let v = anomalous_acceleration(&window_of(&[rec(100.0, 0.0, 0.0)]), &cfg());
        assert_eq!(v, Verdict { delta: 10, triggered: false });
    }

    #[test]
    fn acceleration_at_threshold_does_not_trigger() {
        let w = window_of(&[rec(20.0, 0.0, 0.0), rec(35.0, 0.0, 0.0), rec(50.0, 0.0, 0.0)]);
        assert!(!anomalous_acceleration(&w, &cfg()).triggered);
    }

    #[test]
    fn acceleration_above_threshold_triggers_either_direction() {
        let up = window_of(&[rec(10.0, 0.0, 0.0), rec(40.5, 0.0, 0.0)]);
        assert_eq!(anomalous_acceleration(&up, &cfg()), Verdict { delta: -50, triggered: true });
        let down = window_of(&[rec(90.0, 0.0, 0.0), rec(50.0, 0.0, 0.0), rec(20.0, 0.0, 0.0)]);
        assert!(anomalous_acceleration(&down, &cfg()).triggered);
    }

    #[test]
    fn acceleration_uses_endpoints_only() {
        // Spike in the middle, endpoints equal.
        let w = window_of(&[rec(20.0, 0.0, 0.0), rec(90.0, 0.0, 0.0), rec(20.0, 0.0, 0.0)]);
        assert!(!anomalous_acceleration(&w, &cfg()).triggered);
    }

    #[test]
    fn zigzag_needs_two_samples() {
        assert_eq!(zigzag(&Window::default(), &cfg()).delta, 10);
        assert!(!zigzag(&window_of(&[rec(0.0, 1.0, 1.0)]), &cfg()).triggered);
    }

    #[test]
    fn zigzag_three_qualifying_steps_trigger() {
        let w = window_of(&[
            rec(50.0, 0.0, 0.9),
            rec(50.0, 0.02, 1.0),
            rec(50.0, -0.03, 0.9),
            rec(50.0, 0.01, 1.1),
        ]);
        assert_eq!(zigzag_steps(w.records(), 0.008), 3);
        assert_eq!(zigzag(&w, &cfg()), Verdict { delta: -40, triggered: true });
    }

    #[test]
    fn zigzag_ignores_small_lateral_or_flat_vertical() {
        let w = window_of(&[
            rec(50.0, 0.0, 0.9),
            rec(50.0, 0.005, 1.0),  // lateral too small
            rec(50.0, 0.05, 1.0),   // vertical unchanged
            rec(50.0, -0.05, 0.95), // qualifies
            rec(50.0, 0.008, 0.9),  // lateral not strictly above
        ]);
        assert_eq!(zigzag_steps(w.records(), 0.008), 1);
        assert!(!zigzag(&w, &cfg()).triggered);
    }

    #[test]
    fn zigzag_threshold_is_configurable() {
        let w = window_of(&[
            rec(50.0, 0.0, 0.9),
            rec(50.0, 0.02, 1.0),
            rec(50.0, -0.03, 0.9),
            rec(50.0, 0.01, 1.1),
        ]);
        let loose = ScoringConfig { zigzag_lateral_threshold: 0.05, ..cfg() };
        assert!(!zigzag(&w, &loose).triggered);
    }

    #[test]
    fn sharp_turn_zero_direction_is_neutral() {
        let r = rec(120.0, 0.0, 0.0);
        assert_eq!(sharp_turn(&r, &cfg()), Verdict { delta: 10, triggered: false });
    }

    #[test]
    fn sharp_turn_fast_and_large_heading_penalised() {
        let mut r = rec(45.0, 0.0, 0.0);
        r.direction = 1.2;
        assert_eq!(sharp_turn(&r, &cfg()), Verdict { delta: -30, triggered: true });
    }

    #[test]
    fn sharp_turn_slow_or_small_heading_is_neutral() {
        let mut slow = rec(25.0, 0.0, 0.0);
        slow.direction = 2.0;
        assert!(!sharp_turn(&slow, &cfg()).triggered);

        let mut gentle = rec(80.0, 0.0, 0.0);
        gentle.direction = 0.3;
        assert!(!sharp_turn(&gentle, &cfg()).triggered);
    }
}
