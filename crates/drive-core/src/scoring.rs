//! Scoring orchestrator: one evaluation cycle per ingested record.
//!
//! A cycle always judges the current record for a sharp turn. When the
//! record carries the window flag it also reads the vehicle's history once
//! and runs the two windowed detectors. All deltas of the cycle are summed
//! into a single wallet mutation.
//!
//! Every input comes from the ledger at call time, so re-running a cycle
//! after a commit conflict sees exactly the state the retry commits against.
//!
//! The report of the last cycle is kept under `\0ANALYSIS\0<vehicle>\0`.
//! A record whose sequence already has a report is never scored again.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ScoringConfig;
use crate::constants::ANALYSIS_NAMESPACE;
use crate::detectors::{self, DetectorKind, Verdict};
use crate::error::{DriveError, InputError};
use crate::traits::LedgerStub;
use crate::types::{HistoryEntry, TelemetryRecord};
use crate::wallet;
use crate::window::{self, Window, WindowBound};

/// Verdicts of one cycle, before they touch the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleVerdicts {
    pub sharp_turn: Verdict,
    /// `None` when the windowed detectors did not run this cycle.
    pub acceleration: Option<Verdict>,
    pub zigzag: Option<Verdict>,
}

impl CycleVerdicts {
    /// Sum of every delta produced this cycle.
    pub fn total_delta(&self) -> Result<i64, InputError> {
        self.iter().try_fold(0i64, |acc, (_, v)| {
            acc.checked_add(v.delta)
                .ok_or(InputError::CreditOverflow { balance: acc, delta: v.delta })
        })
    }

    /// Verdicts that ran, tagged by detector.
    pub fn iter(&self) -> impl Iterator<Item = (DetectorKind, Verdict)> {
        [
            Some((DetectorKind::SharpTurn, self.sharp_turn)),
            self.acceleration.map(|v| (DetectorKind::AnomalousAcceleration, v)),
            self.zigzag.map(|v| (DetectorKind::Zigzag, v)),
        ]
        .into_iter()
        .flatten()
    }

    /// Detectors that flagged behaviour this cycle.
    pub fn triggered(&self) -> Vec<DetectorKind> {
        self.iter().filter(|(_, v)| v.triggered).map(|(k, _)| k).collect()
    }
}

/// Result of a committed-or-committable scoring cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringReport {
    pub vehicle_id: String,
    /// Timestamp of the record that was scored.
    pub timestamp: i64,
    /// Sequence of the record that was scored.
    #[serde(default)]
    pub sequence: u64,
    pub verdicts: CycleVerdicts,
    pub total_delta: i64,
    /// Wallet balance after the delta.
    pub credits: i64,
}

impl ScoringReport {
    pub fn to_bytes(&self) -> Result<Vec<u8>, DriveError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DriveError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Ledger key of `vehicle_id`'s last scoring report.
pub fn analysis_key<L: LedgerStub + ?Sized>(stub: &L, vehicle_id: &str) -> Result<String, DriveError> {
    stub.create_composite_key(ANALYSIS_NAMESPACE, &[vehicle_id])
}

/// The last report stored for `vehicle_id`, if it was ever scored.
pub fn last_report<L: LedgerStub + ?Sized>(
    stub: &L,
    vehicle_id: &str,
) -> Result<Option<ScoringReport>, DriveError> {
    let key = analysis_key(stub, vehicle_id)?;
    stub.get_state(&key)?.map(|bytes| ScoringReport::from_bytes(&bytes)).transpose()
}

/// Judge `current` against `history` without touching the ledger.
///
/// `history` is only consulted when `current.window_flag` is set.
pub fn evaluate(
    vehicle_id: &str,
    current: &TelemetryRecord,
    history: &[HistoryEntry],
    cfg: &ScoringConfig,
) -> CycleVerdicts {
    let sharp_turn = detectors::sharp_turn(current, cfg);
    if !current.window_flag {
        return CycleVerdicts { sharp_turn, acceleration: None, zigzag: None };
    }

    let span = Window::from_history(vehicle_id, history, WindowBound::Span(cfg.window_span_secs));
    let count = Window::from_history(vehicle_id, history, WindowBound::Count(cfg.window_records));
    CycleVerdicts {
        sharp_turn,
        acceleration: Some(detectors::anomalous_acceleration(&span, cfg)),
        zigzag: Some(detectors::zigzag(&count, cfg)),
    }
}

/// Run one scoring cycle for `vehicle_id`'s current record and apply the
/// summed delta to its wallet through `stub`.
///
/// If the current record was already scored, the stored report is returned
/// and nothing is written.
///
/// # Errors
///
/// - [`DriveError::TelemetryNotFound`] if the vehicle has no record
/// - [`DriveError::WalletNotFound`] if the vehicle has no wallet
/// - any decode or ledger error on the current record or wallet
pub fn run_scoring<L: LedgerStub + ?Sized>(
    stub: &mut L,
    vehicle_id: &str,
    cfg: &ScoringConfig,
) -> Result<ScoringReport, DriveError> {
    let bytes = stub
        .get_state(vehicle_id)?
        .ok_or_else(|| DriveError::TelemetryNotFound(vehicle_id.to_string()))?;
    let current = TelemetryRecord::from_bytes(&bytes)?;

    if let Some(last) = last_report(stub, vehicle_id)? {
        if last.sequence == current.sequence {
            debug!(vehicle = vehicle_id, sequence = current.sequence, "record already scored");
            return Ok(last);
        }
    }

    let history = if current.window_flag {
        let bounds = [WindowBound::Span(cfg.window_span_secs), WindowBound::Count(cfg.window_records)];
        window::recent_history(stub, vehicle_id, &bounds)?
    } else {
        Vec::new()
    };

    let verdicts = evaluate(vehicle_id, &current, &history, cfg);
    let total_delta = verdicts.total_delta()?;
    let wallet = wallet::apply_delta(stub, vehicle_id, total_delta)?;

    info!(
        vehicle = vehicle_id,
        timestamp = current.timestamp,
        sequence = current.sequence,
        sharp_turn = verdicts.sharp_turn.triggered,
        acceleration = ?verdicts.acceleration.map(|v| v.triggered),
        zigzag = ?verdicts.zigzag.map(|v| v.triggered),
        total_delta,
        credits = wallet.credits,
        "scoring cycle"
    );

    let report = ScoringReport {
        vehicle_id: vehicle_id.to_string(),
        timestamp: current.timestamp,
        sequence: current.sequence,
        verdicts,
        total_delta,
        credits: wallet.credits,
    };
    let key = analysis_key(stub, vehicle_id)?;
    stub.put_state(&key, report.to_bytes()?)?;
    Ok(report)
}
