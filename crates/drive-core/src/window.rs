//! Bounded slices of a vehicle's telemetry history.
//!
//! History entries are oriented newest-first by `recorded_at` before any
//! bound is applied, so the result does not depend on the order the host
//! returns them in. Entries that fail to decode are skipped with a warning;
//! they never abort the window and never count toward its bound.

use tracing::{debug, warn};

use crate::error::DriveError;
use crate::traits::LedgerStub;
use crate::types::{HistoryEntry, TelemetryRecord};

/// How far back a window reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowBound {
    /// The newest `n` decodable records.
    Count(usize),
    /// Records no more than this many seconds older than the newest record.
    Span(u64),
}

/// Telemetry records ordered oldest to newest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Window {
    records: Vec<TelemetryRecord>,
    skipped: usize,
}

impl Window {
    /// Build a window from raw history entries.
    ///
    /// `vehicle_id` is only used for diagnostics.
    pub fn from_history(vehicle_id: &str, history: &[HistoryEntry], bound: WindowBound) -> Self {
        let mut ordered: Vec<&HistoryEntry> = history.iter().collect();
        ordered.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));

        let mut newest_first: Vec<TelemetryRecord> = Vec::new();
        let mut skipped = 0usize;

        for entry in ordered {
            if let WindowBound::Count(n) = bound {
                if newest_first.len() >= n {
                    break;
                }
            }

            let record = match TelemetryRecord::from_bytes(&entry.value) {
                Ok(r) => r,
                Err(e) => {
                    warn!(
                        vehicle = vehicle_id,
                        recorded_at = entry.recorded_at,
                        error = %e,
                        "skipping malformed telemetry sample"
                    );
                    skipped += 1;
                    continue;
                }
            };

            if let WindowBound::Span(secs) = bound {
                if let Some(newest) = newest_first.first() {
                    let age = newest.timestamp.saturating_sub(record.timestamp);
                    if age > secs.min(i64::MAX as u64) as i64 {
                        break;
                    }
                }
            }

            newest_first.push(record);
        }

        newest_first.reverse();
        Self { records: newest_first, skipped }
    }

    pub fn records(&self) -> &[TelemetryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn oldest(&self) -> Option<&TelemetryRecord> {
        self.records.first()
    }

    pub fn newest(&self) -> Option<&TelemetryRecord> {
        self.records.last()
    }

    /// History entries dropped because they failed to decode.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Seconds between the oldest and newest record, or `0` for fewer than two.
    pub fn span_secs(&self) -> i64 {
        match (self.oldest(), self.newest()) {
            (Some(first), Some(last)) => last.timestamp.saturating_sub(first.timestamp),
            _ => 0,
        }
    }
}

/// Newest-first history entries of `key`, read only as far back as every
/// bound in `bounds` needs.
///
/// `Count(n)` is met once `n` decodable records were seen; `Span(s)` once a
/// decodable record more than `s` seconds older than the newest one was seen.
/// Cutting any of `bounds` from the result gives the same window as cutting
/// it from the full history.
pub fn recent_history<L: LedgerStub + ?Sized>(
    stub: &L,
    key: &str,
    bounds: &[WindowBound],
) -> Result<Vec<HistoryEntry>, DriveError> {
    let mut entries = Vec::new();
    let mut decoded = 0usize;
    let mut newest: Option<i64> = None;
    let mut oldest_age = 0i64;

    stub.scan_history_for_key(key, &mut |entry| {
        if let Ok(record) = TelemetryRecord::from_bytes(&entry.value) {
            decoded += 1;
            let top = *newest.get_or_insert(record.timestamp);
            oldest_age = oldest_age.max(top.saturating_sub(record.timestamp));
        }
        entries.push(entry);
        !bounds.iter().all(|bound| match *bound {
            WindowBound::Count(n) => decoded >= n,
            WindowBound::Span(secs) => oldest_age > secs.min(i64::MAX as u64) as i64,
        })
    })?;

    debug!(key, entries = entries.len(), ?bounds, "read recent history");
    Ok(entries)
}

/// Read `vehicle_id`'s history through `stub` and cut a window from it.
///
/// An empty history yields an empty window, not an error.
pub fn collect_window<L: LedgerStub + ?Sized>(
    stub: &L,
    vehicle_id: &str,
    bound: WindowBound,
) -> Result<Window, DriveError> {
    let history = recent_history(stub, vehicle_id, &[bound])?;
    Ok(Window::from_history(vehicle_id, &history, bound))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{MemoryStore, Transaction};
    use crate::types::TelemetryInput;

    fn record(timestamp: i64, speed: f64) -> TelemetryRecord {
        TelemetryRecord::from_input(
            &TelemetryInput {
                timestamp,
                latitude: 0.0,
                longitude: 0.0,
                speed,
                accel_x: 0.0,
                accel_y: 0.0,
                accel_z: 0.0,
                window_flag: false,
            },
            0.0,
        )
    }

    fn entry(recorded_at: u64, r: &TelemetryRecord) -> HistoryEntry {
        HistoryEntry { value: r.to_bytes().unwrap(), recorded_at }
    }

    fn speeds(w: &Window) -> Vec<f64> {
        w.records().iter().map(|r| r.speed).collect()
    }

    #[test]
    fn empty_history_gives_empty_window() {
        let w = Window::from_history("V", &[], WindowBound::Count(10));
        assert!(w.is_empty());
        assert_eq!(w.span_secs(), 0);
    }

    #[test]
    fn count_bound_keeps_newest_oldest_first() {
        let history: Vec<_> = (1..=15).map(|i| entry(i, &record(i as i64, i as f64))).collect();
        let w = Window::from_history("V", &history, WindowBound::Count(10));
        assert_eq!(w.len(), 10);
        assert_eq!(speeds(&w), (6..=15).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn orientation_independent_of_host_order() {
        let mut history: Vec<_> = (1..=5).map(|i| entry(i, &record(i as i64, i as f64))).collect();
        let forward = Window::from_history("V", &history, WindowBound::Count(3));
        history.reverse();
        let backward = Window::from_history("V", &history, WindowBound::Count(3));
        history.swap(0, 3);
        let shuffled = Window::from_history("V", &history, WindowBound::Count(3));
        assert_eq!(forward, backward);
        assert_eq!(forward, shuffled);
        assert_eq!(speeds(&forward), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn fewer_than_bound_uses_what_exists() {
        let history = vec![entry(1, &record(100, 5.0)), entry(2, &record(110, 6.0))];
        let w = Window::from_history("V", &history, WindowBound::Count(10));
        assert_eq!(w.len(), 2);
    }

    #[test]
    fn span_bound_stops_past_limit() {
        let history = vec![
            entry(1, &record(0, 1.0)),
            entry(2, &record(500, 2.0)),
            entry(3, &record(700, 3.0)),
            entry(4, &record(800, 4.0)),
        ];
        let w = Window::from_history("V", &history, WindowBound::Span(300));
        assert_eq!(speeds(&w), vec![2.0, 3.0, 4.0]);
        assert_eq!(w.span_secs(), 300);
    }

    #[test]
    fn span_bound_excludes_just_outside() {
        let history = vec![entry(1, &record(0, 1.0)), entry(2, &record(301, 2.0))];
        let w = Window::from_history("V", &history, WindowBound::Span(300));
        assert_eq!(speeds(&w), vec![2.0]);
    }

    #[test]
    fn malformed_sample_is_skipped_not_counted() {
        let history = vec![
            entry(1, &record(10, 1.0)),
            HistoryEntry { value: b"{not json".to_vec(), recorded_at: 2 },
            entry(3, &record(30, 3.0)),
            HistoryEntry {
                value: br#"{"latitude":"x","longitude":0,"speed":1}"#.to_vec(),
                recorded_at: 4,
            },
        ];
        let w = Window::from_history("V", &history, WindowBound::Count(2));
        assert_eq!(speeds(&w), vec![1.0, 3.0]);
        assert_eq!(w.skipped(), 2);
    }

    fn commit_records(store: &MemoryStore, key: &str, records: &[TelemetryRecord]) {
        for r in records {
            let mut tx = Transaction::begin(store);
            tx.put_state(key, r.to_bytes().unwrap()).unwrap();
            tx.commit().unwrap();
        }
    }

    #[test]
    fn recent_history_stops_at_count() {
        let store = MemoryStore::new();
        let records: Vec<_> = (0..50).map(|i| record(i, i as f64)).collect();
        commit_records(&store, "V", &records);

        let tx = Transaction::begin(&store);
        let entries = recent_history(&tx, "V", &[WindowBound::Count(10)]).unwrap();
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[0].recorded_at, 50);
    }

    #[test]
    fn recent_history_reads_one_past_span() {
        let store = MemoryStore::new();
        let records: Vec<_> = (0..100).map(|i| record(i * 60, 1.0)).collect();
        commit_records(&store, "V", &records);

        let tx = Transaction::begin(&store);
        let entries = recent_history(&tx, "V", &[WindowBound::Span(300)]).unwrap();
        // 0..=300 s back plus the first record past the bound.
        assert_eq!(entries.len(), 7);
        let w = Window::from_history("V", &entries, WindowBound::Span(300));
        assert_eq!(w.len(), 6);
    }

    #[test]
    fn bounded_read_matches_full_history() {
        let store = MemoryStore::new();
        let mut records: Vec<_> = (0..40).map(|i| record(i * 25, i as f64)).collect();
        records[35].latitude = 200.0;
        commit_records(&store, "V", &records);
        let mut tx = Transaction::begin(&store);
        tx.put_state("V", b"{broken".to_vec()).unwrap();

        let full = tx.get_history_for_key("V").unwrap();
        let bounds = [WindowBound::Span(300), WindowBound::Count(10)];
        let recent = recent_history(&tx, "V", &bounds).unwrap();
        assert!(recent.len() < full.len());
        for bound in bounds {
            assert_eq!(
                Window::from_history("V", &recent, bound),
                Window::from_history("V", &full, bound)
            );
        }
    }

    #[test]
    fn collect_window_reads_through_stub() {
        let store = MemoryStore::new();
        for i in 0..4 {
            let mut tx = Transaction::begin(&store);
            tx.put_state("ABC", record(i * 10, i as f64).to_bytes().unwrap()).unwrap();
            tx.commit().unwrap();
        }
        let tx = Transaction::begin(&store);
        let w = collect_window(&tx, "ABC", WindowBound::Count(10)).unwrap();
        assert_eq!(speeds(&w), vec![0.0, 1.0, 2.0, 3.0]);
        assert!(collect_window(&tx, "NOPE", WindowBound::Span(300)).unwrap().is_empty());
    }
}
