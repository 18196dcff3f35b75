//! Shared test helpers for E2E and property tests.

use std::sync::Arc;

use drive_core::contract::VehicleContract;
use drive_core::ledger::MemoryStore;
use drive_core::types::{HistoryEntry, TelemetryInput, TelemetryRecord};
use drive_core::window::{Window, WindowBound};
use drive_node_lib::config::NodeConfig;
use drive_node_lib::node::Node;

/// Vehicle used by the reference scenario.
pub const VEHICLE: &str = "ABC1234";

/// Sample at a fixed position with neutral accelerometer readings.
pub fn sample(timestamp: i64, speed: f64, window_flag: bool) -> TelemetryInput {
    TelemetryInput {
        timestamp,
        latitude: -22.9068,
        longitude: -43.1729,
        speed,
        accel_x: 0.0,
        accel_y: 0.0,
        accel_z: 1.0,
        window_flag,
    }
}

/// `n` samples one second apart at `speed`, flagged on every 10th.
pub fn steady_drive(n: usize, speed: f64) -> Vec<TelemetryInput> {
    (0..n)
        .map(|i| sample(1_700_000_000 + i as i64, speed, (i + 1) % 10 == 0))
        .collect()
}

/// Node over a fresh in-memory store.
pub fn memory_node() -> Arc<Node> {
    Arc::new(Node::with_store(Arc::new(MemoryStore::new()), VehicleContract::default()))
}

/// Node over a RocksDB ledger in a temp directory.
pub fn rocks_node() -> (Arc<Node>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig {
        data_dir: dir.path().to_path_buf(),
        ..NodeConfig::default()
    };
    let node = Node::open(&config).unwrap();
    (node, dir)
}

/// Build a record directly, bypassing bearing derivation.
pub fn record(speed: f64, accel_y: f64, accel_z: f64, direction: f64) -> TelemetryRecord {
    let input = TelemetryInput { accel_y, accel_z, ..sample(0, speed, false) };
    TelemetryRecord::from_input(&input, direction)
}

/// Count window over `records`, oldest first, holding all of them.
pub fn window_of(records: &[TelemetryRecord]) -> Window {
    let history: Vec<HistoryEntry> = records
        .iter()
        .enumerate()
        .map(|(i, r)| HistoryEntry {
            value: r.to_bytes().unwrap(),
            recorded_at: i as u64 + 1,
        })
        .collect();
    Window::from_history(VEHICLE, &history, WindowBound::Count(records.len().max(1)))
}
