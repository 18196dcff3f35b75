//! Criterion benchmarks for the scoring hot path.
//!
//! Covers: bearing derivation, window collection from raw history,
//! the three detectors, and a full ingest cycle on the memory store.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use drive_core::bearing::bearing_rad;
use drive_core::config::ScoringConfig;
use drive_core::detectors::{anomalous_acceleration, sharp_turn, zigzag};
use drive_core::ledger::{MemoryStore, Transaction};
use drive_core::scoring::evaluate;
use drive_core::types::{HistoryEntry, TelemetryInput, TelemetryRecord};
use drive_core::window::{Window, WindowBound};
use drive_core::VehicleContract;

fn sample_input(i: u64) -> TelemetryInput {
    TelemetryInput {
        timestamp: 1_700_000_000 + i as i64,
        latitude: -22.9 + i as f64 * 1e-4,
        longitude: -43.2 + i as f64 * 1e-4,
        speed: 40.0 + (i % 7) as f64,
        accel_x: 0.0,
        accel_y: if i % 2 == 0 { 0.02 } else { -0.02 },
        accel_z: 0.9 + (i % 3) as f64 * 0.05,
        window_flag: i % 10 == 9,
    }
}

/// `n` encoded history entries, newest first like the memory store returns them.
fn make_history(n: u64) -> Vec<HistoryEntry> {
    (0..n)
        .rev()
        .map(|i| HistoryEntry {
            value: TelemetryRecord::from_input(&sample_input(i), 0.5)
                .to_bytes()
                .unwrap(),
            recorded_at: i + 1,
        })
        .collect()
}

fn bench_bearing(c: &mut Criterion) {
    c.bench_function("bearing_rad", |b| {
        b.iter(|| bearing_rad(black_box(-22.9), black_box(-43.2), black_box(-22.8), black_box(-43.1)))
    });
}

fn bench_window(c: &mut Criterion) {
    let history_10 = make_history(10);
    let history_1000 = make_history(1000);

    c.bench_function("window_count_10_of_10", |b| {
        b.iter(|| Window::from_history("B", black_box(&history_10), WindowBound::Count(10)))
    });

    c.bench_function("window_span_300s_of_1000", |b| {
        b.iter(|| Window::from_history("B", black_box(&history_1000), WindowBound::Span(300)))
    });
}

fn bench_detectors(c: &mut Criterion) {
    let cfg = ScoringConfig::default();
    let history = make_history(10);
    let window = Window::from_history("B", &history, WindowBound::Count(10));
    let current = TelemetryRecord::from_input(&sample_input(9), 1.0);

    c.bench_function("detector_acceleration", |b| {
        b.iter(|| anomalous_acceleration(black_box(&window), &cfg))
    });
    c.bench_function("detector_zigzag", |b| b.iter(|| zigzag(black_box(&window), &cfg)));
    c.bench_function("detector_sharp_turn", |b| b.iter(|| sharp_turn(black_box(&current), &cfg)));
    c.bench_function("evaluate_flagged_cycle", |b| {
        b.iter(|| evaluate("B", black_box(&current), black_box(&history), &cfg))
    });
}

fn bench_ingest(c: &mut Criterion) {
    let store = MemoryStore::new();
    let contract = VehicleContract::default();
    let mut tx = Transaction::begin(&store);
    contract.create_wallet(&mut tx, "B").unwrap();
    tx.commit().unwrap();

    let mut i = 0u64;
    c.bench_function("ingest_memory_store", |b| {
        b.iter(|| {
            let mut tx = Transaction::begin(&store);
            contract.ingest(&mut tx, "B", &sample_input(i)).unwrap();
            tx.commit().unwrap();
            i += 1;
        })
    });
}

criterion_group!(benches, bench_bearing, bench_window, bench_detectors, bench_ingest);
criterion_main!(benches);
