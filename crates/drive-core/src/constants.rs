//! Engine constants. Speeds in km/h, angles in radians, times in Unix seconds.

/// Namespace for wallet composite keys, keeping them apart from raw telemetry keys.
pub const WALLET_NAMESPACE: &str = "WALLET";

/// Namespace for the last scoring report of each vehicle.
pub const ANALYSIS_NAMESPACE: &str = "ANALYSIS";

/// Records per windowed evaluation; ingestion callers raise `window_flag` once per this many records.
pub const WINDOW_RECORD_COUNT: usize = 10;

/// Maximum age (seconds, relative to the newest record) of a sample in a time-span window.
pub const WINDOW_SPAN_SECS: u64 = 300;

/// Speed change over a window above which acceleration is anomalous.
pub const ACCEL_DELTA_THRESHOLD_KMH: f64 = 30.0;

/// Lateral acceleration magnitude a zigzag step must exceed, in sensor units.
pub const ZIGZAG_LATERAL_THRESHOLD: f64 = 0.008;

/// Qualifying zigzag steps needed to flag lane weaving.
pub const ZIGZAG_TRIGGER_COUNT: usize = 3;

/// Heading above which a fast record counts as a sharp turn.
pub const STEERING_THRESHOLD_RAD: f64 = 0.7;

/// Speed above which a sharp heading is penalised.
pub const SHARP_TURN_SPEED_KMH: f64 = 30.0;

pub const ACCEL_PENALTY: i64 = -50;
pub const ZIGZAG_PENALTY: i64 = -40;
pub const SHARP_TURN_PENALTY: i64 = -30;

/// Credit granted by any detector that does not trigger.
pub const NEUTRAL_REWARD: i64 = 10;

/// Current telemetry record schema version.
pub const TELEMETRY_SCHEMA_VERSION: u16 = 1;

/// Default JSON-RPC port of the node.
pub const DEFAULT_RPC_PORT: u16 = 18442;
