//! drive-cli: command-line client for a Drivescore node.
//!
//! Wallet creation and queries, telemetry and scoring inspection, and replay of an OBD
//! telemetry CSV through the node's `ingest` call.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::HttpClientBuilder;
use jsonrpsee::rpc_params;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use drive_core::constants::{DEFAULT_RPC_PORT, WINDOW_RECORD_COUNT};
use drive_core::scoring::ScoringReport;
use drive_core::types::TelemetryInput;

/// Timestamp layout of the OBD export.
const OBD_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Drivescore command-line client.
#[derive(Parser)]
#[command(name = "drive-cli")]
#[command(version, about = "Drivescore node client")]
struct Cli {
    /// Node JSON-RPC endpoint.
    #[arg(long, global = true, default_value_t = format!("http://127.0.0.1:{DEFAULT_RPC_PORT}"))]
    rpc_endpoint: String,

    /// Log level filter, overridden by `RUST_LOG`.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a zero-credit wallet for a vehicle.
    CreateWallet(VehicleArgs),
    /// Show a vehicle's credit balance.
    Wallet(VehicleArgs),
    /// Show a vehicle's latest telemetry record.
    Telemetry(VehicleArgs),
    /// Show the report of a vehicle's last scoring cycle.
    Analysis(VehicleArgs),
    /// List a vehicle's stored telemetry, newest first.
    History(HistoryArgs),
    /// Replay an OBD telemetry CSV through `ingest`.
    Replay(ReplayArgs),
}

#[derive(Args)]
struct VehicleArgs {
    /// Vehicle identifier (licence plate).
    vehicle: String,
}

#[derive(Args)]
struct HistoryArgs {
    vehicle: String,

    /// Maximum records to return.
    #[arg(short, long, default_value_t = 20)]
    limit: usize,
}

#[derive(Args)]
struct ReplayArgs {
    /// CSV with columns timestamp, lat, lon, vehicle_speed, accel_x, accel_y, accel_z.
    csv: PathBuf,

    /// Vehicle the samples belong to.
    #[arg(long, default_value = "ABC1234")]
    vehicle: String,

    /// Skip wallet creation (the wallet already exists).
    #[arg(long)]
    no_create: bool,

    /// Raise the window flag on every Nth ingested record.
    #[arg(long, default_value_t = WINDOW_RECORD_COUNT)]
    window: usize,

    /// Stop after this many records.
    #[arg(long)]
    max_records: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    let client = HttpClientBuilder::default()
        .build(&cli.rpc_endpoint)
        .context("Failed to connect to RPC")?;

    match cli.command {
        Commands::CreateWallet(args) => {
            let wallet: serde_json::Value = call(&client, "createwallet", rpc_params![args.vehicle]).await?;
            print_json(&wallet)
        }
        Commands::Wallet(args) => {
            let wallet: serde_json::Value = call(&client, "getwallet", rpc_params![args.vehicle]).await?;
            print_json(&wallet)
        }
        Commands::Telemetry(args) => {
            let record: serde_json::Value = call(&client, "gettelemetry", rpc_params![args.vehicle]).await?;
            print_json(&record)
        }
        Commands::Analysis(args) => {
            let report: ScoringReport = call(&client, "getanalysis", rpc_params![args.vehicle]).await?;
            print_json(&serde_json::to_value(&report)?)
        }
        Commands::History(args) => {
            let records: serde_json::Value =
                call(&client, "gettelemetryhistory", rpc_params![args.vehicle, args.limit]).await?;
            print_json(&records)
        }
        Commands::Replay(args) => replay(&client, args).await,
    }
}

async fn call<R: DeserializeOwned>(client: &impl ClientT, method: &str, params: ArrayParams) -> Result<R> {
    client
        .request(method, params)
        .await
        .with_context(|| format!("RPC {method} failed"))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Stream the CSV into the node, one `ingest` call per accepted row.
async fn replay(client: &impl ClientT, args: ReplayArgs) -> Result<()> {
    if args.window == 0 {
        bail!("--window must be at least 1");
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(false)
        .from_path(&args.csv)
        .with_context(|| format!("Failed to open {}", args.csv.display()))?;
    let columns = ObdColumns::from_headers(reader.headers().context("Failed to read CSV header")?)?;

    if !args.no_create {
        let wallet: serde_json::Value =
            call(client, "createwallet", rpc_params![args.vehicle.clone()]).await?;
        info!(vehicle = %args.vehicle, %wallet, "wallet created");
    }

    let mut sent = 0usize;
    let mut last_credits = None;
    for (line, result) in reader.records().enumerate() {
        if args.max_records.is_some_and(|max| sent >= max) {
            break;
        }
        let record = match result {
            Ok(record) => record,
            Err(e) if matches!(e.kind(), csv::ErrorKind::UnequalLengths { .. }) => {
                warn!(line = line + 2, "skipping row with wrong field count");
                continue;
            }
            Err(e) => return Err(e).context("Failed to read CSV row"),
        };

        let flag = window_flag(sent, args.window);
        let input = columns
            .to_input(&record, flag)
            .with_context(|| format!("Invalid row at line {}", line + 2))?;

        let report: ScoringReport =
            call(client, "ingest", rpc_params![args.vehicle.clone(), input]).await?;
        sent += 1;
        info!(
            row = sent,
            timestamp = input.timestamp,
            window = flag,
            delta = report.total_delta,
            credits = report.credits,
            "ingested"
        );
        last_credits = Some(report.credits);
    }

    println!("Replayed {sent} record(s) for {}", args.vehicle);
    if let Some(credits) = last_credits {
        println!("Balance: {credits}");
    }
    Ok(())
}

/// Whether the `index`-th (0-based) ingested record closes a window.
fn window_flag(index: usize, every: usize) -> bool {
    (index + 1) % every == 0
}

/// Column positions of the fields replay needs.
#[derive(Debug, PartialEq, Eq)]
struct ObdColumns {
    timestamp: usize,
    lat: usize,
    lon: usize,
    speed: usize,
    accel_x: usize,
    accel_y: usize,
    accel_z: usize,
}

impl ObdColumns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .with_context(|| format!("CSV is missing column {name:?}"))
        };
        Ok(Self {
            timestamp: find("timestamp")?,
            lat: find("lat")?,
            lon: find("lon")?,
            speed: find("vehicle_speed")?,
            accel_x: find("accel_x")?,
            accel_y: find("accel_y")?,
            accel_z: find("accel_z")?,
        })
    }

    fn to_input(&self, record: &csv::StringRecord, window_flag: bool) -> Result<TelemetryInput> {
        let field = |idx: usize| record.get(idx).unwrap_or_default().trim();
        let number = |idx: usize, name: &str| -> Result<f64> {
            field(idx)
                .parse::<f64>()
                .with_context(|| format!("{name} is not a number: {:?}", field(idx)))
        };

        Ok(TelemetryInput {
            timestamp: parse_timestamp(field(self.timestamp))?,
            latitude: sanitize_coordinate(field(self.lat))?,
            longitude: sanitize_coordinate(field(self.lon))?,
            speed: number(self.speed, "vehicle_speed")?,
            accel_x: number(self.accel_x, "accel_x")?,
            accel_y: number(self.accel_y, "accel_y")?,
            accel_z: number(self.accel_z, "accel_z")?,
            window_flag,
        })
    }
}

/// Unix seconds of an OBD timestamp (`2023-05-01 12:00:00.500`), read as UTC.
fn parse_timestamp(raw: &str) -> Result<i64> {
    let t = NaiveDateTime::parse_from_str(raw, OBD_TIMESTAMP_FORMAT)
        .with_context(|| format!("failed to parse timestamp {raw:?}"))?;
    Ok(t.and_utc().timestamp())
}

/// Coordinates are exported with dot thousands separators and a decimal
/// comma: drop every `.`, then turn `,` into `.`.
fn sanitize_coordinate(raw: &str) -> Result<f64> {
    let cleaned = raw.replace('.', "").replace(',', ".");
    cleaned
        .parse::<f64>()
        .with_context(|| format!("invalid float string: {raw:?}"))
}
