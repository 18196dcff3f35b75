//! # drive-core
//! Driving-behaviour scoring engine over a versioned key/value ledger.

pub mod bearing;
pub mod config;
pub mod constants;
pub mod contract;
pub mod detectors;
pub mod error;
pub mod ledger;
pub mod scoring;
pub mod traits;
pub mod types;
pub mod wallet;
pub mod window;

pub use contract::VehicleContract;
pub use error::{DriveError, InputError};
