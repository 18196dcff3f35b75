//! Cross-crate test suite for Drivescore.
//!
//! End-to-end scoring scenarios against both ledger hosts, and property
//! tests over the detectors and the wallet.

pub mod helpers;
