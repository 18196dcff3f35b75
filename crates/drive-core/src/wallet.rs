//! Per-vehicle credit wallets.
//!
//! This module is the only writer of [`VehicleWallet::credits`]. Wallets live
//! under `\0WALLET\0<vehicle>\0` so they never collide with the vehicle's raw
//! telemetry key. A wallet is written whole exactly once, at creation; after
//! that every change is a delta on the stored balance.

use tracing::debug;

use crate::constants::WALLET_NAMESPACE;
use crate::error::{DriveError, InputError};
use crate::traits::LedgerStub;
use crate::types::VehicleWallet;

/// Ledger key of `vehicle_id`'s wallet.
pub fn wallet_key<L: LedgerStub + ?Sized>(stub: &L, vehicle_id: &str) -> Result<String, DriveError> {
    stub.create_composite_key(WALLET_NAMESPACE, &[vehicle_id])
}

/// Create a zero-credit wallet.
///
/// # Errors
///
/// - [`DriveError::AlreadyExists`] if the vehicle already has a wallet
pub fn create_wallet<L: LedgerStub + ?Sized>(
    stub: &mut L,
    vehicle_id: &str,
) -> Result<VehicleWallet, DriveError> {
    let key = wallet_key(stub, vehicle_id)?;
    if stub.get_state(&key)?.is_some() {
        return Err(DriveError::AlreadyExists(vehicle_id.to_string()));
    }
    let wallet = VehicleWallet::default();
    stub.put_state(&key, wallet.to_bytes()?)?;
    Ok(wallet)
}

/// Current wallet of `vehicle_id`.
///
/// # Errors
///
/// - [`DriveError::WalletNotFound`] if no wallet was created
pub fn get_wallet<L: LedgerStub + ?Sized>(
    stub: &L,
    vehicle_id: &str,
) -> Result<VehicleWallet, DriveError> {
    let key = wallet_key(stub, vehicle_id)?;
    let bytes = stub
        .get_state(&key)?
        .ok_or_else(|| DriveError::WalletNotFound(vehicle_id.to_string()))?;
    VehicleWallet::from_bytes(&bytes)
}

/// Add `delta` to the stored balance and write it back.
///
/// Returns the updated wallet.
///
/// # Errors
///
/// - [`DriveError::WalletNotFound`] if no wallet was created
/// - [`InputError::CreditOverflow`] if the balance would leave `i64`
pub fn apply_delta<L: LedgerStub + ?Sized>(
    stub: &mut L,
    vehicle_id: &str,
    delta: i64,
) -> Result<VehicleWallet, DriveError> {
    let key = wallet_key(stub, vehicle_id)?;
    let bytes = stub
        .get_state(&key)?
        .ok_or_else(|| DriveError::WalletNotFound(vehicle_id.to_string()))?;
    let current = VehicleWallet::from_bytes(&bytes)?;
    let credits = current
        .credits
        .checked_add(delta)
        .ok_or(InputError::CreditOverflow { balance: current.credits, delta })?;
    let updated = VehicleWallet { credits };
    stub.put_state(&key, updated.to_bytes()?)?;
    debug!(vehicle = vehicle_id, delta, credits, "wallet updated");
    Ok(updated)
}
