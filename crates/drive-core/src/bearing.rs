//! Great-circle initial bearing between two GPS fixes.

use std::f64::consts::TAU;

use crate::error::InputError;
use crate::types::check_coordinates;

/// Initial bearing from `(lat1, lon1)` to `(lat2, lon2)`, in radians `[0, 2π)`.
///
/// `0` is north, increasing clockwise. Identical points yield `0`.
///
/// # Examples
///
/// ```
/// use drive_core::bearing::bearing_rad;
///
/// let east = bearing_rad(0.0, 0.0, 0.0, 1.0).unwrap();
/// assert!((east - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
/// assert_eq!(bearing_rad(10.0, 10.0, 10.0, 10.0).unwrap(), 0.0);
/// assert!(bearing_rad(95.0, 0.0, 0.0, 0.0).is_err());
/// ```
pub fn bearing_rad(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Result<f64, InputError> {
    check_coordinates(lat1, lon1)?;
    check_coordinates(lat2, lon2)?;

    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    Ok(normalize(y.atan2(x)))
}

/// Fold an `atan2` result into `[0, 2π)`.
fn normalize(theta: f64) -> f64 {
    let mut b = if theta < 0.0 { theta + TAU } else { theta };
    // -0.0 and values a hair under zero round up to exactly 2π.
    if b >= TAU {
        b -= TAU;
    }
    if b == 0.0 { 0.0 } else { b }
}
