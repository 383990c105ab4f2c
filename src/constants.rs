//! Constants and exact unit conversion
//!
//! Amount conversion between human units ("0.1") and smallest units (wei,
//! token base units) is done with integer arithmetic only. Floating point
//! loses precision at 18 decimals and is never used here.

use crate::error::{Result, TransferError};
use alloy::primitives::U256;
use std::time::Duration;

/// Gas limit of a plain native-asset transfer
pub const SIMPLE_TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Gas estimates are multiplied by GAS_BUFFER_NUMERATOR / GAS_BUFFER_DENOMINATOR (1.2x)
pub const GAS_BUFFER_NUMERATOR: u64 = 12;
pub const GAS_BUFFER_DENOMINATOR: u64 = 10;

/// Native EVM assets use 18 decimals
pub const NATIVE_DECIMALS: u8 = 18;

/// Maximum number of destinations in one UTXO transfer
pub const MAX_BTC_DESTINATIONS: usize = 100;

/// Default delay between two status fetches
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1_000);

/// Default overall polling bound (10 minutes)
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(600_000);

/// Signing service production endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://api.fireblocks.io";

/// Apply the gas buffer to an estimate, rounding down
pub fn buffered_gas(estimate: u64) -> u64 {
    let buffered =
        estimate as u128 * GAS_BUFFER_NUMERATOR as u128 / GAS_BUFFER_DENOMINATOR as u128;
    u64::try_from(buffered).unwrap_or(u64::MAX)
}

/// Convert a human decimal string to smallest units: `amount * 10^decimals`
///
/// Rejects signs, exponents and more fractional digits than `decimals`.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(TransferError::validation("Amount is empty"));
    }

    let (whole, frac) = match amount.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (amount, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(TransferError::validation(format!("Invalid amount '{}'", amount)));
    }
    let whole = if whole.is_empty() { "0" } else { whole };

    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TransferError::validation(format!(
            "Invalid amount '{}': expected a non-negative decimal number",
            amount
        )));
    }

    let frac = frac.trim_end_matches('0');
    if frac.len() > decimals as usize {
        return Err(TransferError::validation(format!(
            "Amount '{}' has {} fractional digits, asset supports {}",
            amount,
            frac.len(),
            decimals
        )));
    }

    let overflow = || TransferError::validation(format!("Amount '{}' is too large", amount));

    let whole = U256::from_str_radix(whole, 10).map_err(|_| overflow())?;
    let scale = U256::from(10u64).pow(U256::from(decimals));
    let padded = format!("{:0<width$}", frac, width = decimals as usize);
    let frac = if padded.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(&padded, 10).map_err(|_| overflow())?
    };

    whole
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac))
        .ok_or_else(overflow)
}

/// Render smallest units as a human decimal string without trailing zeros
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (whole, frac) = padded.split_at(padded.len() - decimals);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, frac)
    }
}
