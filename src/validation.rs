//! Input checks shared by every transfer flow
//!
//! All of these run before any remote call and fail with
//! [`TransferError::Validation`].

use crate::constants::MAX_BTC_DESTINATIONS;
use crate::error::{Result, TransferError};
use crate::types::{Amount, BtcDestination, UtxoInput, VaultId};
use alloy::primitives::Address;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse an EVM address: `0x` followed by 40 hex digits
pub fn validate_evm_address(address: &str) -> Result<Address> {
    let address = address.trim();
    let hex = address.strip_prefix("0x").ok_or_else(|| {
        TransferError::validation(format!("Invalid EVM address '{}': missing 0x prefix", address))
    })?;
    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(TransferError::validation(format!(
            "Invalid EVM address '{}': expected 40 hex digits",
            address
        )));
    }
    Address::from_str(address)
        .map_err(|e| TransferError::validation(format!("Invalid EVM address '{}': {}", address, e)))
}

/// Parse a vault id given as text
pub fn validate_vault_id(raw: &str) -> Result<VaultId> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(TransferError::validation("Vault id is required"));
    }
    raw.parse::<VaultId>().map_err(|_| {
        TransferError::validation(format!(
            "Invalid vault id '{}': expected a non-negative integer",
            raw
        ))
    })
}

/// Parse a non-negative decimal amount; zero means full balance
pub fn validate_amount(raw: &str) -> Result<Amount> {
    let amount = raw.trim();
    let (whole, frac) = amount.split_once('.').unwrap_or((amount, ""));

    let well_formed = !(whole.is_empty() && frac.is_empty())
        && whole.bytes().all(|b| b.is_ascii_digit())
        && frac.bytes().all(|b| b.is_ascii_digit());
    if !well_formed {
        return Err(TransferError::validation(format!(
            "Invalid amount '{}': expected a non-negative decimal number",
            raw
        )));
    }

    if amount.bytes().all(|b| b == b'0' || b == b'.') {
        Ok(Amount::FullBalance)
    } else {
        Ok(Amount::Exact(amount.to_string()))
    }
}

/// Parse a strictly positive decimal (UTXO amounts)
pub fn validate_positive_decimal(raw: &str, field: &str) -> Result<Decimal> {
    let value = Decimal::from_str(raw.trim()).map_err(|_| {
        TransferError::validation(format!("Invalid {} '{}': not a decimal number", field, raw))
    })?;
    if value <= Decimal::ZERO {
        return Err(TransferError::validation(format!(
            "Invalid {} '{}': must be positive",
            field, raw
        )));
    }
    Ok(value)
}

pub fn validate_non_empty<T>(items: &[T], field: &str) -> Result<()> {
    if items.is_empty() {
        return Err(TransferError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display>(
    value: T,
    min: T,
    max: T,
    field: &str,
) -> Result<()> {
    if value < min || value > max {
        return Err(TransferError::validation(format!(
            "{} must be between {} and {}, got {}",
            field, min, max, value
        )));
    }
    Ok(())
}

pub fn validate_transaction_id(transaction_id: &str) -> Result<()> {
    if transaction_id.trim().is_empty() {
        return Err(TransferError::validation("Transaction id is required"));
    }
    Ok(())
}

pub fn validate_utxo_input(input: &UtxoInput) -> Result<()> {
    if input.tx_hash.trim().is_empty() {
        return Err(TransferError::validation(format!(
            "UTXO at index {} has an empty txHash",
            input.index
        )));
    }
    Ok(())
}

/// Check a destination list and return the parsed amounts in order
pub fn validate_btc_destinations(
    destinations: &[BtcDestination],
) -> Result<Vec<(VaultId, Decimal)>> {
    validate_non_empty(destinations, "Destinations")?;
    validate_range(destinations.len(), 1, MAX_BTC_DESTINATIONS, "Destination count")?;

    destinations
        .iter()
        .enumerate()
        .map(|(i, destination)| {
            let vault = validate_vault_id(&destination.vault_id).map_err(|e| {
                TransferError::validation(format!("Destination {}: {}", i, e))
            })?;
            let amount = validate_positive_decimal(&destination.amount, "amount").map_err(|e| {
                TransferError::validation(format!("Destination {}: {}", i, e))
            })?;
            Ok((vault, amount))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evm_address() {
        assert!(validate_evm_address("0x742d35Cc6634C0532925a3b844Bc454e4438f44e").is_ok());
        assert!(validate_evm_address("0x742d35cc6634c0532925a3b844bc454e4438f44e").is_ok());
        assert!(validate_evm_address("742d35Cc6634C0532925a3b844Bc454e4438f44e").is_err());
        assert!(validate_evm_address("0x742d35Cc").is_err());
        assert!(validate_evm_address("0xZZ2d35Cc6634C0532925a3b844Bc454e4438f44e").is_err());
    }

    #[test]
    fn test_vault_id() {
        assert_eq!(validate_vault_id(" 12 ").unwrap(), 12);
        assert!(validate_vault_id("").is_err());
        assert!(validate_vault_id("-1").is_err());
        assert!(validate_vault_id("abc").is_err());
    }

    #[test]
    fn test_amount() {
        assert_eq!(validate_amount("0").unwrap(), Amount::FullBalance);
        assert_eq!(validate_amount(".5").unwrap(), Amount::Exact(".5".into()));
        assert!(validate_amount(".").is_err());
        assert!(validate_amount("1e5").is_err());
        assert!(validate_amount("inf").is_err());
    }

    #[test]
    fn test_positive_decimal() {
        assert_eq!(validate_positive_decimal("0.001", "amount").unwrap(), Decimal::new(1, 3));
        assert!(validate_positive_decimal("0", "amount").is_err());
        assert!(validate_positive_decimal("-2", "amount").is_err());
        assert!(validate_positive_decimal("x", "amount").is_err());
    }

    #[test]
    fn test_btc_destinations() {
        let ok = validate_btc_destinations(&[BtcDestination::new("2", "0.5")]).unwrap();
        assert_eq!(ok, vec![(2, Decimal::new(5, 1))]);

        assert!(validate_btc_destinations(&[]).is_err());
        assert!(validate_btc_destinations(&[BtcDestination::new("", "1")]).is_err());
        assert!(validate_btc_destinations(&[BtcDestination::new("2", "0")]).is_err());

        let too_many: Vec<_> = (0..=MAX_BTC_DESTINATIONS)
            .map(|i| BtcDestination::new(i.to_string(), "1"))
            .collect();
        assert!(validate_btc_destinations(&too_many).is_err());
        assert!(validate_btc_destinations(&too_many[..MAX_BTC_DESTINATIONS]).is_ok());
    }

    #[test]
    fn test_utxo_input() {
        assert!(validate_utxo_input(&UtxoInput::new("ab", 0)).is_ok());
        assert!(validate_utxo_input(&UtxoInput::new(" ", 0)).is_err());
    }
}
