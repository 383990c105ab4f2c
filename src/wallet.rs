//! Binding of one (vault, asset) pair to its on-chain address

use crate::error::{Result, TransferError};
use crate::service::SigningService;
use crate::types::VaultId;
use crate::validation::validate_evm_address;
use alloy::primitives::Address;

/// A vault's EVM account for one asset
///
/// The address is resolved once, from the vault's first deposit address, and
/// never changes afterwards. Build a separate wallet for every (vault, asset)
/// pairing instead of re-pointing an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultWallet {
    vault_id: VaultId,
    asset_id: String,
    address: Address,
}

impl VaultWallet {
    pub fn new(vault_id: VaultId, asset_id: impl Into<String>, address: Address) -> Self {
        Self {
            vault_id,
            asset_id: asset_id.into(),
            address,
        }
    }

    /// Resolve the wallet address from the signing service
    pub async fn connect<S: SigningService>(
        service: &S,
        vault_id: VaultId,
        asset_id: &str,
    ) -> Result<Self> {
        let addresses = service
            .get_deposit_addresses(vault_id, asset_id)
            .await
            .map_err(|e| match e {
                TransferError::Network(_) => e,
                other => TransferError::Vault {
                    vault_id: vault_id.to_string(),
                    asset_id: asset_id.to_string(),
                    message: format!("Failed to fetch deposit addresses: {}", other),
                },
            })?;

        let first = addresses.first().ok_or_else(|| TransferError::NoAddresses {
            vault_id: vault_id.to_string(),
            asset_id: asset_id.to_string(),
        })?;

        let address = validate_evm_address(&first.address).map_err(|_| TransferError::Vault {
            vault_id: vault_id.to_string(),
            asset_id: asset_id.to_string(),
            message: format!("Deposit address '{}' is not an EVM address", first.address),
        })?;

        tracing::info!("Vault {} / {} resolved to {}", vault_id, asset_id, address);
        Ok(Self::new(vault_id, asset_id, address))
    }

    pub fn vault_id(&self) -> VaultId {
        self.vault_id
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    pub fn address(&self) -> Address {
        self.address
    }
}
