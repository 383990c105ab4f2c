//! UTXO types

use super::VaultId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Reference to a specific output to spend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoInput {
    pub tx_hash: String,
    pub index: u32,
}

impl UtxoInput {
    pub fn new(tx_hash: impl Into<String>, index: u32) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            index,
        }
    }
}

/// Unspent output held by a vault, as reported by the signing service
#[derive(Debug, Clone, PartialEq)]
pub struct Utxo {
    pub tx_hash: String,
    pub index: u32,
    /// Amount in whole coins; missing amounts count as zero
    pub amount: Option<Decimal>,
    pub address: Option<String>,
}

impl Utxo {
    pub fn amount_or_zero(&self) -> Decimal {
        self.amount.unwrap_or(Decimal::ZERO)
    }

    pub fn input(&self) -> UtxoInput {
        UtxoInput::new(self.tx_hash.clone(), self.index)
    }
}

/// One recipient vault of a UTXO transfer
#[derive(Debug, Clone, PartialEq)]
pub struct BtcDestination {
    /// Destination vault id as supplied by the caller (validated as numeric)
    pub vault_id: String,
    /// Decimal amount in whole coins
    pub amount: String,
}

impl BtcDestination {
    pub fn new(vault_id: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            vault_id: vault_id.into(),
            amount: amount.into(),
        }
    }
}

/// Parameters for a multi-destination UTXO transfer
#[derive(Debug, Clone, PartialEq)]
pub struct BtcTransferIntent {
    pub source_vault: VaultId,
    pub asset_id: String,
    pub destinations: Vec<BtcDestination>,
    /// Exact inputs to spend; `None` or empty lets the service choose
    pub selected_utxos: Option<Vec<UtxoInput>>,
    /// Caller reference copied into the note
    pub reference: Option<String>,
}

impl BtcTransferIntent {
    pub fn new(
        source_vault: VaultId,
        asset_id: impl Into<String>,
        destinations: Vec<BtcDestination>,
    ) -> Self {
        Self {
            source_vault,
            asset_id: asset_id.into(),
            destinations,
            selected_utxos: None,
            reference: None,
        }
    }

    pub fn with_utxos(mut self, utxos: Vec<UtxoInput>) -> Self {
        self.selected_utxos = Some(utxos);
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}
