//! UTXO transfers
//!
//! The signing service builds and signs UTXO transactions itself, so these
//! flows submit a transfer request directly and only poll it. Inputs are
//! either pinned by the caller or left to the service.

use crate::error::{Result, TransferError};
use crate::note::btc_note;
use crate::poller::{PollingConfig, TransactionPoller};
use crate::service::{
    DestinationAmount, PeerPath, SigningService, TransactionInfo, TransactionRequest,
};
use crate::types::{BtcTransferIntent, Utxo, VaultId};
use crate::validation::{validate_btc_destinations, validate_utxo_input};
use rust_decimal::Decimal;
use std::sync::Arc;

pub struct UtxoTransferBuilder<S> {
    service: Arc<S>,
    poller: TransactionPoller<S>,
}

impl<S: SigningService> UtxoTransferBuilder<S> {
    pub fn new(service: Arc<S>, polling: PollingConfig) -> Self {
        let poller = TransactionPoller::new(service.clone(), polling);
        Self { service, poller }
    }

    /// Submit a multi-destination transfer and wait for it to complete
    pub async fn sign_btc_transaction(
        &self,
        intent: &BtcTransferIntent,
    ) -> Result<TransactionInfo> {
        if intent.asset_id.trim().is_empty() {
            return Err(TransferError::validation("Asset id is required"));
        }
        let destinations = validate_btc_destinations(&intent.destinations)?;
        let inputs = intent.selected_utxos.clone().unwrap_or_default();
        for input in &inputs {
            validate_utxo_input(input)?;
        }

        let total = destinations
            .iter()
            .try_fold(Decimal::ZERO, |total, (_, amount)| total.checked_add(*amount))
            .ok_or_else(|| TransferError::validation("Total of destination amounts overflows"))?;
        let note = btc_note(
            intent.source_vault,
            &intent.asset_id,
            total,
            destinations.len(),
            intent.reference.as_deref(),
        );

        let pinned = inputs.len();
        let request = TransactionRequest::multi_destination(
            intent.source_vault,
            intent.asset_id.clone(),
            destinations
                .into_iter()
                .map(|(vault, amount)| DestinationAmount {
                    amount: amount.normalize().to_string(),
                    destination: PeerPath::vault(vault),
                })
                .collect(),
        )
        .with_note(note)
        .with_inputs(inputs);

        let created = self.service.create_transaction(&request).await?;
        tracing::info!(
            "Submitted {} transfer {} of {} to {} destinations ({} pinned inputs)",
            intent.asset_id,
            created.id,
            total.normalize(),
            intent.destinations.len(),
            pinned
        );

        self.poller.poll_until_success(&created.id).await
    }

    /// Unspent outputs held by a vault for one asset
    pub async fn get_available_utxos(
        &self,
        vault_id: VaultId,
        asset_id: &str,
    ) -> Result<Vec<Utxo>> {
        self.service
            .get_unspent_inputs(vault_id, asset_id)
            .await
            .map_err(|e| TransferError::Vault {
                vault_id: vault_id.to_string(),
                asset_id: asset_id.to_string(),
                message: format!("Failed to fetch unspent inputs: {}", e),
            })
    }
}

/// Pick the fewest large UTXOs that cover `target`
///
/// Largest first, stopping at the first point the running total reaches the
/// target. Equal amounts keep their input order.
pub fn select_utxos_for_amount(utxos: &[Utxo], target: Decimal) -> Result<Vec<Utxo>> {
    if target <= Decimal::ZERO {
        return Err(TransferError::validation(format!(
            "Target amount must be positive, got {}",
            target
        )));
    }

    let mut sorted: Vec<&Utxo> = utxos.iter().collect();
    sorted.sort_by(|a, b| b.amount_or_zero().cmp(&a.amount_or_zero()));

    let mut selected = Vec::new();
    let mut accumulated = Decimal::ZERO;
    for utxo in sorted {
        if accumulated >= target {
            break;
        }
        accumulated = accumulated
            .checked_add(utxo.amount_or_zero())
            .ok_or_else(utxo_total_overflow)?;
        selected.push(utxo.clone());
    }

    if accumulated < target {
        return Err(TransferError::InsufficientBalance {
            required: target.normalize().to_string(),
            available: accumulated.normalize().to_string(),
        });
    }
    Ok(selected)
}

/// Sum of UTXO amounts; a total beyond the decimal range is an encoding error
pub fn calculate_utxo_balance(utxos: &[Utxo]) -> Result<Decimal> {
    utxos
        .iter()
        .try_fold(Decimal::ZERO, |total, utxo| total.checked_add(utxo.amount_or_zero()))
        .ok_or_else(utxo_total_overflow)
}

fn utxo_total_overflow() -> TransferError {
    TransferError::Encoding("UTXO amounts overflow the decimal range".into())
}

/// UTXOs worth at least `min`
pub fn filter_utxos_by_amount(utxos: &[Utxo], min: Decimal) -> Vec<Utxo> {
    utxos
        .iter()
        .filter(|utxo| utxo.amount_or_zero() >= min)
        .cloned()
        .collect()
}
