//! Audit notes attached to submitted transactions
//!
//! Notes only show up in the signing service's console and logs. They never
//! change what is signed.

use crate::types::{TransferIntent, VaultId};
use rust_decimal::Decimal;

/// Note for an EVM or internal transfer
///
/// `amount` is the resolved human-unit amount, which for a full-balance
/// request is only known at signing time.
pub fn transfer_note(intent: &TransferIntent, amount: &str, reference: Option<&str>) -> String {
    let mut note = match intent {
        TransferIntent::Internal {
            source_vault,
            destination_vault,
            asset_id,
            ..
        } => format!(
            "Transfer {} {} from vault {} to vault {}",
            amount, asset_id, source_vault, destination_vault
        ),
        TransferIntent::Native {
            source_vault,
            recipient,
            asset_id,
            ..
        } => format!(
            "Transfer {} {} from vault {} to {}",
            amount, asset_id, source_vault, recipient
        ),
        TransferIntent::Erc20 {
            source_vault,
            recipient,
            asset_id,
            contract,
            ..
        } => format!(
            "Transfer {} {} (token {}) from vault {} to {}",
            amount, asset_id, contract, source_vault, recipient
        ),
    };
    if intent.amount().is_full_balance() {
        note.push_str(" [full balance]");
    }
    append_reference(note, reference)
}

/// Note for a multi-destination UTXO transfer
pub fn btc_note(
    source_vault: VaultId,
    asset_id: &str,
    total: Decimal,
    destinations: usize,
    reference: Option<&str>,
) -> String {
    let plural = if destinations == 1 { "" } else { "s" };
    let note = format!(
        "Send {} {} from vault {} to {} destination{}",
        total.normalize(),
        asset_id,
        source_vault,
        destinations,
        plural
    );
    append_reference(note, reference)
}

fn append_reference(mut note: String, reference: Option<&str>) -> String {
    if let Some(reference) = reference.map(str::trim).filter(|r| !r.is_empty()) {
        note.push_str(" (ref: ");
        note.push_str(reference);
        note.push(')');
    }
    note
}
