//! Caller-facing request types

pub mod transfer;
pub mod utxo;

pub use transfer::{Amount, ResumeSigning, TransferIntent, TransferOutcome, TransferRequest};
pub use utxo::{BtcDestination, BtcTransferIntent, Utxo, UtxoInput};

/// Vault account identifier in the signing service
pub type VaultId = u64;
