//! Vault transfers for Rust
//!
//! Moves funds out of custodial vaults through a remote signing service that
//! holds every key.
//!
//! # Features
//!
//! - Native and ERC-20 transfers, signed as raw EIP-155 digests and broadcast
//! - Internal ledger transfers between vaults
//! - Multi-destination UTXO transfers with optional input pinning
//! - Bounded polling with auto-cancel of failed transactions
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vault_transfer::{
//!     AlloyRpc, FireblocksClient, PollingConfig, ServiceConfig, TransferEngine, TransferRequest,
//!     VaultWallet,
//! };
//!
//! #[tokio::main]
//! async fn main() -> eyre::Result<()> {
//!     let service = Arc::new(FireblocksClient::new(&ServiceConfig::from_env()?)?);
//!     let rpc = Arc::new(AlloyRpc::new("https://eth.llamarpc.com")?);
//!     let wallet = VaultWallet::connect(service.as_ref(), 0, "ETH").await?;
//!
//!     let engine = TransferEngine::new(service, rpc, wallet, PollingConfig::default());
//!     let outcome = engine
//!         .transfer(
//!             &TransferRequest::new(0, "ETH", "0.1".parse()?)
//!                 .with_recipient("0x742d35Cc6634C0532925a3b844Bc454e4438f44e"),
//!         )
//!         .await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constants;
pub mod contracts;
pub mod error;
pub mod note;
pub mod poller;
pub mod rpc;
pub mod service;
pub mod signer;
pub mod status;
pub mod transfer;
pub mod types;
pub mod utxo;
pub mod validation;
pub mod wallet;

#[cfg(test)]
mod mock;

// Re-export main types for convenience
pub use config::{NetworkConfig, ServiceConfig};
pub use constants::{format_units, parse_units};
pub use error::{Result, TransferError};
pub use poller::{PollingConfig, PollingResult, TransactionPoller};
pub use rpc::{AlloyRpc, ChainRpc, EvmCall};
pub use service::{FireblocksClient, SigningService, TransactionInfo, TransactionRequest};
pub use signer::{RawSigner, SignOptions, SignedTransaction, TxRequest, UnsignedTransaction};
pub use status::{StatusBucket, TransactionStatus};
pub use transfer::TransferEngine;
pub use types::{
    Amount, BtcDestination, BtcTransferIntent, ResumeSigning, TransferIntent, TransferOutcome,
    TransferRequest, Utxo, UtxoInput, VaultId,
};
pub use utxo::{
    calculate_utxo_balance, filter_utxos_by_amount, select_utxos_for_amount, UtxoTransferBuilder,
};
pub use wallet::VaultWallet;
