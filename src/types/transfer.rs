//! Transfer request types and routing

use super::VaultId;
use crate::error::{Result, TransferError};
use crate::service::TransactionInfo;
use crate::validation::{validate_amount, validate_evm_address};
use alloy::primitives::{Address, TxHash, U256};
use std::fmt;
use std::str::FromStr;

/// Requested amount in human units
///
/// Zero means "the maximum transferable amount, computed at signing time",
/// never a literal zero transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Amount {
    FullBalance,
    /// Non-zero decimal string, e.g. "0.25"
    Exact(String),
}

impl Amount {
    pub fn is_full_balance(&self) -> bool {
        matches!(self, Amount::FullBalance)
    }
}

impl FromStr for Amount {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self> {
        validate_amount(s)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::FullBalance => f.write_str("full balance"),
            Amount::Exact(amount) => f.write_str(amount),
        }
    }
}

/// Parameters for moving funds out of a vault
///
/// The shape of the transfer is decided by [`TransferRequest::intent`]:
/// a destination vault wins over everything else, then a contract address
/// selects an ERC-20 transfer, otherwise it is a native transfer.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source_vault: VaultId,
    pub asset_id: String,
    pub amount: Amount,
    /// Destination vault for an internal ledger transfer (must be > 0)
    pub destination_vault: Option<VaultId>,
    /// On-chain recipient for native/ERC-20 transfers
    pub recipient: Option<String>,
    /// ERC-20 token contract
    pub contract_address: Option<String>,
    /// Caller reference (batch file name, ticket) copied into the note
    pub reference: Option<String>,
    /// Continue an earlier attempt instead of submitting a new one
    pub resume: Option<ResumeSigning>,
}

/// An earlier signing attempt to continue after a crash
///
/// The service signed a digest over the exact transaction fields of that
/// attempt, so on-chain transfers must pin the nonce and gas price it used
/// (and the gas limit for ERC-20 calls). They are logged when the attempt is
/// submitted. Internal transfers only need the transaction id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeSigning {
    pub transaction_id: String,
    pub nonce: Option<u64>,
    pub gas_price: Option<u128>,
    pub gas_limit: Option<u64>,
}

impl ResumeSigning {
    pub fn new(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            nonce: None,
            gas_price: None,
            gas_limit: None,
        }
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

impl TransferRequest {
    pub fn new(source_vault: VaultId, asset_id: impl Into<String>, amount: Amount) -> Self {
        Self {
            source_vault,
            asset_id: asset_id.into(),
            amount,
            destination_vault: None,
            recipient: None,
            contract_address: None,
            reference: None,
            resume: None,
        }
    }

    pub fn with_destination_vault(mut self, vault: VaultId) -> Self {
        self.destination_vault = Some(vault);
        self
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn with_contract(mut self, contract: impl Into<String>) -> Self {
        self.contract_address = Some(contract.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_resume(mut self, resume: ResumeSigning) -> Self {
        self.resume = Some(resume);
        self
    }

    /// Validate and decide the transfer shape
    pub fn intent(&self) -> Result<TransferIntent> {
        if self.asset_id.trim().is_empty() {
            return Err(TransferError::validation("Asset id is required"));
        }

        let contract = self
            .contract_address
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(validate_evm_address)
            .transpose()?;

        if let Some(destination_vault) = self.destination_vault.filter(|v| *v > 0) {
            if destination_vault == self.source_vault {
                return Err(TransferError::validation(
                    "Source and destination vault are the same",
                ));
            }
            return Ok(TransferIntent::Internal {
                source_vault: self.source_vault,
                destination_vault,
                asset_id: self.asset_id.clone(),
                amount: self.amount.clone(),
                contract,
            });
        }

        let recipient = self
            .recipient
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| {
                TransferError::validation("Recipient address is required for on-chain transfers")
            })
            .and_then(validate_evm_address)?;

        Ok(match contract {
            Some(contract) => TransferIntent::Erc20 {
                source_vault: self.source_vault,
                recipient,
                asset_id: self.asset_id.clone(),
                contract,
                amount: self.amount.clone(),
            },
            None => TransferIntent::Native {
                source_vault: self.source_vault,
                recipient,
                asset_id: self.asset_id.clone(),
                amount: self.amount.clone(),
            },
        })
    }
}

/// Validated transfer shape; exactly one is active per request
#[derive(Debug, Clone, PartialEq)]
pub enum TransferIntent {
    Native {
        source_vault: VaultId,
        recipient: Address,
        asset_id: String,
        amount: Amount,
    },
    Erc20 {
        source_vault: VaultId,
        recipient: Address,
        asset_id: String,
        contract: Address,
        amount: Amount,
    },
    Internal {
        source_vault: VaultId,
        destination_vault: VaultId,
        asset_id: String,
        amount: Amount,
        /// Token whose on-chain balance bounds a full-balance transfer
        contract: Option<Address>,
    },
}

impl TransferIntent {
    pub fn source_vault(&self) -> VaultId {
        match self {
            Self::Native { source_vault, .. }
            | Self::Erc20 { source_vault, .. }
            | Self::Internal { source_vault, .. } => *source_vault,
        }
    }

    pub fn asset_id(&self) -> &str {
        match self {
            Self::Native { asset_id, .. }
            | Self::Erc20 { asset_id, .. }
            | Self::Internal { asset_id, .. } => asset_id,
        }
    }

    pub fn amount(&self) -> &Amount {
        match self {
            Self::Native { amount, .. }
            | Self::Erc20 { amount, .. }
            | Self::Internal { amount, .. } => amount,
        }
    }
}

/// Result of a completed transfer
#[derive(Debug, Clone)]
pub enum TransferOutcome {
    /// Custodian-internal movement, completed by the signing service
    Internal {
        transaction: TransactionInfo,
        /// Human-unit amount that was submitted
        amount: String,
    },
    /// Raw-signed transaction broadcast to the chain
    Broadcast {
        signing_transaction_id: String,
        tx_hash: TxHash,
        /// Value moved, in smallest units
        amount: U256,
        raw_transaction: String,
    },
}
