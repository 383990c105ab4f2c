//! Error types for vault transfers
//!
//! Every core operation fails with one [`TransferError`] kind. The CLI wraps
//! these in `eyre` at the binary boundary.

use crate::status::TransactionStatus;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransferError>;

#[derive(Debug, Error)]
pub enum TransferError {
    /// Malformed caller input, raised before any remote call
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: String, available: String },

    /// The chain RPC (or the signing service fee estimator) could not estimate
    #[error("Gas estimation failed: {0}")]
    GasEstimation(String),

    /// The remote transaction ended in a failure or cancelled state, or
    /// completed without the expected signature
    #[error(
        "Transaction {transaction_id} ended with status {status} (cancelled: {cancelled}){}",
        reason_suffix(.reason)
    )]
    Transaction {
        transaction_id: String,
        status: TransactionStatus,
        cancelled: bool,
        reason: Option<String>,
    },

    /// Local polling gave up; the remote outcome is unknown
    #[error(
        "Timed out after {}ms waiting for transaction {transaction_id} (last status: {})",
        .timeout.as_millis(),
        status_or_unknown(.last_status)
    )]
    Timeout {
        transaction_id: String,
        timeout: Duration,
        last_status: Option<TransactionStatus>,
    },

    #[error("Vault {vault_id} / {asset_id}: {message}")]
    Vault {
        vault_id: String,
        asset_id: String,
        message: String,
    },

    #[error("No deposit addresses for asset {asset_id} in vault {vault_id}")]
    NoAddresses { vault_id: String, asset_id: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transient I/O failure talking to the signing service or a chain node
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response from the signing service
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Malformed remote payload or local encoding failure
    #[error("Encoding error: {0}")]
    Encoding(String),
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_ref()
        .map(|r| format!(": {}", r))
        .unwrap_or_default()
}

fn status_or_unknown(status: &Option<TransactionStatus>) -> &str {
    status.as_ref().map(TransactionStatus::as_str).unwrap_or("unknown")
}

impl TransferError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether the poller may retry after this error
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Transaction id carried by the error, if any
    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            Self::Transaction { transaction_id, .. } | Self::Timeout { transaction_id, .. } => {
                Some(transaction_id)
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Encoding(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TransferError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}
