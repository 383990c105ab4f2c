//! Signing service abstraction
//!
//! The custodial signing service holds every key. This module describes the
//! capability set the transfer flows need from it, the request/response
//! shapes, and the HTTP implementation in [`FireblocksClient`].

mod fireblocks;

pub use fireblocks::FireblocksClient;

use crate::error::Result;
use crate::status::TransactionStatus;
use crate::types::{Utxo, UtxoInput, VaultId};
use serde::{Deserialize, Serialize};

// ========== Requests ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Transfer,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerType {
    VaultAccount,
}

/// Source or destination of a transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerPath {
    #[serde(rename = "type")]
    pub peer_type: PeerType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl PeerPath {
    pub fn vault(vault_id: VaultId) -> Self {
        Self {
            peer_type: PeerType::VaultAccount,
            id: Some(vault_id.to_string()),
        }
    }
}

/// One leg of a multi-destination transfer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationAmount {
    pub amount: String,
    pub destination: PeerPath,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    /// Hex digest to sign, without `0x`
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessageData {
    pub messages: Vec<RawMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputsSelection {
    pub inputs_to_spend: Vec<UtxoInput>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_message_data: Option<RawMessageData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs_selection: Option<InputsSelection>,
}

/// Payload of `createTransaction` / `estimateFeeForTransaction`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub operation: Operation,
    pub asset_id: String,
    pub source: PeerPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PeerPath>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<DestinationAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_parameters: Option<ExtraParameters>,
}

impl TransactionRequest {
    /// Ask the service to sign a raw digest with the vault's key for `asset_id`
    pub fn raw(
        source_vault: VaultId,
        asset_id: impl Into<String>,
        digest_hex: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            operation: Operation::Raw,
            asset_id: asset_id.into(),
            source: PeerPath::vault(source_vault),
            destination: None,
            destinations: Vec::new(),
            amount: None,
            note: Some(note.into()),
            extra_parameters: Some(ExtraParameters {
                raw_message_data: Some(RawMessageData {
                    messages: vec![RawMessage {
                        content: digest_hex.into(),
                    }],
                }),
                inputs_selection: None,
            }),
        }
    }

    /// Ledger transfer between two vaults (or to a one-time address)
    pub fn transfer(
        source_vault: VaultId,
        destination: PeerPath,
        asset_id: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            operation: Operation::Transfer,
            asset_id: asset_id.into(),
            source: PeerPath::vault(source_vault),
            destination: Some(destination),
            destinations: Vec::new(),
            amount: Some(amount.into()),
            note: None,
            extra_parameters: None,
        }
    }

    /// Transfer to several destinations in one transaction (UTXO assets)
    pub fn multi_destination(
        source_vault: VaultId,
        asset_id: impl Into<String>,
        destinations: Vec<DestinationAmount>,
    ) -> Self {
        Self {
            operation: Operation::Transfer,
            asset_id: asset_id.into(),
            source: PeerPath::vault(source_vault),
            destination: None,
            destinations,
            amount: None,
            note: None,
            extra_parameters: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Pin the exact inputs to spend; an empty list leaves selection to the service
    pub fn with_inputs(mut self, inputs: Vec<UtxoInput>) -> Self {
        if inputs.is_empty() {
            return self;
        }
        let extra = self.extra_parameters.get_or_insert_with(ExtraParameters::default);
        extra.inputs_selection = Some(InputsSelection {
            inputs_to_spend: inputs,
        });
        self
    }

    /// Digests carried by a raw signing request
    pub fn raw_contents(&self) -> Vec<&str> {
        self.extra_parameters
            .as_ref()
            .and_then(|extra| extra.raw_message_data.as_ref())
            .map(|data| data.messages.iter().map(|m| m.content.as_str()).collect())
            .unwrap_or_default()
    }
}

// ========== Responses ==========

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateTransactionResponse {
    pub id: String,
    pub status: TransactionStatus,
}

/// ECDSA components returned for one raw-signed message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSignature {
    pub r: String,
    pub s: String,
    /// Recovery id, 0 or 1 (27/28 are tolerated)
    pub v: u8,
    #[serde(default)]
    pub full_sig: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedMessage {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
    pub signature: MessageSignature,
}

/// Snapshot of a remote transaction
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub id: String,
    pub status: TransactionStatus,
    #[serde(default)]
    pub sub_status: Option<String>,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub signed_messages: Vec<SignedMessage>,
}

impl TransactionInfo {
    pub fn new(id: impl Into<String>, status: TransactionStatus) -> Self {
        Self {
            id: id.into(),
            status,
            sub_status: None,
            tx_hash: None,
            asset_id: None,
            note: None,
            signed_messages: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositAddress {
    pub address: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default, rename = "type")]
    pub address_type: Option<String>,
    #[serde(default)]
    pub legacy_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeLevel {
    #[serde(default)]
    pub network_fee: Option<String>,
    #[serde(default)]
    pub gas_price: Option<String>,
    #[serde(default)]
    pub gas_limit: Option<String>,
    #[serde(default)]
    pub fee_per_byte: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeeEstimate {
    pub low: FeeLevel,
    #[serde(default)]
    pub medium: FeeLevel,
    #[serde(default)]
    pub high: FeeLevel,
}

/// Balance of one asset inside one vault
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultAsset {
    pub id: String,
    #[serde(default)]
    pub total: Option<String>,
    #[serde(default)]
    pub available: Option<String>,
    #[serde(default)]
    pub pending: Option<String>,
}

// ========== Capability set ==========

/// Operations consumed from the signing service
///
/// Implementations must be usable from concurrent polling loops; no method
/// takes `&mut self`.
pub trait SigningService: Send + Sync {
    fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> impl std::future::Future<Output = Result<CreateTransactionResponse>> + Send;

    fn get_transaction_by_id(
        &self,
        transaction_id: &str,
    ) -> impl std::future::Future<Output = Result<TransactionInfo>> + Send;

    /// Request cancellation; the service acknowledges, it does not delete
    fn cancel_transaction_by_id(
        &self,
        transaction_id: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    fn get_deposit_addresses(
        &self,
        vault_id: VaultId,
        asset_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<DepositAddress>>> + Send;

    fn get_unspent_inputs(
        &self,
        vault_id: VaultId,
        asset_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Utxo>>> + Send;

    fn estimate_fee_for_transaction(
        &self,
        request: &TransactionRequest,
    ) -> impl std::future::Future<Output = Result<FeeEstimate>> + Send;

    fn get_vault_asset(
        &self,
        vault_id: VaultId,
        asset_id: &str,
    ) -> impl std::future::Future<Output = Result<VaultAsset>> + Send;
}
