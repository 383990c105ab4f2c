//! Scripted test doubles for the signing service and the chain node

use crate::error::{Result, TransferError};
use crate::rpc::{ChainRpc, EvmCall};
use crate::service::{
    CreateTransactionResponse, DepositAddress, FeeEstimate, MessageSignature, SignedMessage,
    SigningService, TransactionInfo, TransactionRequest, VaultAsset,
};
use crate::status::TransactionStatus;
use crate::types::{Utxo, VaultId};
use alloy::primitives::{keccak256, Address, TxHash, U256};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// One scripted answer to `get_transaction_by_id`
#[derive(Debug, Clone)]
pub enum Script {
    Status(TransactionStatus),
    /// COMPLETED with one signature over the digest submitted at creation
    Signed { r: U256, s: U256, v: u8 },
    NetworkError,
    ApiError(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCall {
    Create(TransactionRequest),
    Get(String),
    Cancel(String),
    DepositAddresses(VaultId, String),
    UnspentInputs(VaultId, String),
    EstimateFee(TransactionRequest),
    VaultAsset(VaultId, String),
}

/// Signing service double. Each transaction id replays its script; the last
/// entry repeats forever.
#[derive(Default)]
pub struct MockSigningService {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    digests: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<ServiceCall>>,
    addresses: Mutex<Vec<DepositAddress>>,
    utxos: Mutex<Option<Vec<Utxo>>>,
    fee_estimate: Mutex<Option<FeeEstimate>>,
    cancel_fails: Mutex<bool>,
    next_id: Mutex<u64>,
}

impl MockSigningService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, transaction_id: &str, script: Vec<Script>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(transaction_id.to_string(), script.into());
    }

    pub fn with_address(self, address: Address) -> Self {
        self.addresses.lock().unwrap().push(DepositAddress {
            address: address.to_string(),
            tag: None,
            address_type: Some("PERMANENT".into()),
            legacy_address: None,
        });
        self
    }

    pub fn with_utxos(self, utxos: Vec<Utxo>) -> Self {
        *self.utxos.lock().unwrap() = Some(utxos);
        self
    }

    pub fn with_fee_estimate(self, estimate: FeeEstimate) -> Self {
        *self.fee_estimate.lock().unwrap() = Some(estimate);
        self
    }

    pub fn fail_cancel(&self) {
        *self.cancel_fails.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&ServiceCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    pub fn created(&self) -> Vec<TransactionRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ServiceCall::Create(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ServiceCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_script(&self, transaction_id: &str) -> Option<Script> {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(transaction_id)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl SigningService for MockSigningService {
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<CreateTransactionResponse> {
        self.record(ServiceCall::Create(request.clone()));

        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            format!("tx-{}", *next)
        };
        if let Some(digest) = request.raw_contents().first() {
            self.digests
                .lock()
                .unwrap()
                .insert(id.clone(), digest.to_string());
        }

        Ok(CreateTransactionResponse {
            id,
            status: TransactionStatus::Submitted,
        })
    }

    async fn get_transaction_by_id(&self, transaction_id: &str) -> Result<TransactionInfo> {
        self.record(ServiceCall::Get(transaction_id.to_string()));

        match self.next_script(transaction_id) {
            Some(Script::Status(status)) => Ok(TransactionInfo::new(transaction_id, status)),
            Some(Script::Signed { r, s, v }) => {
                let content = self
                    .digests
                    .lock()
                    .unwrap()
                    .get(transaction_id)
                    .cloned()
                    .unwrap_or_default();
                let mut info = TransactionInfo::new(transaction_id, TransactionStatus::Completed);
                info.signed_messages.push(SignedMessage {
                    content,
                    algorithm: Some("MPC_ECDSA_SECP256K1".into()),
                    public_key: None,
                    signature: MessageSignature {
                        r: alloy::hex::encode(r.to_be_bytes::<32>()),
                        s: alloy::hex::encode(s.to_be_bytes::<32>()),
                        v,
                        full_sig: None,
                    },
                });
                Ok(info)
            }
            Some(Script::NetworkError) => Err(TransferError::Network("connection reset".into())),
            Some(Script::ApiError(status)) => Err(TransferError::Api {
                status,
                body: "scripted".into(),
            }),
            None => Err(TransferError::Api {
                status: 404,
                body: format!("Transaction {} not found", transaction_id),
            }),
        }
    }

    async fn cancel_transaction_by_id(&self, transaction_id: &str) -> Result<()> {
        self.record(ServiceCall::Cancel(transaction_id.to_string()));
        if *self.cancel_fails.lock().unwrap() {
            return Err(TransferError::Api {
                status: 400,
                body: "cannot cancel".into(),
            });
        }
        Ok(())
    }

    async fn get_deposit_addresses(
        &self,
        vault_id: VaultId,
        asset_id: &str,
    ) -> Result<Vec<DepositAddress>> {
        self.record(ServiceCall::DepositAddresses(vault_id, asset_id.to_string()));
        Ok(self.addresses.lock().unwrap().clone())
    }

    async fn get_unspent_inputs(&self, vault_id: VaultId, asset_id: &str) -> Result<Vec<Utxo>> {
        self.record(ServiceCall::UnspentInputs(vault_id, asset_id.to_string()));
        self.utxos.lock().unwrap().clone().ok_or(TransferError::Api {
            status: 404,
            body: "asset not found".into(),
        })
    }

    async fn estimate_fee_for_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<FeeEstimate> {
        self.record(ServiceCall::EstimateFee(request.clone()));
        self.fee_estimate.lock().unwrap().clone().ok_or(TransferError::Api {
            status: 400,
            body: "estimate unavailable".into(),
        })
    }

    async fn get_vault_asset(&self, vault_id: VaultId, asset_id: &str) -> Result<VaultAsset> {
        self.record(ServiceCall::VaultAsset(vault_id, asset_id.to_string()));
        Ok(VaultAsset {
            id: asset_id.to_string(),
            total: Some("1".into()),
            available: Some("1".into()),
            pending: Some("0".into()),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RpcCall {
    Balance(Address),
    Nonce(Address),
    GasPrice,
    ChainId,
    EstimateGas(EvmCall),
    SendRaw(Vec<u8>),
    TokenBalance(Address, Address),
    TokenDecimals(Address),
}

/// Chain node double with fixed answers
pub struct MockRpc {
    pub balance: U256,
    pub nonce: u64,
    pub gas_price: u128,
    pub chain_id: u64,
    /// `None` makes `estimate_gas` fail
    pub gas_estimate: Option<u64>,
    pub token_balance: U256,
    pub token_decimals: u8,
    pub calls: Mutex<Vec<RpcCall>>,
}

impl Default for MockRpc {
    fn default() -> Self {
        Self {
            balance: U256::ZERO,
            nonce: 0,
            gas_price: 1_000_000_000,
            chain_id: 1,
            gas_estimate: Some(50_000),
            token_balance: U256::ZERO,
            token_decimals: 18,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockRpc {
    pub fn calls(&self) -> Vec<RpcCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&RpcCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RpcCall::SendRaw(raw) => Some(raw),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: RpcCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ChainRpc for MockRpc {
    async fn get_balance(&self, address: Address) -> Result<U256> {
        self.record(RpcCall::Balance(address));
        Ok(self.balance)
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64> {
        self.record(RpcCall::Nonce(address));
        Ok(self.nonce)
    }

    async fn get_gas_price(&self) -> Result<u128> {
        self.record(RpcCall::GasPrice);
        Ok(self.gas_price)
    }

    async fn get_chain_id(&self) -> Result<u64> {
        self.record(RpcCall::ChainId);
        Ok(self.chain_id)
    }

    async fn estimate_gas(&self, call: &EvmCall) -> Result<u64> {
        self.record(RpcCall::EstimateGas(call.clone()));
        self.gas_estimate
            .ok_or_else(|| TransferError::GasEstimation("execution reverted".into()))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash> {
        self.record(RpcCall::SendRaw(raw.to_vec()));
        Ok(keccak256(raw))
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        self.record(RpcCall::TokenBalance(token, owner));
        Ok(self.token_balance)
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        self.record(RpcCall::TokenDecimals(token));
        Ok(self.token_decimals)
    }
}
