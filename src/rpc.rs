//! Chain RPC access
//!
//! [`ChainRpc`] is the capability set the EVM flows need from a node;
//! [`AlloyRpc`] implements it over a plain HTTP provider with no fillers
//! (nonce, gas and signing are handled by the flows themselves).

use crate::contracts::IERC20;
use crate::error::{Result, TransferError};
use alloy::network::{Ethereum, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::sol_types::SolCall;
use alloy::transports::http::reqwest::Url;
use std::sync::Arc;

/// Call used for gas estimation
#[derive(Debug, Clone, PartialEq)]
pub struct EvmCall {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

/// Operations consumed from a chain node
pub trait ChainRpc: Send + Sync {
    fn get_balance(
        &self,
        address: Address,
    ) -> impl std::future::Future<Output = Result<U256>> + Send;

    /// Next nonce for `address`, including pending transactions
    fn get_transaction_count(
        &self,
        address: Address,
    ) -> impl std::future::Future<Output = Result<u64>> + Send;

    fn get_gas_price(&self) -> impl std::future::Future<Output = Result<u128>> + Send;

    fn get_chain_id(&self) -> impl std::future::Future<Output = Result<u64>> + Send;

    /// Fails with [`TransferError::GasEstimation`] when the node rejects the estimate
    fn estimate_gas(
        &self,
        call: &EvmCall,
    ) -> impl std::future::Future<Output = Result<u64>> + Send;

    fn send_raw_transaction(
        &self,
        raw: &[u8],
    ) -> impl std::future::Future<Output = Result<TxHash>> + Send;

    fn token_balance(
        &self,
        token: Address,
        owner: Address,
    ) -> impl std::future::Future<Output = Result<U256>> + Send;

    fn token_decimals(
        &self,
        token: Address,
    ) -> impl std::future::Future<Output = Result<u8>> + Send;
}

/// [`ChainRpc`] over an alloy HTTP provider
#[derive(Clone)]
pub struct AlloyRpc {
    provider: Arc<RootProvider<Ethereum>>,
}

impl AlloyRpc {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url: Url = rpc_url
            .parse()
            .map_err(|e| {
                TransferError::Configuration(format!("Invalid RPC URL '{}': {}", rpc_url, e))
            })?;

        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .network::<Ethereum>()
            .connect_http(url);

        Ok(Self {
            provider: Arc::new(provider),
        })
    }

    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Bytes> {
        self.provider
            .call(
                alloy::rpc::types::TransactionRequest::default()
                    .with_to(to)
                    .with_input(data),
            )
            .await
            .map_err(|e| rpc_error("eth_call", e))
    }
}

fn rpc_error(method: &str, err: impl std::fmt::Display) -> TransferError {
    TransferError::Network(format!("{} failed: {}", method, err))
}

impl ChainRpc for AlloyRpc {
    async fn get_balance(&self, address: Address) -> Result<U256> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| rpc_error("eth_getBalance", e))
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64> {
        self.provider
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(|e| rpc_error("eth_getTransactionCount", e))
    }

    async fn get_gas_price(&self) -> Result<u128> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| rpc_error("eth_gasPrice", e))
    }

    async fn get_chain_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| rpc_error("eth_chainId", e))
    }

    async fn estimate_gas(&self, call: &EvmCall) -> Result<u64> {
        let request = alloy::rpc::types::TransactionRequest::default()
            .with_from(call.from)
            .with_to(call.to)
            .with_value(call.value)
            .with_input(call.data.clone());

        self.provider
            .estimate_gas(request)
            .await
            .map_err(|e| TransferError::GasEstimation(e.to_string()))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| rpc_error("eth_sendRawTransaction", e))?;
        Ok(*pending.tx_hash())
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        let call = IERC20::balanceOfCall { account: owner };
        let result = self.call(token, call.abi_encode()).await?;
        IERC20::balanceOfCall::abi_decode_returns(&result)
            .map_err(|e| TransferError::Encoding(format!("Failed to decode balanceOf: {}", e)))
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        let call = IERC20::decimalsCall {};
        let result = self.call(token, call.abi_encode()).await?;
        IERC20::decimalsCall::abi_decode_returns(&result)
            .map_err(|e| TransferError::Encoding(format!("Failed to decode decimals: {}", e)))
    }
}
