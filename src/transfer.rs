//! Transfer engine
//!
//! Routes a [`TransferRequest`] to one of three actions:
//!
//! - internal: ledger transfer between two vaults, submitted directly
//! - ERC-20: `transfer(to, amount)` call signed through [`RawSigner`] and broadcast
//! - native: value transfer signed through [`RawSigner`] and broadcast
//!
//! All amounts are converted to smallest units with integer arithmetic
//! ([`parse_units`]). A full-balance request is resolved against the chain at
//! execution time.
//!
//! An engine built with [`TransferEngine::ledger`] has no chain connection and
//! only runs exact-amount internal transfers.

use crate::constants::{
    buffered_gas, format_units, parse_units, NATIVE_DECIMALS, SIMPLE_TRANSFER_GAS_LIMIT,
};
use crate::contracts::IERC20;
use crate::error::{Result, TransferError};
use crate::note::transfer_note;
use crate::poller::{PollingConfig, TransactionPoller};
use crate::rpc::{ChainRpc, EvmCall};
use crate::service::{FeeEstimate, PeerPath, SigningService, TransactionRequest};
use crate::signer::{RawSigner, SignOptions, SignedTransaction, TxRequest};
use crate::types::{
    Amount, ResumeSigning, TransferIntent, TransferOutcome, TransferRequest, VaultId,
};
use crate::wallet::VaultWallet;
use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use std::sync::Arc;

/// Chain connection used by the on-chain routes
struct OnChain<S, R> {
    rpc: Arc<R>,
    signer: RawSigner<S, R>,
}

/// Moves funds out of one vault
///
/// Transfers from the same engine must be awaited one after another: each
/// signing attempt reads the pending nonce, so two concurrent transfers from
/// the same address would sign the same nonce.
pub struct TransferEngine<S, R> {
    service: Arc<S>,
    vault_id: VaultId,
    asset_id: String,
    chain: Option<OnChain<S, R>>,
    poller: TransactionPoller<S>,
}

impl<S: SigningService, R: ChainRpc> TransferEngine<S, R> {
    pub fn new(service: Arc<S>, rpc: Arc<R>, wallet: VaultWallet, polling: PollingConfig) -> Self {
        let vault_id = wallet.vault_id();
        let asset_id = wallet.asset_id().to_string();
        let signer = RawSigner::new(service.clone(), rpc.clone(), wallet, polling.clone());
        let poller = TransactionPoller::new(service.clone(), polling);
        Self {
            service,
            vault_id,
            asset_id,
            chain: Some(OnChain { rpc, signer }),
            poller,
        }
    }

    /// Engine for exact-amount internal transfers, without a chain connection
    pub fn ledger(
        service: Arc<S>,
        vault_id: VaultId,
        asset_id: impl Into<String>,
        polling: PollingConfig,
    ) -> Self {
        let poller = TransactionPoller::new(service.clone(), polling);
        Self {
            service,
            vault_id,
            asset_id: asset_id.into(),
            chain: None,
            poller,
        }
    }

    pub fn wallet(&self) -> Option<&VaultWallet> {
        self.chain.as_ref().map(|chain| chain.signer.wallet())
    }

    pub fn signer(&self) -> Option<&RawSigner<S, R>> {
        self.chain.as_ref().map(|chain| &chain.signer)
    }

    /// Validate, route and execute one transfer
    ///
    /// With [`TransferRequest::resume`] set, the earlier signing attempt is
    /// continued instead of submitting a new one.
    pub async fn transfer(&self, request: &TransferRequest) -> Result<TransferOutcome> {
        let intent = request.intent()?;
        self.check_source(&intent)?;
        let reference = request.reference.as_deref();
        let resume = request.resume.as_ref();

        match &intent {
            TransferIntent::Internal {
                destination_vault,
                contract,
                ..
            } => {
                self.internal_transfer(&intent, *destination_vault, *contract, reference, resume)
                    .await
            }
            TransferIntent::Erc20 {
                recipient,
                contract,
                amount,
                ..
            } => {
                self.erc20_transfer(&intent, *recipient, *contract, amount, reference, resume)
                    .await
            }
            TransferIntent::Native {
                recipient, amount, ..
            } => {
                self.native_transfer(&intent, *recipient, amount, reference, resume)
                    .await
            }
        }
    }

    /// Ask the signing service for a fee quote
    ///
    /// Failures are reported as [`TransferError::GasEstimation`] so callers can
    /// fall back to a manual fee.
    pub async fn estimate_fee(&self, request: &TransactionRequest) -> Result<FeeEstimate> {
        self.service
            .estimate_fee_for_transaction(request)
            .await
            .map_err(|e| {
                tracing::warn!("Fee estimation for {} failed: {}", request.asset_id, e);
                TransferError::GasEstimation(format!("Fee estimation failed: {}", e))
            })
    }

    fn check_source(&self, intent: &TransferIntent) -> Result<()> {
        if intent.source_vault() != self.vault_id || intent.asset_id() != self.asset_id {
            return Err(TransferError::validation(format!(
                "Request for vault {} / {} does not match engine {} / {}",
                intent.source_vault(),
                intent.asset_id(),
                self.vault_id,
                self.asset_id
            )));
        }
        Ok(())
    }

    fn chain(&self) -> Result<&OnChain<S, R>> {
        self.chain.as_ref().ok_or_else(|| {
            TransferError::Configuration(format!(
                "No chain connection for vault {} / {}; only exact internal transfers are possible",
                self.vault_id, self.asset_id
            ))
        })
    }

    async fn internal_transfer(
        &self,
        intent: &TransferIntent,
        destination_vault: u64,
        contract: Option<Address>,
        reference: Option<&str>,
        resume: Option<&ResumeSigning>,
    ) -> Result<TransferOutcome> {
        if let Some(resume) = resume {
            let Amount::Exact(amount) = intent.amount() else {
                return Err(TransferError::validation(
                    "Resuming an internal transfer requires the exact amount it moved",
                ));
            };
            tracing::info!(
                "Resuming internal transfer {} to vault {}",
                resume.transaction_id,
                destination_vault
            );
            let transaction = self.poller.poll_until_success(&resume.transaction_id).await?;
            return Ok(TransferOutcome::Internal {
                transaction,
                amount: amount.clone(),
            });
        }

        let amount = match intent.amount() {
            Amount::Exact(amount) => amount.clone(),
            Amount::FullBalance => self.spendable_for_ledger(contract).await?,
        };

        let request = TransactionRequest::transfer(
            intent.source_vault(),
            PeerPath::vault(destination_vault),
            intent.asset_id(),
            amount.clone(),
        )
        .with_note(transfer_note(intent, &amount, reference));

        let created = self.service.create_transaction(&request).await?;
        tracing::info!(
            "Submitted internal transfer {} of {} {} to vault {}",
            created.id,
            amount,
            intent.asset_id(),
            destination_vault
        );

        let transaction = self.poller.poll_until_success(&created.id).await?;
        Ok(TransferOutcome::Internal { transaction, amount })
    }

    /// Maximum amount a full-balance ledger transfer may move, in human units
    async fn spendable_for_ledger(&self, contract: Option<Address>) -> Result<String> {
        let chain = self.chain()?;
        let owner = chain.signer.wallet().address();

        if let Some(token) = contract {
            let balance = chain.rpc.token_balance(token, owner).await?;
            let decimals = chain.rpc.token_decimals(token).await?;
            if balance.is_zero() {
                return Err(TransferError::InsufficientBalance {
                    required: "more than 0".into(),
                    available: "0".into(),
                });
            }
            return Ok(format_units(balance, decimals));
        }

        let balance = chain.rpc.get_balance(owner).await?;
        let gas_price = chain.rpc.get_gas_price().await?;
        let spendable = balance_after_fee(balance, simple_transfer_fee(gas_price))?;
        Ok(format_units(spendable, NATIVE_DECIMALS))
    }

    async fn erc20_transfer(
        &self,
        intent: &TransferIntent,
        recipient: Address,
        contract: Address,
        amount: &Amount,
        reference: Option<&str>,
        resume: Option<&ResumeSigning>,
    ) -> Result<TransferOutcome> {
        let chain = self.chain()?;
        let pinned_gas_limit = match resume {
            Some(resume) => Some(resume.gas_limit.ok_or_else(|| {
                TransferError::validation(format!(
                    "Resuming {} requires the gas limit of the original attempt",
                    resume.transaction_id
                ))
            })?),
            None => None,
        };

        let owner = chain.signer.wallet().address();
        let balance = chain.rpc.token_balance(contract, owner).await?;
        let decimals = chain.rpc.token_decimals(contract).await?;

        let value = match amount {
            Amount::FullBalance => balance,
            Amount::Exact(amount) => parse_units(amount, decimals)?,
        };
        if value.is_zero() || value > balance {
            return Err(TransferError::InsufficientBalance {
                required: format_units(value, decimals),
                available: format_units(balance, decimals),
            });
        }

        let data = IERC20::transferCall {
            to: recipient,
            amount: value,
        }
        .abi_encode();

        let gas_limit = match pinned_gas_limit {
            Some(gas_limit) => gas_limit,
            None => {
                let estimate = chain
                    .rpc
                    .estimate_gas(&EvmCall {
                        from: owner,
                        to: contract,
                        value: U256::ZERO,
                        data: data.clone().into(),
                    })
                    .await?;
                let gas_limit = buffered_gas(estimate);
                tracing::debug!("Gas estimate {} buffered to {}", estimate, gas_limit);
                gas_limit
            }
        };

        let human = format_units(value, decimals);
        let mut tx = TxRequest::new(contract, gas_limit).with_data(data);
        if let Some(gas_price) = resume.and_then(|r| r.gas_price) {
            tx = tx.with_gas_price(gas_price);
        }
        let (tx, options) = attempt(tx, transfer_note(intent, &human, reference), resume);
        self.sign_and_broadcast(chain, tx, options, value).await
    }

    async fn native_transfer(
        &self,
        intent: &TransferIntent,
        recipient: Address,
        amount: &Amount,
        reference: Option<&str>,
        resume: Option<&ResumeSigning>,
    ) -> Result<TransferOutcome> {
        let chain = self.chain()?;
        let balance = chain.rpc.get_balance(chain.signer.wallet().address()).await?;
        if balance.is_zero() {
            return Err(TransferError::InsufficientBalance {
                required: match amount {
                    Amount::Exact(amount) => amount.clone(),
                    Amount::FullBalance => "more than 0".into(),
                },
                available: "0".into(),
            });
        }

        // the fee reserved here is the fee signed below
        let gas_price = match resume.and_then(|r| r.gas_price) {
            Some(gas_price) => gas_price,
            None => chain.rpc.get_gas_price().await?,
        };
        let fee = simple_transfer_fee(gas_price);

        let value = match amount {
            Amount::FullBalance => balance_after_fee(balance, fee)?,
            Amount::Exact(amount) => {
                let value = parse_units(amount, NATIVE_DECIMALS)?;
                let required = value.saturating_add(fee);
                if required > balance {
                    return Err(TransferError::InsufficientBalance {
                        required: format_units(required, NATIVE_DECIMALS),
                        available: format_units(balance, NATIVE_DECIMALS),
                    });
                }
                value
            }
        };

        let human = format_units(value, NATIVE_DECIMALS);
        let tx = TxRequest::new(recipient, SIMPLE_TRANSFER_GAS_LIMIT)
            .with_value(value)
            .with_gas_price(gas_price);
        let (tx, options) = attempt(tx, transfer_note(intent, &human, reference), resume);
        self.sign_and_broadcast(chain, tx, options, value).await
    }

    async fn sign_and_broadcast(
        &self,
        chain: &OnChain<S, R>,
        tx: TxRequest,
        options: SignOptions,
        amount: U256,
    ) -> Result<TransferOutcome> {
        let (signing_transaction_id, signed) =
            chain.signer.sign_raw_transaction(tx, options).await?;
        let tx_hash = broadcast(chain.rpc.as_ref(), &signed).await?;

        Ok(TransferOutcome::Broadcast {
            signing_transaction_id,
            tx_hash,
            amount,
            raw_transaction: signed.to_hex(),
        })
    }
}

/// Signing options for a new attempt, or a resumed one pinned to its nonce
fn attempt(
    tx: TxRequest,
    note: String,
    resume: Option<&ResumeSigning>,
) -> (TxRequest, SignOptions) {
    let options = SignOptions::default().with_note(note);
    match resume {
        Some(resume) => {
            let tx = match resume.nonce {
                Some(nonce) => tx.with_nonce(nonce),
                None => tx,
            };
            (tx, options.resume(resume.transaction_id.clone()))
        }
        None => (tx, options),
    }
}

async fn broadcast<R: ChainRpc>(
    rpc: &R,
    signed: &SignedTransaction,
) -> Result<alloy::primitives::TxHash> {
    let tx_hash = rpc.send_raw_transaction(&signed.raw).await?;
    if tx_hash != signed.hash {
        tracing::warn!(
            "Node returned hash {} for transaction {}",
            tx_hash,
            signed.hash
        );
    }
    tracing::info!(
        "Broadcast transaction {} (nonce {})",
        tx_hash,
        signed.transaction.nonce
    );
    Ok(tx_hash)
}

fn simple_transfer_fee(gas_price: u128) -> U256 {
    U256::from(gas_price).saturating_mul(U256::from(SIMPLE_TRANSFER_GAS_LIMIT))
}

/// `balance - fee`; nothing left to send is an insufficient balance
fn balance_after_fee(balance: U256, fee: U256) -> Result<U256> {
    match balance.checked_sub(fee) {
        Some(remaining) if !remaining.is_zero() => Ok(remaining),
        _ => Err(TransferError::InsufficientBalance {
            required: format!("{} (fee)", format_units(fee, NATIVE_DECIMALS)),
            available: format_units(balance, NATIVE_DECIMALS),
        }),
    }
}
