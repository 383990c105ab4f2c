//! Raw signing flow
//!
//! Ordering within one attempt: chain id, then a fresh nonce, then the
//! digest. A resumed attempt pins the nonce and gas price of the original
//! one, so it rebuilds the digest the service already signed.
//!
//! Two transfers from the same address must not be signed concurrently: no
//! account-level lock is held, and the second attempt must only start once
//! the first broadcast has been accepted by the node.

use super::{SignedTransaction, TxRequest, UnsignedTransaction};
use crate::error::{Result, TransferError};
use crate::poller::{PollingConfig, TransactionPoller};
use crate::rpc::ChainRpc;
use crate::service::{SigningService, TransactionInfo, TransactionRequest};
use crate::validation::validate_transaction_id;
use crate::wallet::VaultWallet;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Options for one signing attempt
#[derive(Debug, Clone, Default)]
pub struct SignOptions {
    /// Human-readable note shown in the signing service
    pub note: Option<String>,
    /// Resume an earlier attempt instead of creating a new signing request;
    /// the transaction must pin the nonce and gas price of that attempt
    pub existing_transaction_id: Option<String>,
}

impl SignOptions {
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn resume(mut self, transaction_id: impl Into<String>) -> Self {
        self.existing_transaction_id = Some(transaction_id.into());
        self
    }
}

/// Signs EVM transactions for one vault wallet through the signing service
pub struct RawSigner<S, R> {
    service: Arc<S>,
    rpc: Arc<R>,
    wallet: VaultWallet,
    poller: TransactionPoller<S>,
    chain_id: OnceCell<u64>,
}

impl<S: SigningService, R: ChainRpc> RawSigner<S, R> {
    pub fn new(
        service: Arc<S>,
        rpc: Arc<R>,
        wallet: VaultWallet,
        polling: PollingConfig,
    ) -> Self {
        let poller = TransactionPoller::new(service.clone(), polling);
        Self {
            service,
            rpc,
            wallet,
            poller,
            chain_id: OnceCell::new(),
        }
    }

    pub fn wallet(&self) -> &VaultWallet {
        &self.wallet
    }

    /// Chain id, fetched once per signer
    pub async fn chain_id(&self) -> Result<u64> {
        self.chain_id
            .get_or_try_init(|| self.rpc.get_chain_id())
            .await
            .copied()
    }

    /// Resolve nonce and gas price and build the transaction to sign
    pub async fn prepare(&self, tx: TxRequest) -> Result<UnsignedTransaction> {
        let chain_id = self.chain_id().await?;
        let nonce = match tx.nonce {
            Some(nonce) => nonce,
            None => self.rpc.get_transaction_count(self.wallet.address()).await?,
        };
        let gas_price = match tx.gas_price {
            Some(gas_price) => gas_price,
            None => self.rpc.get_gas_price().await?,
        };

        Ok(UnsignedTransaction {
            chain_id,
            nonce,
            gas_price,
            gas_limit: tx.gas_limit,
            to: tx.to,
            value: tx.value,
            data: tx.data,
        })
    }

    /// Get a signature for `tx` from the signing service and return the signed transaction
    pub async fn sign_raw_transaction(
        &self,
        tx: TxRequest,
        options: SignOptions,
    ) -> Result<(String, SignedTransaction)> {
        if let Some(existing) = &options.existing_transaction_id {
            validate_transaction_id(existing)?;
            if tx.nonce.is_none() || tx.gas_price.is_none() {
                return Err(TransferError::validation(format!(
                    "Resuming {} requires the nonce and gas price of the original attempt",
                    existing
                )));
            }
        }

        let unsigned = self.prepare(tx).await?;
        let digest = alloy::hex::encode(unsigned.signing_hash());

        let transaction_id = match &options.existing_transaction_id {
            Some(existing) => {
                let current = self.service.get_transaction_by_id(existing).await?;
                tracing::info!(
                    "Resuming signing transaction {} (status {})",
                    current.id,
                    current.status
                );
                current.id
            }
            None => {
                let note = options.note.clone().unwrap_or_else(|| {
                    format!(
                        "Raw signing for vault {} ({})",
                        self.wallet.vault_id(),
                        self.wallet.asset_id()
                    )
                });
                let request = TransactionRequest::raw(
                    self.wallet.vault_id(),
                    self.wallet.asset_id(),
                    digest.clone(),
                    note,
                );
                let created = self.service.create_transaction(&request).await?;
                tracing::info!(
                    "Submitted raw signing request {} \
                     (nonce {}, gas price {}, gas limit {}, digest 0x{})",
                    created.id,
                    unsigned.nonce,
                    unsigned.gas_price,
                    unsigned.gas_limit,
                    digest
                );
                created.id
            }
        };

        let completed = self.poller.poll_until_success(&transaction_id).await?;
        let signed = reassemble(unsigned, &digest, &completed)?;

        tracing::info!("Signed transaction {} via {}", signed.hash, transaction_id);
        Ok((transaction_id, signed))
    }
}

/// Attach the first returned signature; it must cover `digest`
fn reassemble(
    unsigned: UnsignedTransaction,
    digest: &str,
    completed: &TransactionInfo,
) -> Result<SignedTransaction> {
    let message = completed
        .signed_messages
        .first()
        .ok_or_else(|| TransferError::Transaction {
            transaction_id: completed.id.clone(),
            status: completed.status.clone(),
            cancelled: false,
            reason: Some("completed but no signature returned".into()),
        })?;

    let content = message.content.trim_start_matches("0x");
    if !content.is_empty() && !content.eq_ignore_ascii_case(digest) {
        return Err(TransferError::Transaction {
            transaction_id: completed.id.clone(),
            status: completed.status.clone(),
            cancelled: false,
            reason: Some(format!(
                "signature covers 0x{} but the transaction digest is 0x{}",
                content, digest
            )),
        });
    }

    unsigned.into_signed(&message.signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockRpc, MockSigningService, RpcCall, Script, ServiceCall};
    use crate::service::Operation;
    use crate::status::TransactionStatus;
    use alloy::primitives::{address, Address, U256};
    use std::time::Duration;

    const VAULT_ADDRESS: Address = address!("0x1111111111111111111111111111111111111111");
    const RECIPIENT: Address = address!("0x2222222222222222222222222222222222222222");

    fn signer(
        service: &Arc<MockSigningService>,
        rpc: MockRpc,
    ) -> RawSigner<MockSigningService, MockRpc> {
        RawSigner::new(
            service.clone(),
            Arc::new(rpc),
            VaultWallet::new(5, "ETH", VAULT_ADDRESS),
            PollingConfig::default()
                .with_interval(Duration::from_millis(10))
                .with_timeout(Duration::from_secs(5)),
        )
    }

    fn signature() -> Script {
        Script::Signed {
            r: U256::from(7u64),
            s: U256::from(9u64),
            v: 1,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_signs_through_service() {
        let service = Arc::new(MockSigningService::new());
        service.script(
            "tx-1",
            vec![Script::Status(TransactionStatus::PendingSignature), signature()],
        );
        let rpc = MockRpc {
            chain_id: 10,
            nonce: 4,
            ..Default::default()
        };
        let signer = signer(&service, rpc);

        let tx = TxRequest::new(RECIPIENT, 21_000).with_value(U256::from(5u64));
        let (id, signed) = signer
            .sign_raw_transaction(tx, SignOptions::default().with_note("payout"))
            .await
            .unwrap();

        assert_eq!(id, "tx-1");
        assert_eq!(signed.v, 10 * 2 + 36);
        assert_eq!(signed.r, U256::from(7u64));
        assert_eq!(signed.transaction.nonce, 4);
        assert_eq!(signed.transaction.gas_price, 1_000_000_000);

        let created = service.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].operation, Operation::Raw);
        assert_eq!(created[0].note.as_deref(), Some("payout"));
        assert_eq!(
            created[0].raw_contents(),
            vec![alloy::hex::encode(signed.transaction.signing_hash()).as_str()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_id_cached_nonce_fetched_every_time() {
        let service = Arc::new(MockSigningService::new());
        service.script("tx-1", vec![signature()]);
        service.script("tx-2", vec![signature()]);
        let signer = signer(&service, MockRpc::default());

        for _ in 0..2 {
            signer
                .sign_raw_transaction(TxRequest::new(RECIPIENT, 21_000), SignOptions::default())
                .await
                .unwrap();
        }

        let rpc = &signer.rpc;
        assert_eq!(rpc.count(|c| matches!(c, RpcCall::ChainId)), 1);
        assert_eq!(
            rpc.count(|c| matches!(c, RpcCall::Nonce(a) if *a == VAULT_ADDRESS)),
            2
        );

        // chain id is resolved before the nonce
        let calls = rpc.calls();
        let chain = calls.iter().position(|c| matches!(c, RpcCall::ChainId)).unwrap();
        let nonce = calls.iter().position(|c| matches!(c, RpcCall::Nonce(_))).unwrap();
        assert!(chain < nonce);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_gas_price_skips_lookup() {
        let service = Arc::new(MockSigningService::new());
        service.script("tx-1", vec![signature()]);
        let signer = signer(&service, MockRpc::default());

        let (_, signed) = signer
            .sign_raw_transaction(
                TxRequest::new(RECIPIENT, 21_000).with_gas_price(77),
                SignOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(signed.transaction.gas_price, 77);
        assert_eq!(signer.rpc.count(|c| matches!(c, RpcCall::GasPrice)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_without_signature_is_fatal() {
        let service = Arc::new(MockSigningService::new());
        service.script("tx-1", vec![Script::Status(TransactionStatus::Completed)]);
        let signer = signer(&service, MockRpc::default());

        let err = signer
            .sign_raw_transaction(TxRequest::new(RECIPIENT, 21_000), SignOptions::default())
            .await
            .unwrap_err();
        match err {
            TransferError::Transaction { transaction_id, reason, .. } => {
                assert_eq!(transaction_id, "tx-1");
                assert_eq!(reason.as_deref(), Some("completed but no signature returned"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_signing_propagates_status() {
        let service = Arc::new(MockSigningService::new());
        service.script("tx-1", vec![Script::Status(TransactionStatus::Rejected)]);
        let signer = signer(&service, MockRpc::default());

        let err = signer
            .sign_raw_transaction(TxRequest::new(RECIPIENT, 21_000), SignOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::Transaction {
                status: TransactionStatus::Rejected,
                cancelled: true,
                ..
            }
        ));
    }

    /// Submit a signing request the way an earlier process would have, then forget it
    async fn submitted_before_restart(
        service: &Arc<MockSigningService>,
        tx: TxRequest,
    ) -> (String, UnsignedTransaction) {
        let first = signer(service, MockRpc { nonce: 3, ..Default::default() });
        let original = first.prepare(tx).await.unwrap();
        let digest = alloy::hex::encode(original.signing_hash());
        let created = service
            .create_transaction(&TransactionRequest::raw(5, "ETH", digest, "payout"))
            .await
            .unwrap();
        (created.id, original)
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_rebuilds_original_digest_after_gas_price_moved() {
        let service = Arc::new(MockSigningService::new());
        let tx = TxRequest::new(RECIPIENT, 21_000).with_value(U256::from(9u64));
        let (id, original) = submitted_before_restart(&service, tx.clone()).await;
        service.script(
            &id,
            vec![
                Script::Status(TransactionStatus::PendingSignature),
                Script::Status(TransactionStatus::PendingSignature),
                signature(),
            ],
        );

        let restarted = signer(
            &service,
            MockRpc {
                nonce: 4,
                gas_price: 1_000_000_001,
                ..Default::default()
            },
        );
        let pinned = tx
            .with_nonce(original.nonce)
            .with_gas_price(original.gas_price);
        let (resumed_id, signed) = restarted
            .sign_raw_transaction(pinned, SignOptions::default().resume(&id))
            .await
            .unwrap();

        assert_eq!(resumed_id, id);
        assert_eq!(signed.transaction, original);
        assert_eq!(service.count(|c| matches!(c, ServiceCall::Create(_))), 1);
        assert_eq!(restarted.rpc.count(|c| matches!(c, RpcCall::GasPrice)), 0);
        assert_eq!(restarted.rpc.count(|c| matches!(c, RpcCall::Nonce(_))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_with_other_fields_fails_digest_check() {
        let service = Arc::new(MockSigningService::new());
        let tx = TxRequest::new(RECIPIENT, 21_000);
        let (id, original) = submitted_before_restart(&service, tx.clone()).await;
        service.script(&id, vec![signature()]);

        let restarted = signer(&service, MockRpc::default());
        let pinned = tx
            .with_nonce(original.nonce)
            .with_gas_price(original.gas_price + 1);
        let err = restarted
            .sign_raw_transaction(pinned, SignOptions::default().resume(&id))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Transaction { .. }));
    }

    #[tokio::test]
    async fn test_resume_requires_pinned_nonce_and_gas_price() {
        let service = Arc::new(MockSigningService::new());
        let signer = signer(&service, MockRpc::default());

        for tx in [
            TxRequest::new(RECIPIENT, 21_000),
            TxRequest::new(RECIPIENT, 21_000).with_nonce(1),
            TxRequest::new(RECIPIENT, 21_000).with_gas_price(1),
        ] {
            let err = signer
                .sign_raw_transaction(tx, SignOptions::default().resume("old-7"))
                .await
                .unwrap_err();
            assert!(matches!(err, TransferError::Validation(_)));
        }
        assert!(service.calls().is_empty());
        assert!(signer.rpc.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_unknown_transaction_fails() {
        let service = Arc::new(MockSigningService::new());
        let signer = signer(&service, MockRpc::default());

        let err = signer
            .sign_raw_transaction(
                TxRequest::new(RECIPIENT, 21_000).with_nonce(0).with_gas_price(1),
                SignOptions::default().resume("missing"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Api { status: 404, .. }));
    }

    #[test]
    fn test_signature_over_other_digest_is_rejected() {
        let unsigned = UnsignedTransaction {
            chain_id: 1,
            nonce: 0,
            gas_price: 1,
            gas_limit: 21_000,
            to: RECIPIENT,
            value: U256::ZERO,
            data: Default::default(),
        };
        let mut completed = TransactionInfo::new("tx-9", TransactionStatus::Completed);
        completed.signed_messages.push(crate::service::SignedMessage {
            content: "00".repeat(32),
            algorithm: None,
            public_key: None,
            signature: crate::service::MessageSignature {
                r: "01".into(),
                s: "02".into(),
                v: 0,
                full_sig: None,
            },
        });
        let digest = alloy::hex::encode(unsigned.signing_hash());

        let err = reassemble(unsigned, &digest, &completed).unwrap_err();
        assert!(matches!(err, TransferError::Transaction { .. }));
    }
}
