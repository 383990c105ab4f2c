//! Transaction poller
//!
//! Drives a remote transaction to a terminal status. Every loop is bounded by
//! a timeout measured on the monotonic clock. A local timeout only stops
//! watching: the remote transaction may still complete, and no cancel is
//! sent for it. Cancellation is requested only when the service itself
//! reports a failure status.

use crate::constants::{DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};
use crate::error::{Result, TransferError};
use crate::service::{SigningService, TransactionInfo};
use crate::status::{StatusBucket, TransactionStatus};
use crate::validation::validate_transaction_id;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Called with the transaction id and status after every successful fetch
pub type StatusCallback = Arc<dyn Fn(&str, &TransactionStatus) + Send + Sync>;

/// Polling options
#[derive(Clone)]
pub struct PollingConfig {
    /// Delay between two status fetches
    pub interval: Duration,
    /// Overall bound on one polling loop
    pub timeout: Duration,
    /// Request cancellation when the service reports FAILED/BLOCKED/REJECTED
    pub auto_cancel: bool,
    pub on_status_change: Option<StatusCallback>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
            auto_cancel: true,
            on_status_change: None,
        }
    }
}

impl std::fmt::Debug for PollingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingConfig")
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("auto_cancel", &self.auto_cancel)
            .field("on_status_change", &self.on_status_change.is_some())
            .finish()
    }
}

impl PollingConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_auto_cancel(mut self, auto_cancel: bool) -> Self {
        self.auto_cancel = auto_cancel;
        self
    }

    pub fn on_status_change(
        mut self,
        callback: impl Fn(&str, &TransactionStatus) + Send + Sync + 'static,
    ) -> Self {
        self.on_status_change = Some(Arc::new(callback));
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(TransferError::validation("Polling interval must be positive"));
        }
        if self.timeout.is_zero() {
            return Err(TransferError::validation("Polling timeout must be positive"));
        }
        Ok(())
    }
}

/// Outcome of one polling loop that reached a terminal status
#[derive(Debug, Clone)]
pub struct PollingResult {
    pub final_status: TransactionStatus,
    /// Last fetched snapshot
    pub transaction: TransactionInfo,
    /// Whether a cancel request for a failed transaction was acknowledged
    pub cancelled: bool,
}

impl PollingResult {
    pub fn bucket(&self) -> StatusBucket {
        self.final_status.classify()
    }
}

pub struct TransactionPoller<S> {
    service: Arc<S>,
    config: PollingConfig,
}

impl<S: SigningService> TransactionPoller<S> {
    pub fn new(service: Arc<S>, config: PollingConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    /// Poll until the transaction reaches a terminal bucket or the timeout expires
    pub async fn poll(&self, transaction_id: &str) -> Result<PollingResult> {
        validate_transaction_id(transaction_id)?;
        self.config.validate()?;

        let started = Instant::now();
        let mut last_status: Option<TransactionStatus> = None;

        loop {
            match self.service.get_transaction_by_id(transaction_id).await {
                Ok(transaction) => {
                    if last_status.as_ref() != Some(&transaction.status) {
                        tracing::debug!(
                            "Transaction {} status: {}",
                            transaction_id,
                            transaction.status
                        );
                    }
                    if let Some(callback) = &self.config.on_status_change {
                        callback(transaction_id, &transaction.status);
                    }

                    if transaction.status.is_terminal() {
                        return Ok(self.finish(transaction).await);
                    }
                    last_status = Some(transaction.status);
                }
                Err(err) if err.is_transient() => {
                    tracing::warn!(
                        "Transient error polling transaction {}: {}",
                        transaction_id,
                        err
                    );
                }
                Err(err) => return Err(err),
            }

            let elapsed = started.elapsed();
            if elapsed >= self.config.timeout {
                tracing::warn!(
                    "Gave up on transaction {} after {:?}; remote outcome unknown",
                    transaction_id,
                    elapsed
                );
                return Err(TransferError::Timeout {
                    transaction_id: transaction_id.to_string(),
                    timeout: self.config.timeout,
                    last_status,
                });
            }

            let remaining = self.config.timeout - elapsed;
            tokio::time::sleep(self.config.interval.min(remaining)).await;
        }
    }

    /// Poll and require the success bucket
    pub async fn poll_until_success(&self, transaction_id: &str) -> Result<TransactionInfo> {
        let result = self.poll(transaction_id).await?;
        match result.bucket() {
            StatusBucket::Success => Ok(result.transaction),
            _ => Err(TransferError::Transaction {
                transaction_id: transaction_id.to_string(),
                status: result.final_status,
                cancelled: result.cancelled,
                reason: result.transaction.sub_status,
            }),
        }
    }

    /// Poll several transactions concurrently; results keep input order
    pub async fn poll_many(&self, transaction_ids: &[String]) -> Vec<Result<PollingResult>> {
        futures::future::join_all(transaction_ids.iter().map(|id| self.poll(id))).await
    }

    async fn finish(&self, transaction: TransactionInfo) -> PollingResult {
        let final_status = transaction.status.clone();
        let mut cancelled = false;

        match final_status.classify() {
            StatusBucket::Failure if self.config.auto_cancel => {
                match self.service.cancel_transaction_by_id(&transaction.id).await {
                    Ok(()) => {
                        tracing::info!("Cancelled failed transaction {}", transaction.id);
                        cancelled = true;
                    }
                    Err(err) => {
                        tracing::warn!(
                            "Failed to cancel transaction {} ({}): {}",
                            transaction.id,
                            final_status,
                            err
                        );
                    }
                }
            }
            StatusBucket::Success => {
                tracing::info!("Transaction {} completed", transaction.id);
            }
            bucket => {
                tracing::info!(
                    "Transaction {} ended in {:?} with status {}",
                    transaction.id,
                    bucket,
                    final_status
                );
            }
        }

        PollingResult {
            final_status,
            transaction,
            cancelled,
        }
    }
}
