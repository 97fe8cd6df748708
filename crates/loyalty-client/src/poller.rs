//! ConfirmationPoller: bounded, fixed-interval wait for a broadcast
//! transaction to reach a final status.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loyalty_types::{FinalityStatus, TransactionReceipt, TxHash};
use thiserror::Error;

use crate::transport::{NetworkClient, TransportError};

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
    /// Upper bound on the whole wait, receipt fetch included.
    pub deadline: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 5,
            deadline: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("transaction {tx_hash} rejected: {reason}")]
    Rejected { tx_hash: TxHash, reason: String },
    #[error("transaction {tx_hash} reverted: {reason}")]
    ExecutionReverted { tx_hash: TxHash, reason: String },
    /// Outcome unknown; query the status again later instead of resubmitting.
    #[error("transaction {tx_hash} not confirmed after {attempts} status checks")]
    ConfirmationTimeout { tx_hash: TxHash, attempts: u32 },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Polls status until the transaction is accepted, rejected or the attempt
/// budget runs out. Dropping the returned future stops polling.
pub struct ConfirmationPoller<N: ?Sized> {
    network: Arc<N>,
    config: PollConfig,
}

impl<N: ?Sized> Clone for ConfirmationPoller<N> {
    fn clone(&self) -> Self {
        Self {
            network: Arc::clone(&self.network),
            config: self.config.clone(),
        }
    }
}

impl<N> ConfirmationPoller<N>
where
    N: NetworkClient + ?Sized,
{
    pub fn new(network: Arc<N>, config: PollConfig) -> Self {
        Self { network, config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub async fn wait_for(&self, tx_hash: TxHash) -> Result<TransactionReceipt, PollError> {
        let attempts = AtomicU32::new(0);
        match tokio::time::timeout(self.config.deadline, self.poll(tx_hash, &attempts)).await {
            Ok(result) => result,
            Err(_) => {
                let attempts = attempts.load(Ordering::Relaxed);
                tracing::warn!(tx_hash = %tx_hash, attempts, deadline = ?self.config.deadline, "confirmation deadline elapsed");
                Err(PollError::ConfirmationTimeout { tx_hash, attempts })
            }
        }
    }

    async fn poll(
        &self,
        tx_hash: TxHash,
        attempts: &AtomicU32,
    ) -> Result<TransactionReceipt, PollError> {
        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            attempts.store(attempt, Ordering::Relaxed);
            if let Some(receipt) = self.check(tx_hash, attempt).await? {
                return Ok(receipt);
            }
            if attempt < max_attempts {
                tokio::time::sleep(self.config.interval).await;
            }
        }
        tracing::warn!(tx_hash = %tx_hash, attempts = max_attempts, "transaction not confirmed");
        Err(PollError::ConfirmationTimeout {
            tx_hash,
            attempts: max_attempts,
        })
    }

    /// One status check. `None` means the outcome is not known yet.
    async fn check(
        &self,
        tx_hash: TxHash,
        attempt: u32,
    ) -> Result<Option<TransactionReceipt>, PollError> {
        let status = match self.network.get_transaction_status(tx_hash).await {
            Ok(status) => status,
            Err(err) if err.is_tx_not_found() || err.is_retryable() => {
                tracing::debug!(tx_hash = %tx_hash, attempt, error = %err, "status not available yet");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        match status.finality {
            FinalityStatus::Received => {
                tracing::debug!(tx_hash = %tx_hash, attempt, "transaction received, not yet accepted");
                Ok(None)
            }
            FinalityStatus::Rejected => {
                let reason = status
                    .failure_reason
                    .unwrap_or_else(|| "rejected by the sequencer".to_string());
                tracing::warn!(tx_hash = %tx_hash, reason = %reason, "transaction rejected");
                Err(PollError::Rejected { tx_hash, reason })
            }
            FinalityStatus::AcceptedOnL2 | FinalityStatus::AcceptedOnL1 => {
                let receipt = match self.network.get_transaction_receipt(tx_hash).await {
                    Ok(receipt) => receipt,
                    Err(err) if err.is_tx_not_found() || err.is_retryable() => {
                        tracing::debug!(tx_hash = %tx_hash, attempt, error = %err, "receipt not available yet");
                        return Ok(None);
                    }
                    Err(err) => return Err(err.into()),
                };
                if !receipt.succeeded() {
                    let reason = receipt
                        .revert_reason
                        .clone()
                        .or(status.failure_reason)
                        .unwrap_or_else(|| "reverted without reason".to_string());
                    tracing::warn!(tx_hash = %tx_hash, reason = %reason, "transaction reverted");
                    return Err(PollError::ExecutionReverted { tx_hash, reason });
                }
                Ok(Some(receipt))
            }
        }
    }
}
