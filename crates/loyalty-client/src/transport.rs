use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use loyalty_network_mock::{MockNetwork, MockRpcError};
use loyalty_types::{
    rpc_codes, ChainId, ContractAddress, FeeEstimate, Felt, FunctionCall, InvokeTransactionV3,
    TransactionReceipt, TransactionStatus, TxHash,
};
use rand::Rng;
use thiserror::Error;
use tokio::time::Instant;

/// Retry behavior for transport operations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 100,
            max_backoff_ms: 2_000,
            jitter_ms: 50,
        }
    }
}

/// Transport configuration for the JSON-RPC client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub rpc_url: String,
    pub request_timeout_ms: u64,
    pub retry_policy: RetryPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:5050/rpc".to_string(),
            request_timeout_ms: 10_000,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// Error model for transport operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("node unavailable: {0}")]
    Unavailable(String),
    #[error("request rejected: code={code}, message={message}")]
    Rejected { code: i64, message: String },
    #[error("malformed response: {0}")]
    Validation(String),
    #[error("internal transport error: {0}")]
    Internal(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Unavailable(_))
    }

    /// JSON-RPC error code, when the node answered with one.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_tx_not_found(&self) -> bool {
        self.code() == Some(rpc_codes::TXN_HASH_NOT_FOUND)
    }
}

impl From<MockRpcError> for TransportError {
    fn from(err: MockRpcError) -> Self {
        Self::Rejected {
            code: err.code,
            message: err.message,
        }
    }
}

/// Execution-layer interface. Implementations may use the in-memory mock or
/// JSON-RPC over HTTP.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    async fn chain_id(&self) -> Result<ChainId, TransportError>;

    /// Next nonce the account will accept, including pending transactions.
    async fn get_nonce(&self, address: ContractAddress) -> Result<Felt, TransportError>;

    async fn call(&self, request: &FunctionCall) -> Result<Vec<Felt>, TransportError>;

    async fn estimate_fee(&self, tx: &InvokeTransactionV3)
        -> Result<FeeEstimate, TransportError>;

    async fn add_invoke_transaction(
        &self,
        tx: &InvokeTransactionV3,
    ) -> Result<TxHash, TransportError>;

    async fn get_transaction_status(
        &self,
        hash: TxHash,
    ) -> Result<TransactionStatus, TransportError>;

    async fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<TransactionReceipt, TransportError>;
}

/// In-memory transport backed by `MockNetwork`, used for tests and demos.
#[derive(Clone)]
pub struct MockTransport {
    network: Arc<Mutex<MockNetwork>>,
    latency: Option<Duration>,
}

impl MockTransport {
    pub fn new(network: MockNetwork) -> Self {
        Self {
            network: Arc::new(Mutex::new(network)),
            latency: None,
        }
    }

    /// Sleep before every request so concurrent callers interleave.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Shared handle for inspecting or scripting the network.
    pub fn network(&self) -> Arc<Mutex<MockNetwork>> {
        Arc::clone(&self.network)
    }

    async fn with_network<R>(
        &self,
        f: impl FnOnce(&mut MockNetwork) -> Result<R, MockRpcError>,
    ) -> Result<R, TransportError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut lock = self
            .network
            .lock()
            .map_err(|_| TransportError::Unavailable("mutex poisoned".to_string()))?;
        f(&mut lock).map_err(TransportError::from)
    }
}

#[async_trait]
impl NetworkClient for MockTransport {
    async fn chain_id(&self) -> Result<ChainId, TransportError> {
        self.with_network(|network| Ok(network.chain_id())).await
    }

    async fn get_nonce(&self, address: ContractAddress) -> Result<Felt, TransportError> {
        self.with_network(|network| network.get_nonce(address)).await
    }

    async fn call(&self, request: &FunctionCall) -> Result<Vec<Felt>, TransportError> {
        self.with_network(|network| network.call(request)).await
    }

    async fn estimate_fee(
        &self,
        tx: &InvokeTransactionV3,
    ) -> Result<FeeEstimate, TransportError> {
        self.with_network(|network| network.estimate_fee(tx)).await
    }

    async fn add_invoke_transaction(
        &self,
        tx: &InvokeTransactionV3,
    ) -> Result<TxHash, TransportError> {
        self.with_network(|network| network.add_invoke(tx)).await
    }

    async fn get_transaction_status(
        &self,
        hash: TxHash,
    ) -> Result<TransactionStatus, TransportError> {
        self.with_network(|network| network.transaction_status(hash))
            .await
    }

    async fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<TransactionReceipt, TransportError> {
        self.with_network(|network| network.transaction_receipt(hash))
            .await
    }
}

/// Run `op` until it succeeds, fails permanently, or the policy or deadline
/// is exhausted.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    timeout: Duration,
    mut op: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, TransportError>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() {
                    return Err(err);
                }
                if attempt >= policy.max_retries {
                    return Err(err);
                }
                let now = Instant::now();
                if now >= deadline {
                    return Err(TransportError::Timeout);
                }

                let delay = backoff_delay_ms(attempt, policy);
                attempt += 1;
                let remaining = deadline.saturating_duration_since(now).as_millis() as u64;
                if delay > remaining {
                    return Err(TransportError::Timeout);
                }
                tracing::debug!(attempt, delay_ms = delay, error = %err, "retrying request");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }
    }
}

fn backoff_delay_ms(attempt: u32, policy: &RetryPolicy) -> u64 {
    let exp = policy
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    let capped = exp.min(policy.max_backoff_ms);
    let jitter = if policy.jitter_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=policy.jitter_ms)
    };
    capped.saturating_add(jitter)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use loyalty_network_mock::DemoScenario;
    use loyalty_types::{rpc_codes, ContractAddress, Felt};

    use super::{retry_with_backoff, MockTransport, NetworkClient, RetryPolicy, TransportError};

    fn make_transport() -> MockTransport {
        MockTransport::new(DemoScenario::new().unwrap().network)
    }

    #[tokio::test]
    async fn mock_transport_serves_nonce_and_chain_id() {
        let scenario = DemoScenario::new().unwrap();
        let operator = scenario.accounts.operator;
        let transport = MockTransport::new(scenario.network);
        assert_eq!(transport.get_nonce(operator).await.unwrap(), Felt::ZERO);
        assert_eq!(transport.chain_id().await.unwrap().to_string(), "SN_SEPOLIA");
    }

    #[tokio::test]
    async fn mock_errors_keep_rpc_codes() {
        let transport = make_transport();
        let err = transport
            .get_nonce(ContractAddress::new(Felt::from(0xdeadu64)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(rpc_codes::CONTRACT_NOT_FOUND));
        assert!(!err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_until_success() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let policy = RetryPolicy {
            max_retries: 3,
            ..RetryPolicy::default()
        };
        let value = retry_with_backoff(&policy, Duration::from_secs(30), move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(TransportError::Unavailable("503".to_string()))
            } else {
                Ok(7u32)
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_retry_rejections() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let err = retry_with_backoff(&RetryPolicy::default(), Duration::from_secs(30), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(TransportError::Rejected {
                code: rpc_codes::INVALID_TRANSACTION_NONCE,
                message: "nonce".to_string(),
            })
        })
        .await
        .unwrap_err();
        assert_eq!(err.code(), Some(rpc_codes::INVALID_TRANSACTION_NONCE));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let err = retry_with_backoff(&RetryPolicy::default(), Duration::from_secs(30), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(TransportError::Timeout)
        })
        .await
        .unwrap_err();
        assert_eq!(err, TransportError::Timeout);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
