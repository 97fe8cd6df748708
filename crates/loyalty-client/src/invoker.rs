//! TransactionInvoker: nonce, fee bounds, signing and broadcast for one
//! account, followed by confirmation polling.

use std::fmt;
use std::sync::Arc;

use loyalty_codec::felt_to_u64;
use loyalty_types::{
    Call, ContractAddress, DecodingError, EncodingError, FeeEstimate, ResourceBounds,
    ResourceBoundsMapping, SigningError, TransactionReceipt, TxHash,
};
use thiserror::Error;

use crate::{
    account::{AccountContext, NonceRegistry},
    poller::{ConfirmationPoller, PollConfig, PollError},
    transport::{NetworkClient, TransportError},
    tx_builder::{InvokeBuilder, TxBuilderError},
};

/// Resource bounds used when the caller does not supply any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    pub l1_gas: ResourceBounds,
    pub l2_gas: ResourceBounds,
    pub l1_data_gas: ResourceBounds,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            l1_gas: ResourceBounds {
                max_amount: 50_000,
                max_price_per_unit: 100_000_000_000_000,
            },
            l2_gas: ResourceBounds::ZERO,
            l1_data_gas: ResourceBounds::ZERO,
        }
    }
}

impl FeePolicy {
    pub fn resource_bounds(&self) -> ResourceBoundsMapping {
        ResourceBoundsMapping {
            l1_gas: self.l1_gas,
            l2_gas: self.l2_gas,
            l1_data_gas: self.l1_data_gas,
        }
    }
}

/// Per-invocation knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvokeOptions {
    /// Estimate once and raise the bounds to 120% of the estimate when the
    /// estimate exceeds them.
    pub fee_bump: bool,
    pub resource_bounds: Option<ResourceBoundsMapping>,
}

impl InvokeOptions {
    pub fn with_fee_bump() -> Self {
        Self {
            fee_bump: true,
            ..Self::default()
        }
    }
}

/// Bounds covering 120% of each estimated amount, rounded up, at the
/// estimated unit prices.
pub fn bumped_resource_bounds(estimate: &FeeEstimate) -> ResourceBoundsMapping {
    let bump = |consumed: u64, price: u128| ResourceBounds {
        max_amount: u64::try_from((u128::from(consumed) * 6).div_ceil(5)).unwrap_or(u64::MAX),
        max_price_per_unit: price,
    };
    ResourceBoundsMapping {
        l1_gas: bump(estimate.l1_gas_consumed, estimate.l1_gas_price),
        l2_gas: bump(estimate.l2_gas_consumed, estimate.l2_gas_price),
        l1_data_gas: bump(estimate.l1_data_gas_consumed, estimate.l1_data_gas_price),
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvokeError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Decoding(#[from] DecodingError),
    #[error(transparent)]
    Signing(SigningError),
    #[error(transparent)]
    Builder(TxBuilderError),
    #[error("broadcast failed: {message}")]
    Broadcast { code: Option<i64>, message: String },
    #[error("transaction {tx_hash} not confirmed after {attempts} status checks")]
    ConfirmationTimeout { tx_hash: TxHash, attempts: u32 },
    #[error("transaction {tx_hash} reverted: {reason}")]
    ExecutionReverted { tx_hash: TxHash, reason: String },
    #[error("transaction {tx_hash} rejected: {reason}")]
    Rejected { tx_hash: TxHash, reason: String },
    #[error(transparent)]
    Network(#[from] TransportError),
}

impl InvokeError {
    /// Status code an HTTP boundary should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Encoding(_) | Self::Decoding(_) | Self::Builder(_) => 400,
            Self::Signing(_) => 401,
            Self::Broadcast { .. } | Self::Rejected { .. } => 502,
            Self::ConfirmationTimeout { .. } => 504,
            Self::ExecutionReverted { .. } => 500,
            Self::Network(_) => 503,
        }
    }

    /// Revert reason or raw network message, for diagnostics.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::ExecutionReverted { reason, .. } | Self::Rejected { reason, .. } => {
                Some(reason.as_str())
            }
            Self::Broadcast { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }

    fn broadcast(err: TransportError) -> Self {
        match err {
            TransportError::Rejected { code, message } => Self::Broadcast {
                code: Some(code),
                message,
            },
            other => Self::Broadcast {
                code: None,
                message: other.to_string(),
            },
        }
    }
}

impl From<TxBuilderError> for InvokeError {
    fn from(err: TxBuilderError) -> Self {
        match err {
            TxBuilderError::Signing(err) => Self::Signing(err),
            other => Self::Builder(other),
        }
    }
}

impl From<PollError> for InvokeError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Rejected { tx_hash, reason } => Self::Rejected { tx_hash, reason },
            PollError::ExecutionReverted { tx_hash, reason } => {
                Self::ExecutionReverted { tx_hash, reason }
            }
            PollError::ConfirmationTimeout { tx_hash, attempts } => {
                Self::ConfirmationTimeout { tx_hash, attempts }
            }
            PollError::Transport(err) => Self::Network(err),
        }
    }
}

/// A broadcast transaction whose outcome is not known yet.
pub struct PendingTransaction<N: ?Sized> {
    pub tx_hash: TxHash,
    pub sender: ContractAddress,
    pub nonce: u64,
    pub resource_bounds: ResourceBoundsMapping,
    poller: ConfirmationPoller<N>,
    nonces: NonceRegistry,
}

impl<N: ?Sized> fmt::Debug for PendingTransaction<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTransaction")
            .field("tx_hash", &self.tx_hash)
            .field("sender", &self.sender)
            .field("nonce", &self.nonce)
            .field("resource_bounds", &self.resource_bounds)
            .finish_non_exhaustive()
    }
}

impl<N> PendingTransaction<N>
where
    N: NetworkClient + ?Sized,
{
    /// Poll until the transaction is final. A final outcome, accepted or
    /// rejected, also tells the sender's nonce cache what the network
    /// consumed.
    pub async fn wait(self) -> Result<InvocationOutcome, InvokeError> {
        let receipt = match self.poller.wait_for(self.tx_hash).await {
            Ok(receipt) => receipt,
            Err(err) => {
                match &err {
                    PollError::ExecutionReverted { .. } => {
                        self.nonces.settle(self.sender, self.nonce).await;
                    }
                    PollError::Rejected { .. } => {
                        tracing::warn!(
                            tx_hash = %self.tx_hash,
                            sender = %self.sender,
                            nonce = self.nonce,
                            "transaction rejected; nonce not consumed"
                        );
                        self.nonces.invalidate(self.sender).await;
                    }
                    PollError::ConfirmationTimeout { .. } | PollError::Transport(_) => {}
                }
                return Err(err.into());
            }
        };
        self.nonces.settle(self.sender, self.nonce).await;
        tracing::info!(
            tx_hash = %self.tx_hash,
            nonce = self.nonce,
            block_number = ?receipt.block_number,
            actual_fee = receipt.actual_fee,
            "transaction confirmed"
        );
        Ok(InvocationOutcome {
            tx_hash: self.tx_hash,
            nonce: self.nonce,
            receipt,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutcome {
    pub tx_hash: TxHash,
    pub nonce: u64,
    pub receipt: TransactionReceipt,
}

/// Signs and broadcasts invocations. Clones share one nonce registry, so
/// invocations from the same account are serialized across all of them.
pub struct TransactionInvoker<N: ?Sized> {
    network: Arc<N>,
    nonces: NonceRegistry,
    fee_policy: FeePolicy,
    poller: ConfirmationPoller<N>,
}

impl<N: ?Sized> Clone for TransactionInvoker<N> {
    fn clone(&self) -> Self {
        Self {
            network: Arc::clone(&self.network),
            nonces: self.nonces.clone(),
            fee_policy: self.fee_policy,
            poller: self.poller.clone(),
        }
    }
}

impl<N> TransactionInvoker<N>
where
    N: NetworkClient + ?Sized,
{
    pub fn new(network: Arc<N>, fee_policy: FeePolicy, poll_config: PollConfig) -> Self {
        Self {
            poller: ConfirmationPoller::new(Arc::clone(&network), poll_config),
            network,
            nonces: NonceRegistry::new(),
            fee_policy,
        }
    }

    pub fn network(&self) -> &Arc<N> {
        &self.network
    }

    pub fn fee_policy(&self) -> &FeePolicy {
        &self.fee_policy
    }

    pub fn nonce_registry(&self) -> &NonceRegistry {
        &self.nonces
    }

    /// Build, sign and broadcast `calls` from `account` without waiting for
    /// confirmation. The account's nonce lock is held until the broadcast
    /// answers.
    pub async fn submit(
        &self,
        account: &AccountContext,
        calls: Vec<Call>,
        options: InvokeOptions,
    ) -> Result<PendingTransaction<N>, InvokeError> {
        let sender = account.address();
        let mut guard = self.nonces.acquire(sender).await;
        let network_nonce = felt_to_u64(&self.network.get_nonce(sender).await?, 0)?;
        let nonce = guard.reserve(network_nonce);

        let mut resource_bounds = options
            .resource_bounds
            .unwrap_or_else(|| self.fee_policy.resource_bounds());
        let mut builder = InvokeBuilder::new(account.chain_id())
            .with_sender(sender)
            .with_calls(calls)
            .with_nonce(nonce)
            .with_resource_bounds(resource_bounds);

        if options.fee_bump {
            let estimate = self.network.estimate_fee(&builder.build_unsigned()?).await?;
            let ceiling = resource_bounds.fee_ceiling();
            if estimate.overall_fee > ceiling {
                resource_bounds = bumped_resource_bounds(&estimate);
                tracing::warn!(
                    sender = %sender,
                    nonce,
                    estimated_fee = estimate.overall_fee,
                    old_ceiling = ceiling,
                    new_ceiling = resource_bounds.fee_ceiling(),
                    "fee estimate exceeds bounds; bumping"
                );
                builder = builder.with_resource_bounds(resource_bounds);
            }
        }

        let built = builder.build(account)?;
        match self.network.add_invoke_transaction(&built.tx).await {
            Ok(tx_hash) => {
                guard.commit();
                if tx_hash != built.tx_hash {
                    tracing::warn!(local = %built.tx_hash, network = %tx_hash, "network returned a different transaction hash");
                }
                tracing::info!(tx_hash = %tx_hash, sender = %sender, nonce, "transaction broadcast");
                Ok(PendingTransaction {
                    tx_hash,
                    sender,
                    nonce,
                    resource_bounds,
                    poller: self.poller.clone(),
                    nonces: self.nonces.clone(),
                })
            }
            Err(err) => {
                guard.release();
                tracing::warn!(sender = %sender, nonce, error = %err, "broadcast failed");
                Err(InvokeError::broadcast(err))
            }
        }
    }

    /// Submit and wait for the receipt.
    pub async fn invoke(
        &self,
        account: &AccountContext,
        calls: Vec<Call>,
        options: InvokeOptions,
    ) -> Result<InvocationOutcome, InvokeError> {
        self.submit(account, calls, options).await?.wait().await
    }

    /// Wait for a transaction broadcast earlier, possibly by another process.
    pub async fn wait_for(&self, tx_hash: TxHash) -> Result<TransactionReceipt, InvokeError> {
        Ok(self.poller.wait_for(tx_hash).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use loyalty_network_mock::{codes, DemoScenario, MockRpcError, Outcome, TxScript};
    use loyalty_types::{FeeEstimate, Felt, ResourceBounds, ResourceBoundsMapping};

    use super::{
        bumped_resource_bounds, FeePolicy, InvokeError, InvokeOptions, TransactionInvoker,
    };
    use crate::account::{AccountContext, AccountRole};
    use crate::poller::PollConfig;
    use crate::transport::MockTransport;
    use crate::tx_builder::contract_call;

    struct Harness {
        scenario: DemoScenario,
        transport: MockTransport,
        operator: AccountContext,
    }

    fn harness(configure: impl FnOnce(&mut DemoScenario)) -> Harness {
        let mut scenario = DemoScenario::new().unwrap();
        configure(&mut scenario);
        let transport = MockTransport::new(scenario.network.clone());
        let operator = AccountContext::new(
            scenario.accounts.operator,
            scenario.operator_key.clone(),
            scenario.chain_id,
            AccountRole::Operator,
            None,
        )
        .unwrap();
        Harness {
            scenario,
            transport,
            operator,
        }
    }

    fn invoker(transport: &MockTransport, fee_policy: FeePolicy) -> TransactionInvoker<MockTransport> {
        TransactionInvoker::new(Arc::new(transport.clone()), fee_policy, PollConfig::default())
    }

    fn mint_call(h: &Harness, amount: u64) -> Vec<loyalty_types::Call> {
        vec![contract_call(
            h.scenario.accounts.points,
            "mint",
            vec![h.scenario.accounts.principal.felt(), Felt::from(amount), Felt::ZERO],
        )]
    }

    fn low_fee_policy() -> FeePolicy {
        FeePolicy {
            l1_gas: ResourceBounds {
                max_amount: 500,
                max_price_per_unit: 100,
            },
            ..FeePolicy::default()
        }
    }

    #[test]
    fn bump_rounds_each_amount_up() {
        let bounds = bumped_resource_bounds(&FeeEstimate {
            l1_gas_consumed: 1_001,
            l1_gas_price: 3,
            l2_gas_consumed: 0,
            l2_gas_price: 9,
            l1_data_gas_consumed: 128,
            l1_data_gas_price: 2,
            overall_fee: 3_259,
        });
        assert_eq!(bounds.l1_gas.max_amount, 1_202);
        assert_eq!(bounds.l1_gas.max_price_per_unit, 3);
        assert_eq!(bounds.l2_gas.max_amount, 0);
        assert_eq!(bounds.l1_data_gas.max_amount, 154);
    }

    #[test]
    fn bump_of_large_amounts_clamps_after_rounding() {
        let bounds = bumped_resource_bounds(&FeeEstimate {
            l1_gas_consumed: u64::MAX / 5,
            l1_gas_price: 1,
            l2_gas_consumed: u64::MAX,
            l2_gas_price: 1,
            ..FeeEstimate::default()
        });
        // 1.2 * (MAX / 5) still fits in u64
        assert_eq!(bounds.l1_gas.max_amount, 4_427_218_577_690_292_388);
        assert_eq!(bounds.l2_gas.max_amount, u64::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_invocations_get_sequential_nonces() {
        let h = harness(|s| s.network.nonce_lag = true);
        let transport = h.transport.clone().with_latency(Duration::from_millis(10));
        let invoker = invoker(&transport, FeePolicy::default());

        let (a, b) = tokio::join!(
            invoker.invoke(&h.operator, mint_call(&h, 10), InvokeOptions::default()),
            invoker.invoke(&h.operator, mint_call(&h, 20), InvokeOptions::default()),
        );
        let mut nonces = vec![a.unwrap().nonce, b.unwrap().nonce];
        nonces.sort_unstable();
        assert_eq!(nonces, vec![0, 1]);

        let network = transport.network();
        let network = network.lock().unwrap();
        let mut seen = network.nonces_for(h.scenario.accounts.operator);
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn fee_bump_applies_once_at_120_percent() {
        let h = harness(|_| {});
        let invoker = invoker(&h.transport, low_fee_policy());
        let pending = invoker
            .submit(&h.operator, mint_call(&h, 5), InvokeOptions::with_fee_bump())
            .await
            .unwrap();
        assert_eq!(pending.resource_bounds.fee_ceiling(), 120_000);
        assert_eq!(
            pending.resource_bounds.l1_gas,
            ResourceBounds {
                max_amount: 1_200,
                max_price_per_unit: 100,
            }
        );
        pending.wait().await.unwrap();
        assert_eq!(h.transport.network().lock().unwrap().estimate_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_bump_when_bounds_cover_estimate() {
        let h = harness(|_| {});
        let invoker = invoker(&h.transport, FeePolicy::default());
        let pending = invoker
            .submit(&h.operator, mint_call(&h, 5), InvokeOptions::with_fee_bump())
            .await
            .unwrap();
        assert_eq!(pending.resource_bounds, FeePolicy::default().resource_bounds());
        assert_eq!(h.transport.network().lock().unwrap().estimate_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn low_bounds_without_bump_surface_broadcast_error() {
        let h = harness(|_| {});
        let invoker = invoker(&h.transport, low_fee_policy());
        let err = invoker
            .invoke(&h.operator, mint_call(&h, 5), InvokeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InvokeError::Broadcast { code: Some(code), .. } if code == codes::INSUFFICIENT_MAX_FEE
        ));
        assert_eq!(err.http_status(), 502);
        assert_eq!(h.transport.network().lock().unwrap().estimate_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_broadcast_releases_nonce() {
        let h = harness(|s| {
            s.network.fail_next_broadcast(MockRpcError {
                code: codes::INSUFFICIENT_ACCOUNT_BALANCE,
                message: "Account balance is smaller than the transaction's max_fee".into(),
            })
        });
        let invoker = invoker(&h.transport, FeePolicy::default());
        let err = invoker
            .invoke(&h.operator, mint_call(&h, 5), InvokeOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.detail(),
            Some("Account balance is smaller than the transaction's max_fee")
        );

        let outcome = invoker
            .invoke(&h.operator, mint_call(&h, 5), InvokeOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.nonce, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn revert_reason_is_surfaced() {
        let h = harness(|s| {
            s.network
                .push_script(TxScript::immediate(Outcome::Revert("Caller is not the owner".into())))
        });
        let invoker = invoker(&h.transport, FeePolicy::default());
        let err = invoker
            .invoke(&h.operator, mint_call(&h, 5), InvokeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::ExecutionReverted { ref reason, .. } if reason == "Caller is not the owner"));
        assert_eq!(err.http_status(), 500);
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_is_not_retried() {
        let h = harness(|s| {
            s.network
                .push_script(TxScript::immediate(Outcome::Reject("Invalid nonce".into())))
        });
        let invoker = invoker(&h.transport, FeePolicy::default());
        let err = invoker
            .invoke(&h.operator, mint_call(&h, 5), InvokeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::Rejected { .. }));
        let network = h.transport.network();
        let network = network.lock().unwrap();
        assert_eq!(network.submitted.len(), 1);
        assert_eq!(network.status_polls(network.submitted[0].hash), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_transaction_frees_its_nonce() {
        let h = harness(|s| {
            s.network
                .push_script(TxScript::immediate(Outcome::Reject("validate failed".into())))
        });
        let invoker = invoker(&h.transport, FeePolicy::default());
        let err = invoker
            .invoke(&h.operator, mint_call(&h, 5), InvokeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::Rejected { .. }));
        assert_eq!(invoker.nonce_registry().tracked_addresses(), 0);

        // the network never consumed nonce 0, so the next invocation reuses it
        let outcome = invoker
            .invoke(&h.operator, mint_call(&h, 6), InvokeOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.nonce, 0);
        assert_eq!(
            h.transport.network().lock().unwrap().nonces_for(h.scenario.accounts.operator),
            vec![0, 0]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_invocations_leave_no_slots_behind() {
        let h = harness(|_| {});
        let invoker = invoker(&h.transport, FeePolicy::default());
        for amount in 1..=3 {
            invoker
                .invoke(&h.operator, mint_call(&h, amount), InvokeOptions::default())
                .await
                .unwrap();
        }
        assert_eq!(invoker.nonce_registry().tracked_addresses(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_reported_as_ambiguous() {
        let h = harness(|s| s.network.push_script(TxScript::immediate(Outcome::Never)));
        let invoker = invoker(&h.transport, FeePolicy::default());
        let err = invoker
            .invoke(&h.operator, mint_call(&h, 5), InvokeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::ConfirmationTimeout { attempts: 5, .. }));
        assert_eq!(err.http_status(), 504);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_bounds_override_policy() {
        let h = harness(|_| {});
        let invoker = invoker(&h.transport, low_fee_policy());
        let custom = ResourceBoundsMapping {
            l1_gas: ResourceBounds {
                max_amount: 2_000,
                max_price_per_unit: 100,
            },
            ..ResourceBoundsMapping::default()
        };
        let options = InvokeOptions {
            resource_bounds: Some(custom),
            ..InvokeOptions::default()
        };
        let pending = invoker
            .submit(&h.operator, mint_call(&h, 5), options)
            .await
            .unwrap();
        assert_eq!(pending.resource_bounds, custom);
        pending.wait().await.unwrap();
    }
}
