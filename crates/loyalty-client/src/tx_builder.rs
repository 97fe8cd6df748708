//! InvokeBuilder: assemble an invoke v3 transaction from calls, nonce and
//! resource bounds, then hash and sign it.

use loyalty_codec::{selector_from_name, Encode};
use loyalty_crypto::compute_invoke_v3_hash;
use loyalty_types::{
    Call, ChainId, ContractAddress, DataAvailabilityMode, Felt, InvokeTransactionV3,
    ResourceBoundsMapping, SigningError, TransactionSigner, TxHash,
};
use thiserror::Error;

/// Transaction builder validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxBuilderError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("transaction has no calls")]
    NoCalls,
    #[error(transparent)]
    Signing(#[from] SigningError),
}

/// Signed transaction and the hash the signature covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltInvoke {
    pub tx: InvokeTransactionV3,
    pub tx_hash: TxHash,
}

/// Build a [`Call`] to `entry_point` with the given encoded arguments.
pub fn contract_call(to: ContractAddress, entry_point: &str, calldata: Vec<Felt>) -> Call {
    Call {
        to,
        selector: selector_from_name(entry_point),
        calldata,
    }
}

/// Account `__execute__` calldata: the call count, then for each call its
/// target, selector, argument count and arguments.
pub fn encode_execute_calldata(calls: &[Call]) -> Vec<Felt> {
    let mut out = Vec::with_capacity(1 + calls.iter().map(|c| 3 + c.calldata.len()).sum::<usize>());
    (calls.len() as u64).encode(&mut out);
    for call in calls {
        out.push(call.to.felt());
        out.push(call.selector);
        call.calldata.encode(&mut out);
    }
    out
}

/// Fluent builder for [`InvokeTransactionV3`].
#[derive(Debug, Clone, Default)]
pub struct InvokeBuilder {
    chain_id: Option<ChainId>,
    sender: Option<ContractAddress>,
    calls: Vec<Call>,
    nonce: Option<u64>,
    resource_bounds: Option<ResourceBoundsMapping>,
    tip: u64,
}

impl InvokeBuilder {
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id: Some(chain_id),
            ..Self::default()
        }
    }

    pub fn with_sender(mut self, sender: ContractAddress) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_call(mut self, call: Call) -> Self {
        self.calls.push(call);
        self
    }

    pub fn with_calls(mut self, calls: impl IntoIterator<Item = Call>) -> Self {
        self.calls.extend(calls);
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn with_resource_bounds(mut self, bounds: ResourceBoundsMapping) -> Self {
        self.resource_bounds = Some(bounds);
        self
    }

    pub fn with_tip(mut self, tip: u64) -> Self {
        self.tip = tip;
        self
    }

    /// Transaction with an empty signature, as sent to fee estimation.
    pub fn build_unsigned(&self) -> Result<InvokeTransactionV3, TxBuilderError> {
        let sender = self.sender.ok_or(TxBuilderError::MissingField("sender"))?;
        let nonce = self.nonce.ok_or(TxBuilderError::MissingField("nonce"))?;
        let resource_bounds = self
            .resource_bounds
            .ok_or(TxBuilderError::MissingField("resource_bounds"))?;
        if self.calls.is_empty() {
            return Err(TxBuilderError::NoCalls);
        }
        Ok(InvokeTransactionV3 {
            sender_address: sender,
            calldata: encode_execute_calldata(&self.calls),
            signature: Vec::new(),
            nonce: Felt::from(nonce),
            resource_bounds,
            tip: self.tip,
            paymaster_data: Vec::new(),
            account_deployment_data: Vec::new(),
            nonce_data_availability_mode: DataAvailabilityMode::L1,
            fee_data_availability_mode: DataAvailabilityMode::L1,
        })
    }

    pub fn build<S>(&self, signer: &S) -> Result<BuiltInvoke, TxBuilderError>
    where
        S: TransactionSigner + ?Sized,
    {
        let chain_id = self
            .chain_id
            .ok_or(TxBuilderError::MissingField("chain_id"))?;
        let mut tx = self.build_unsigned()?;
        let tx_hash = compute_invoke_v3_hash(&tx, chain_id);
        tx.signature = signer.sign_hash(&tx_hash.felt())?.to_vec();
        Ok(BuiltInvoke { tx, tx_hash })
    }
}
