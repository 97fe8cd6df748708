//! ReadInvoker: read-only contract calls against the latest block.

use std::sync::Arc;

use loyalty_codec::{
    decode_exact, selector_from_name, CollectibleDetails, PointsDetails, Recipe, Record, U256,
    DESCRIBE_ENTRY_POINT,
};
use loyalty_types::{rpc_codes, ContractAddress, DecodingError, Felt, FunctionCall};
use thiserror::Error;

use crate::transport::{NetworkClient, TransportError};

pub const BALANCE_OF_ENTRY_POINT: &str = "balance_of";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("contract {0} not found")]
    ContractNotFound(ContractAddress),
    #[error("entry point `{entry_point}` not found on {contract}")]
    EntryPointNotFound {
        contract: ContractAddress,
        entry_point: String,
    },
    #[error("call to `{entry_point}` on {contract} reverted: {reason}")]
    Reverted {
        contract: ContractAddress,
        entry_point: String,
        reason: String,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error(transparent)]
    Call(#[from] CallError),
    #[error(transparent)]
    Decoding(#[from] DecodingError),
}

pub struct ReadInvoker<N: ?Sized> {
    network: Arc<N>,
}

impl<N: ?Sized> Clone for ReadInvoker<N> {
    fn clone(&self) -> Self {
        Self {
            network: Arc::clone(&self.network),
        }
    }
}

impl<N> ReadInvoker<N>
where
    N: NetworkClient + ?Sized,
{
    pub fn new(network: Arc<N>) -> Self {
        Self { network }
    }

    /// Raw call. No signature, fee or nonce involved.
    pub async fn call(
        &self,
        contract: ContractAddress,
        entry_point: &str,
        calldata: Vec<Felt>,
    ) -> Result<Vec<Felt>, CallError> {
        let request = FunctionCall {
            contract_address: contract,
            entry_point_selector: selector_from_name(entry_point),
            calldata,
        };
        self.network.call(&request).await.map_err(|err| {
            tracing::debug!(contract = %contract, entry_point, error = %err, "call failed");
            classify(err, contract, entry_point)
        })
    }

    /// Call a view and decode its response with `recipe`.
    pub async fn read_record(
        &self,
        contract: ContractAddress,
        entry_point: &str,
        calldata: Vec<Felt>,
        recipe: &Recipe,
    ) -> Result<Record, ReadError> {
        let raw = self.call(contract, entry_point, calldata).await?;
        Ok(recipe.decode(&raw)?)
    }

    pub async fn describe_collectible(
        &self,
        contract: ContractAddress,
    ) -> Result<CollectibleDetails, ReadError> {
        let raw = self.call(contract, DESCRIBE_ENTRY_POINT, Vec::new()).await?;
        Ok(CollectibleDetails::from_response(&raw)?)
    }

    pub async fn describe_points(
        &self,
        contract: ContractAddress,
    ) -> Result<PointsDetails, ReadError> {
        let raw = self.call(contract, DESCRIBE_ENTRY_POINT, Vec::new()).await?;
        Ok(PointsDetails::from_response(&raw)?)
    }

    pub async fn balance_of(
        &self,
        token: ContractAddress,
        owner: ContractAddress,
    ) -> Result<U256, ReadError> {
        let raw = self
            .call(token, BALANCE_OF_ENTRY_POINT, vec![owner.felt()])
            .await?;
        Ok(decode_exact::<U256>(&raw)?)
    }
}

fn classify(err: TransportError, contract: ContractAddress, entry_point: &str) -> CallError {
    match err.code() {
        Some(rpc_codes::CONTRACT_NOT_FOUND) => CallError::ContractNotFound(contract),
        Some(rpc_codes::ENTRYPOINT_NOT_FOUND) => CallError::EntryPointNotFound {
            contract,
            entry_point: entry_point.to_string(),
        },
        Some(rpc_codes::CONTRACT_ERROR) | Some(rpc_codes::TRANSACTION_EXECUTION_ERROR) => {
            let reason = match err {
                TransportError::Rejected { message, .. } => message,
                other => other.to_string(),
            };
            CallError::Reverted {
                contract,
                entry_point: entry_point.to_string(),
                reason,
            }
        }
        _ => CallError::Transport(err),
    }
}
