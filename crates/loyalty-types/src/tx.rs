//! Invoke v3 transaction model and the network's fee/status/receipt shapes.

use serde::{Deserialize, Serialize};
use starknet_types_core::felt::Felt;

use crate::{ContractAddress, TxHash};

/// A single contract call bundled into an account `__execute__`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub to: ContractAddress,
    pub selector: Felt,
    pub calldata: Vec<Felt>,
}

/// A read-only invocation against a contract entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub contract_address: ContractAddress,
    pub entry_point_selector: Felt,
    pub calldata: Vec<Felt>,
}

/// Upper bound on one resource consumed by a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBounds {
    pub max_amount: u64,
    pub max_price_per_unit: u128,
}

impl ResourceBounds {
    pub const ZERO: Self = Self {
        max_amount: 0,
        max_price_per_unit: 0,
    };

    pub fn max_fee(&self) -> u128 {
        (self.max_amount as u128).saturating_mul(self.max_price_per_unit)
    }
}

/// Bounds for every resource the network meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBoundsMapping {
    pub l1_gas: ResourceBounds,
    pub l2_gas: ResourceBounds,
    pub l1_data_gas: ResourceBounds,
}

impl ResourceBoundsMapping {
    /// Total fee the transaction may be charged under these bounds.
    pub fn fee_ceiling(&self) -> u128 {
        self.l1_gas
            .max_fee()
            .saturating_add(self.l2_gas.max_fee())
            .saturating_add(self.l1_data_gas.max_fee())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataAvailabilityMode {
    #[default]
    L1,
    L2,
}

impl DataAvailabilityMode {
    pub fn as_u64(self) -> u64 {
        match self {
            Self::L1 => 0,
            Self::L2 => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::L1 => "L1",
            Self::L2 => "L2",
        }
    }
}

/// Stark ECDSA signature over a transaction hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarkSignature {
    pub r: Felt,
    pub s: Felt,
}

impl StarkSignature {
    pub fn to_vec(self) -> Vec<Felt> {
        vec![self.r, self.s]
    }
}

/// Version 3 invoke transaction as broadcast to the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeTransactionV3 {
    pub sender_address: ContractAddress,
    pub calldata: Vec<Felt>,
    pub signature: Vec<Felt>,
    pub nonce: Felt,
    pub resource_bounds: ResourceBoundsMapping,
    pub tip: u64,
    pub paymaster_data: Vec<Felt>,
    pub account_deployment_data: Vec<Felt>,
    pub nonce_data_availability_mode: DataAvailabilityMode,
    pub fee_data_availability_mode: DataAvailabilityMode,
}

/// Fee estimate returned by the network for a simulated transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub l1_gas_consumed: u64,
    pub l1_gas_price: u128,
    pub l2_gas_consumed: u64,
    pub l2_gas_price: u128,
    pub l1_data_gas_consumed: u64,
    pub l1_data_gas_price: u128,
    pub overall_fee: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalityStatus {
    Received,
    Rejected,
    AcceptedOnL2,
    AcceptedOnL1,
}

impl FinalityStatus {
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::AcceptedOnL2 | Self::AcceptedOnL1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Succeeded,
    Reverted,
}

/// Snapshot returned by a transaction status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatus {
    pub finality: FinalityStatus,
    pub execution: Option<ExecutionStatus>,
    pub failure_reason: Option<String>,
}

/// Execution result of an accepted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    pub finality: FinalityStatus,
    pub execution_status: ExecutionStatus,
    pub revert_reason: Option<String>,
    pub actual_fee: u128,
    pub block_number: Option<u64>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.execution_status == ExecutionStatus::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::{ResourceBounds, ResourceBoundsMapping};

    #[test]
    fn fee_ceiling_sums_all_resources() {
        let bounds = ResourceBoundsMapping {
            l1_gas: ResourceBounds {
                max_amount: 10,
                max_price_per_unit: 7,
            },
            l2_gas: ResourceBounds::ZERO,
            l1_data_gas: ResourceBounds {
                max_amount: 2,
                max_price_per_unit: 3,
            },
        };
        assert_eq!(bounds.fee_ceiling(), 76);
    }

    #[test]
    fn max_fee_saturates() {
        let bounds = ResourceBounds {
            max_amount: u64::MAX,
            max_price_per_unit: u128::MAX,
        };
        assert_eq!(bounds.max_fee(), u128::MAX);
    }
}
