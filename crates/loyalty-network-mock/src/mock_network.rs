//! MockNetwork: in-memory execution layer with account nonces, signature
//! checks, canned view responses and scripted transaction lifecycles.

use std::collections::{HashMap, HashSet, VecDeque};

use loyalty_codec::selector_from_name;
use loyalty_crypto::{compute_invoke_v3_hash, verify_signature};
use loyalty_types::{
    ChainId, ContractAddress, ExecutionStatus, FeeEstimate, Felt, FinalityStatus, FunctionCall,
    InvokeTransactionV3, StarkSignature, TransactionReceipt, TransactionStatus, TxHash,
};

pub use loyalty_types::rpc_codes as codes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRpcError {
    pub code: i64,
    pub message: String,
}

/// Final state a submitted transaction reaches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeed,
    Revert(String),
    Reject(String),
    /// Stays `RECEIVED` forever.
    Never,
}

/// Status sequence for one transaction: `not_found_polls` status queries
/// answer "hash not found", the next `received_polls` answer `RECEIVED`,
/// after that the outcome is visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxScript {
    pub not_found_polls: u32,
    pub received_polls: u32,
    pub outcome: Outcome,
}

impl TxScript {
    pub fn immediate(outcome: Outcome) -> Self {
        Self {
            not_found_polls: 0,
            received_polls: 0,
            outcome,
        }
    }

    pub fn after_polls(pending: u32, outcome: Outcome) -> Self {
        Self {
            not_found_polls: pending,
            received_polls: 0,
            outcome,
        }
    }
}

impl Default for TxScript {
    fn default() -> Self {
        Self::immediate(Outcome::Succeed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockAccount {
    pub public_key: Felt,
    pub nonce: u64,
    /// Nonce reported by `get_nonce`; trails `nonce` when lag is enabled.
    pub visible_nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTx {
    pub hash: TxHash,
    pub sender: ContractAddress,
    pub nonce: u64,
    pub calldata: Vec<Felt>,
}

#[derive(Debug, Clone)]
struct TrackedTx {
    sender: ContractAddress,
    nonce: u64,
    script: TxScript,
    status_polls: u32,
    block_number: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct MockNetwork {
    chain_id: ChainId,
    pub accounts: HashMap<ContractAddress, MockAccount>,
    pub contracts: HashSet<ContractAddress>,
    pub views: HashMap<(ContractAddress, Felt), Vec<Felt>>,
    pub reverting_views: HashMap<(ContractAddress, Felt), String>,
    pub fee_estimate: FeeEstimate,
    pub nonce_lag: bool,
    pub submitted: Vec<SubmittedTx>,
    pub estimate_calls: usize,
    pub nonce_reads: usize,
    pending_broadcast_errors: VecDeque<MockRpcError>,
    scripts: VecDeque<TxScript>,
    default_script: TxScript,
    transactions: HashMap<TxHash, TrackedTx>,
    block_height: u64,
}

impl MockNetwork {
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            accounts: HashMap::new(),
            contracts: HashSet::new(),
            views: HashMap::new(),
            reverting_views: HashMap::new(),
            fee_estimate: FeeEstimate::default(),
            nonce_lag: false,
            submitted: Vec::new(),
            estimate_calls: 0,
            nonce_reads: 0,
            pending_broadcast_errors: VecDeque::new(),
            scripts: VecDeque::new(),
            default_script: TxScript::default(),
            transactions: HashMap::new(),
            block_height: 1,
        }
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn add_account(&mut self, address: ContractAddress, public_key: Felt, nonce: u64) {
        self.contracts.insert(address);
        self.accounts.insert(
            address,
            MockAccount {
                public_key,
                nonce,
                visible_nonce: nonce,
            },
        );
    }

    pub fn set_view(&mut self, contract: ContractAddress, entry_point: &str, response: Vec<Felt>) {
        self.contracts.insert(contract);
        self.views
            .insert((contract, selector_from_name(entry_point)), response);
    }

    pub fn set_reverting_view(
        &mut self,
        contract: ContractAddress,
        entry_point: &str,
        reason: impl Into<String>,
    ) {
        self.contracts.insert(contract);
        self.reverting_views
            .insert((contract, selector_from_name(entry_point)), reason.into());
    }

    pub fn set_fee_estimate(&mut self, estimate: FeeEstimate) {
        self.fee_estimate = estimate;
    }

    /// Script for the next submitted transaction; later ones use the default.
    pub fn push_script(&mut self, script: TxScript) {
        self.scripts.push_back(script);
    }

    pub fn set_default_script(&mut self, script: TxScript) {
        self.default_script = script;
    }

    /// Fail the next broadcast with `error` before any validation.
    pub fn fail_next_broadcast(&mut self, error: MockRpcError) {
        self.pending_broadcast_errors.push_back(error);
    }

    pub fn get_nonce(&mut self, address: ContractAddress) -> Result<Felt, MockRpcError> {
        self.nonce_reads += 1;
        let account = self.account(address)?;
        Ok(Felt::from(account.visible_nonce))
    }

    pub fn call(&self, request: &FunctionCall) -> Result<Vec<Felt>, MockRpcError> {
        let contract = request.contract_address;
        if !self.contracts.contains(&contract) {
            return Err(rpc_error(codes::CONTRACT_NOT_FOUND, "Contract not found"));
        }
        let key = (contract, request.entry_point_selector);
        if let Some(reason) = self.reverting_views.get(&key) {
            return Err(rpc_error(
                codes::CONTRACT_ERROR,
                format!("Contract error: {reason}"),
            ));
        }
        if let Some(account) = self.accounts.get(&contract) {
            if request.entry_point_selector == selector_from_name("get_public_key") {
                return Ok(vec![account.public_key]);
            }
        }
        self.views
            .get(&key)
            .cloned()
            .ok_or_else(|| rpc_error(codes::ENTRYPOINT_NOT_FOUND, "Requested entrypoint does not exist in the contract"))
    }

    pub fn estimate_fee(&mut self, tx: &InvokeTransactionV3) -> Result<FeeEstimate, MockRpcError> {
        self.estimate_calls += 1;
        self.account(tx.sender_address)?;
        Ok(self.fee_estimate)
    }

    pub fn add_invoke(&mut self, tx: &InvokeTransactionV3) -> Result<TxHash, MockRpcError> {
        if let Some(err) = self.pending_broadcast_errors.pop_front() {
            return Err(err);
        }
        let account = self.account(tx.sender_address)?.clone();
        let nonce = felt_as_u64(&tx.nonce);
        if nonce != Some(account.nonce) {
            return Err(rpc_error(
                codes::INVALID_TRANSACTION_NONCE,
                format!(
                    "Invalid transaction nonce: expected {}, got {}",
                    account.nonce, tx.nonce
                ),
            ));
        }

        let hash = compute_invoke_v3_hash(tx, self.chain_id);
        let signature = match tx.signature.as_slice() {
            [r, s] => StarkSignature { r: *r, s: *s },
            _ => {
                return Err(rpc_error(
                    codes::VALIDATION_FAILURE,
                    "Account validation failed: signature must be [r, s]",
                ))
            }
        };
        if !verify_signature(&account.public_key, &hash.felt(), &signature) {
            return Err(rpc_error(
                codes::VALIDATION_FAILURE,
                "Account validation failed: invalid signature",
            ));
        }

        let ceiling = tx.resource_bounds.fee_ceiling();
        if ceiling < self.fee_estimate.overall_fee {
            return Err(rpc_error(
                codes::INSUFFICIENT_MAX_FEE,
                format!(
                    "Max fee {ceiling} is below the estimated fee {}",
                    self.fee_estimate.overall_fee
                ),
            ));
        }

        let script = self
            .scripts
            .pop_front()
            .unwrap_or_else(|| self.default_script.clone());
        // a rejected transaction never consumes its nonce
        if !matches!(script.outcome, Outcome::Reject(_)) {
            if let Some(stored) = self.accounts.get_mut(&tx.sender_address) {
                stored.nonce += 1;
                if !self.nonce_lag {
                    stored.visible_nonce = stored.nonce;
                }
            }
        }
        self.transactions.insert(
            hash,
            TrackedTx {
                sender: tx.sender_address,
                nonce: account.nonce,
                script,
                status_polls: 0,
                block_number: None,
            },
        );
        self.submitted.push(SubmittedTx {
            hash,
            sender: tx.sender_address,
            nonce: account.nonce,
            calldata: tx.calldata.clone(),
        });
        Ok(hash)
    }

    pub fn transaction_status(&mut self, hash: TxHash) -> Result<TransactionStatus, MockRpcError> {
        let tracked = self
            .transactions
            .get_mut(&hash)
            .ok_or_else(|| rpc_error(codes::TXN_HASH_NOT_FOUND, "Transaction hash not found"))?;
        tracked.status_polls += 1;
        let polls = tracked.status_polls;
        let script = tracked.script.clone();
        if polls <= script.not_found_polls {
            return Err(rpc_error(codes::TXN_HASH_NOT_FOUND, "Transaction hash not found"));
        }
        if polls <= script.not_found_polls + script.received_polls {
            return Ok(received());
        }

        let status = match &script.outcome {
            Outcome::Never => return Ok(received()),
            Outcome::Reject(reason) => TransactionStatus {
                finality: FinalityStatus::Rejected,
                execution: None,
                failure_reason: Some(reason.clone()),
            },
            Outcome::Succeed => TransactionStatus {
                finality: FinalityStatus::AcceptedOnL2,
                execution: Some(ExecutionStatus::Succeeded),
                failure_reason: None,
            },
            Outcome::Revert(reason) => TransactionStatus {
                finality: FinalityStatus::AcceptedOnL2,
                execution: Some(ExecutionStatus::Reverted),
                failure_reason: Some(reason.clone()),
            },
        };
        if status.finality.is_accepted() {
            self.mark_included(hash);
        }
        Ok(status)
    }

    pub fn transaction_receipt(&self, hash: TxHash) -> Result<TransactionReceipt, MockRpcError> {
        let tracked = self
            .transactions
            .get(&hash)
            .ok_or_else(|| rpc_error(codes::TXN_HASH_NOT_FOUND, "Transaction hash not found"))?;
        let block_number = tracked
            .block_number
            .ok_or_else(|| rpc_error(codes::TXN_HASH_NOT_FOUND, "Transaction hash not found"))?;
        let (execution_status, revert_reason) = match &tracked.script.outcome {
            Outcome::Revert(reason) => (ExecutionStatus::Reverted, Some(reason.clone())),
            _ => (ExecutionStatus::Succeeded, None),
        };
        Ok(TransactionReceipt {
            transaction_hash: hash,
            finality: FinalityStatus::AcceptedOnL2,
            execution_status,
            revert_reason,
            actual_fee: self.fee_estimate.overall_fee,
            block_number: Some(block_number),
        })
    }

    /// Status queries seen so far for `hash`.
    pub fn status_polls(&self, hash: TxHash) -> u32 {
        self.transactions
            .get(&hash)
            .map(|tx| tx.status_polls)
            .unwrap_or(0)
    }

    pub fn nonces_for(&self, sender: ContractAddress) -> Vec<u64> {
        self.submitted
            .iter()
            .filter(|tx| tx.sender == sender)
            .map(|tx| tx.nonce)
            .collect()
    }

    fn mark_included(&mut self, hash: TxHash) {
        let Some(tracked) = self.transactions.get_mut(&hash) else {
            return;
        };
        if tracked.block_number.is_some() {
            return;
        }
        self.block_height += 1;
        tracked.block_number = Some(self.block_height);
        let (sender, nonce) = (tracked.sender, tracked.nonce);
        if let Some(account) = self.accounts.get_mut(&sender) {
            account.visible_nonce = account.visible_nonce.max(nonce + 1).min(account.nonce);
        }
    }

    fn account(&self, address: ContractAddress) -> Result<&MockAccount, MockRpcError> {
        self.accounts
            .get(&address)
            .ok_or_else(|| rpc_error(codes::CONTRACT_NOT_FOUND, "Contract not found"))
    }
}

fn received() -> TransactionStatus {
    TransactionStatus {
        finality: FinalityStatus::Received,
        execution: None,
        failure_reason: None,
    }
}

fn felt_as_u64(value: &Felt) -> Option<u64> {
    let bytes = value.to_bytes_be();
    if bytes[..24].iter().any(|b| *b != 0) {
        return None;
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&bytes[24..]);
    Some(u64::from_be_bytes(tail))
}

fn rpc_error(code: i64, message: impl Into<String>) -> MockRpcError {
    MockRpcError {
        code,
        message: message.into(),
    }
}
