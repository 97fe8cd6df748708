//! JSON-RPC over HTTP transport.

use std::time::Duration;

use async_trait::async_trait;
use loyalty_types::{
    felt_from_hex, felt_to_fixed_hex, ChainId, ContractAddress, ExecutionStatus, FeeEstimate,
    Felt, FinalityStatus, FunctionCall, InvokeTransactionV3, ResourceBounds, TransactionReceipt,
    TransactionStatus, TxHash,
};
use serde_json::{json, Value};

use crate::transport::{retry_with_backoff, NetworkClient, TransportConfig, TransportError};

/// Version used for fee-estimation queries (`2^128 + 3`).
pub const QUERY_VERSION_V3: &str = "0x100000000000000000000000000000003";

/// Block tag for nonce and fee queries, so pending transactions count.
const PENDING_BLOCK: &str = "pending";
const LATEST_BLOCK: &str = "latest";

#[derive(Debug, Clone)]
pub struct JsonRpcTransport {
    config: TransportConfig,
    http: reqwest::Client,
}

impl JsonRpcTransport {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|err| TransportError::Internal(format!("http client: {err}")))?;
        Ok(Self { config, http })
    }

    pub fn rpc_url(&self) -> &str {
        &self.config.rpc_url
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let request = json_rpc_request(method, params);
        retry_with_backoff(
            &self.config.retry_policy,
            Duration::from_millis(self.config.request_timeout_ms),
            || self.post_once(&request),
        )
        .await
    }

    async fn post_once(&self, request: &Value) -> Result<Value, TransportError> {
        let response = self
            .http
            .post(&self.config.rpc_url)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(TransportError::Unavailable(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(TransportError::Internal(format!("HTTP {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| TransportError::Validation(err.to_string()))?;
        parse_rpc_response(body)
    }
}

#[async_trait]
impl NetworkClient for JsonRpcTransport {
    async fn chain_id(&self) -> Result<ChainId, TransportError> {
        let result = self.rpc_call("starknet_chainId", json!([])).await?;
        parse_felt(&result).map(ChainId::new)
    }

    async fn get_nonce(&self, address: ContractAddress) -> Result<Felt, TransportError> {
        let result = self
            .rpc_call(
                "starknet_getNonce",
                json!({
                    "block_id": PENDING_BLOCK,
                    "contract_address": address.to_fixed_hex(),
                }),
            )
            .await?;
        parse_felt(&result)
    }

    async fn call(&self, request: &FunctionCall) -> Result<Vec<Felt>, TransportError> {
        let result = self
            .rpc_call(
                "starknet_call",
                json!({
                    "request": {
                        "contract_address": request.contract_address.to_fixed_hex(),
                        "entry_point_selector": felt_to_fixed_hex(&request.entry_point_selector),
                        "calldata": felts_to_json(&request.calldata),
                    },
                    "block_id": LATEST_BLOCK,
                }),
            )
            .await?;
        parse_felt_array(&result)
    }

    async fn estimate_fee(
        &self,
        tx: &InvokeTransactionV3,
    ) -> Result<FeeEstimate, TransportError> {
        let result = self
            .rpc_call(
                "starknet_estimateFee",
                json!({
                    "request": [invoke_to_json(tx, QUERY_VERSION_V3)],
                    "simulation_flags": ["SKIP_VALIDATE"],
                    "block_id": PENDING_BLOCK,
                }),
            )
            .await?;
        let first = result
            .as_array()
            .and_then(|estimates| estimates.first())
            .ok_or_else(|| TransportError::Validation("empty fee estimate".to_string()))?;
        parse_fee_estimate(first)
    }

    async fn add_invoke_transaction(
        &self,
        tx: &InvokeTransactionV3,
    ) -> Result<TxHash, TransportError> {
        // broadcasts are never retried
        let request = json_rpc_request(
            "starknet_addInvokeTransaction",
            json!({ "invoke_transaction": invoke_to_json(tx, "0x3") }),
        );
        let result = self.post_once(&request).await?;
        let hash = result
            .get("transaction_hash")
            .ok_or_else(|| TransportError::Validation("missing transaction_hash".to_string()))?;
        parse_felt(hash).map(TxHash::new)
    }

    async fn get_transaction_status(
        &self,
        hash: TxHash,
    ) -> Result<TransactionStatus, TransportError> {
        let result = self
            .rpc_call(
                "starknet_getTransactionStatus",
                json!({ "transaction_hash": hash.to_fixed_hex() }),
            )
            .await?;
        parse_transaction_status(&result)
    }

    async fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<TransactionReceipt, TransportError> {
        let result = self
            .rpc_call(
                "starknet_getTransactionReceipt",
                json!({ "transaction_hash": hash.to_fixed_hex() }),
            )
            .await?;
        parse_receipt(&result)
    }
}

fn json_rpc_request(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    })
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() || err.is_request() {
        TransportError::Unavailable(err.to_string())
    } else {
        TransportError::Internal(err.to_string())
    }
}

/// Split a JSON-RPC envelope into its result or a `Rejected` error.
pub fn parse_rpc_response(body: Value) -> Result<Value, TransportError> {
    if let Some(error) = body.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(-1);
        let mut message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        if let Some(data) = error.get("data") {
            let detail = match data {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            message = format!("{message}: {detail}");
        }
        return Err(TransportError::Rejected { code, message });
    }
    body.get("result")
        .cloned()
        .ok_or_else(|| TransportError::Validation("missing result".to_string()))
}

pub fn invoke_to_json(tx: &InvokeTransactionV3, version: &str) -> Value {
    json!({
        "type": "INVOKE",
        "version": version,
        "sender_address": tx.sender_address.to_fixed_hex(),
        "calldata": felts_to_json(&tx.calldata),
        "signature": felts_to_json(&tx.signature),
        "nonce": felt_to_fixed_hex(&tx.nonce),
        "resource_bounds": {
            "l1_gas": bounds_to_json(&tx.resource_bounds.l1_gas),
            "l2_gas": bounds_to_json(&tx.resource_bounds.l2_gas),
            "l1_data_gas": bounds_to_json(&tx.resource_bounds.l1_data_gas),
        },
        "tip": format!("{:#x}", tx.tip),
        "paymaster_data": felts_to_json(&tx.paymaster_data),
        "account_deployment_data": felts_to_json(&tx.account_deployment_data),
        "nonce_data_availability_mode": tx.nonce_data_availability_mode.as_str(),
        "fee_data_availability_mode": tx.fee_data_availability_mode.as_str(),
    })
}

fn bounds_to_json(bounds: &ResourceBounds) -> Value {
    json!({
        "max_amount": format!("{:#x}", bounds.max_amount),
        "max_price_per_unit": format!("{:#x}", bounds.max_price_per_unit),
    })
}

fn felts_to_json(felts: &[Felt]) -> Vec<String> {
    felts.iter().map(felt_to_fixed_hex).collect()
}

fn parse_felt(value: &Value) -> Result<Felt, TransportError> {
    let text = value
        .as_str()
        .ok_or_else(|| TransportError::Validation(format!("expected hex string, got {value}")))?;
    felt_from_hex(text).map_err(|err| TransportError::Validation(err.to_string()))
}

fn parse_felt_array(value: &Value) -> Result<Vec<Felt>, TransportError> {
    value
        .as_array()
        .ok_or_else(|| TransportError::Validation("expected array result".to_string()))?
        .iter()
        .map(parse_felt)
        .collect()
}

fn parse_hex_u128(value: &Value, field: &str) -> Result<u128, TransportError> {
    let invalid = || TransportError::Validation(format!("invalid {field}: {value}"));
    match value {
        Value::String(text) => {
            let digits = text.trim_start_matches("0x");
            if digits.is_empty() {
                return Ok(0);
            }
            u128::from_str_radix(digits, 16).map_err(|_| invalid())
        }
        Value::Number(number) => number.as_u64().map(u128::from).ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

fn parse_hex_u64(value: &Value, field: &str) -> Result<u64, TransportError> {
    let wide = parse_hex_u128(value, field)?;
    u64::try_from(wide).map_err(|_| TransportError::Validation(format!("{field} overflows u64")))
}

/// Reads the first present key; missing keys count as zero.
fn field_u128(object: &Value, keys: &[&str]) -> Result<u128, TransportError> {
    match keys.iter().find_map(|key| object.get(*key)) {
        Some(value) => parse_hex_u128(value, keys[0]),
        None => Ok(0),
    }
}

fn field_u64(object: &Value, keys: &[&str]) -> Result<u64, TransportError> {
    match keys.iter().find_map(|key| object.get(*key)) {
        Some(value) => parse_hex_u64(value, keys[0]),
        None => Ok(0),
    }
}

/// Accepts current field names and the older `gas_consumed`/`data_gas_*`
/// spelling.
pub fn parse_fee_estimate(value: &Value) -> Result<FeeEstimate, TransportError> {
    let overall = value
        .get("overall_fee")
        .ok_or_else(|| TransportError::Validation("missing overall_fee".to_string()))?;
    Ok(FeeEstimate {
        l1_gas_consumed: field_u64(value, &["l1_gas_consumed", "gas_consumed"])?,
        l1_gas_price: field_u128(value, &["l1_gas_price", "gas_price"])?,
        l2_gas_consumed: field_u64(value, &["l2_gas_consumed"])?,
        l2_gas_price: field_u128(value, &["l2_gas_price"])?,
        l1_data_gas_consumed: field_u64(value, &["l1_data_gas_consumed", "data_gas_consumed"])?,
        l1_data_gas_price: field_u128(value, &["l1_data_gas_price", "data_gas_price"])?,
        overall_fee: parse_hex_u128(overall, "overall_fee")?,
    })
}

fn parse_finality(value: Option<&Value>) -> Result<FinalityStatus, TransportError> {
    match value.and_then(Value::as_str) {
        Some("RECEIVED") => Ok(FinalityStatus::Received),
        Some("REJECTED") => Ok(FinalityStatus::Rejected),
        Some("ACCEPTED_ON_L2") => Ok(FinalityStatus::AcceptedOnL2),
        Some("ACCEPTED_ON_L1") => Ok(FinalityStatus::AcceptedOnL1),
        // newer nodes report pre-acceptance stages such as PRE_CONFIRMED
        Some(other) => {
            tracing::debug!(finality = other, "unrecognized finality status; still pending");
            Ok(FinalityStatus::Received)
        }
        None => Err(TransportError::Validation("missing finality_status".to_string())),
    }
}

fn parse_execution(value: Option<&Value>) -> Result<Option<ExecutionStatus>, TransportError> {
    match value.and_then(Value::as_str) {
        None => Ok(None),
        Some("SUCCEEDED") => Ok(Some(ExecutionStatus::Succeeded)),
        Some("REVERTED") => Ok(Some(ExecutionStatus::Reverted)),
        Some(other) => Err(TransportError::Validation(format!(
            "unknown execution status {other}"
        ))),
    }
}

pub fn parse_transaction_status(value: &Value) -> Result<TransactionStatus, TransportError> {
    let failure_reason = value
        .get("failure_reason")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(TransactionStatus {
        finality: parse_finality(value.get("finality_status"))?,
        execution: parse_execution(value.get("execution_status"))?,
        failure_reason,
    })
}

pub fn parse_receipt(value: &Value) -> Result<TransactionReceipt, TransportError> {
    let hash = value
        .get("transaction_hash")
        .ok_or_else(|| TransportError::Validation("missing transaction_hash".to_string()))?;
    let execution_status = parse_execution(value.get("execution_status"))?
        .ok_or_else(|| TransportError::Validation("missing execution_status".to_string()))?;
    // fee is `{amount, unit}` on current nodes and a bare hex string before
    let actual_fee = match value.get("actual_fee") {
        Some(fee) if fee.is_object() => match fee.get("amount") {
            Some(amount) => parse_hex_u128(amount, "actual_fee")?,
            None => 0,
        },
        Some(fee) => parse_hex_u128(fee, "actual_fee")?,
        None => 0,
    };
    Ok(TransactionReceipt {
        transaction_hash: TxHash::new(parse_felt(hash)?),
        finality: parse_finality(value.get("finality_status"))?,
        execution_status,
        revert_reason: value
            .get("revert_reason")
            .and_then(Value::as_str)
            .map(str::to_string),
        actual_fee,
        block_number: value.get("block_number").and_then(Value::as_u64),
    })
}
