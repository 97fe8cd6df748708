//! JSON-RPC error codes returned by the execution layer.

pub const CONTRACT_NOT_FOUND: i64 = 20;
pub const ENTRYPOINT_NOT_FOUND: i64 = 21;
pub const BLOCK_NOT_FOUND: i64 = 24;
pub const TXN_HASH_NOT_FOUND: i64 = 29;
pub const CONTRACT_ERROR: i64 = 40;
pub const TRANSACTION_EXECUTION_ERROR: i64 = 41;
pub const INVALID_TRANSACTION_NONCE: i64 = 52;
pub const INSUFFICIENT_MAX_FEE: i64 = 53;
pub const INSUFFICIENT_ACCOUNT_BALANCE: i64 = 54;
pub const VALIDATION_FAILURE: i64 = 55;
pub const DUPLICATE_TX: i64 = 59;
