//! Loyalty on-chain client library.
//!
//! This crate exposes:
//! - transport abstractions (`NetworkClient`, `JsonRpcTransport`, `MockTransport`),
//! - account identity with per-address nonce sequencing (`AccountContext`, `NonceRegistry`),
//! - invoke v3 construction and signing (`InvokeBuilder`),
//! - read-only calls with typed decoding (`ReadInvoker`),
//! - broadcast with an optional one-shot fee bump (`TransactionInvoker`) and
//!   bounded confirmation polling (`ConfirmationPoller`),
//! - the loyalty operations facade (`LoyaltyClient`).

pub mod account;
pub mod invoker;
pub mod json_rpc;
pub mod operations;
pub mod poller;
pub mod reader;
pub mod transport;
pub mod tx_builder;

pub use account::{
    AccountContext, AccountError, AccountRole, NonceGuard, NonceRegistry,
    GET_PUBLIC_KEY_ENTRY_POINT,
};
pub use invoker::{
    bumped_resource_bounds, FeePolicy, InvocationOutcome, InvokeError, InvokeOptions,
    PendingTransaction, TransactionInvoker,
};
pub use json_rpc::JsonRpcTransport;
pub use operations::{LoyaltyClient, LoyaltyConfig, ProvisionedAccount, UNIVERSAL_DEPLOYER_ADDRESS};
pub use poller::{ConfirmationPoller, PollConfig, PollError};
pub use reader::{CallError, ReadError, ReadInvoker, BALANCE_OF_ENTRY_POINT};
pub use transport::{
    retry_with_backoff, MockTransport, NetworkClient, RetryPolicy, TransportConfig,
    TransportError,
};
pub use tx_builder::{
    contract_call, encode_execute_calldata, BuiltInvoke, InvokeBuilder, TxBuilderError,
};
