//! In-memory execution layer for testing the loyalty client without a node.

pub mod mock_network;
pub mod scenarios;

pub use mock_network::{
    codes, MockAccount, MockNetwork, MockRpcError, Outcome, SubmittedTx, TxScript,
};
pub use scenarios::{DemoAccounts, DemoScenario, OPERATOR_PRIVATE_KEY, PRINCIPAL_PRIVATE_KEY};
