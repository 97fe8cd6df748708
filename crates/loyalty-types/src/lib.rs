pub mod error;
pub mod ids;
pub mod rpc_codes;
pub mod traits;
pub mod tx;

pub use error::{DecodingError, EncodingError, SigningError};
pub use ids::{
    felt_from_hex, felt_to_fixed_hex, ChainId, ClassHash, ContractAddress, TxHash,
    FELT_HEX_DIGITS,
};
pub use starknet_types_core::felt::Felt;
pub use traits::TransactionSigner;
pub use tx::{
    Call, DataAvailabilityMode, ExecutionStatus, FeeEstimate, FinalityStatus, FunctionCall,
    InvokeTransactionV3, ResourceBounds, ResourceBoundsMapping, StarkSignature,
    TransactionReceipt, TransactionStatus,
};
