//! Stark-curve signing and transaction hashing.

pub mod hashing;
pub mod stark;

pub use hashing::{
    compute_contract_address, compute_hash_on_elements, compute_invoke_v3_hash,
    resource_bound_word, INVOKE_VERSION,
};
pub use stark::{verify_signature, StarkKeySigner};
