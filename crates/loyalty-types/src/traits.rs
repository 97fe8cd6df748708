//! Signing seam shared by account contexts and the in-memory network.

use starknet_types_core::felt::Felt;

use crate::{error::SigningError, tx::StarkSignature};

pub trait TransactionSigner: Send + Sync {
    fn public_key(&self) -> Felt;

    fn sign_hash(&self, hash: &Felt) -> Result<StarkSignature, SigningError>;
}
