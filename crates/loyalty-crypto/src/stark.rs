use std::fmt;

use loyalty_types::{felt_from_hex, Felt, SigningError, StarkSignature, TransactionSigner};
use starknet_crypto::{get_public_key, rfc6979_generate_k, sign, verify};

/// Order of the Stark curve generator; private keys must lie in `1..ORDER`.
const CURVE_ORDER_BE: [u8; 32] = [
    0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xb7, 0x81, 0x12, 0x6d, 0xca, 0xe7, 0xb2, 0x32, 0x1e, 0x66, 0xa2, 0x41, 0xad, 0xc6, 0x4d, 0x2f,
];

#[derive(Clone)]
pub struct StarkKeySigner {
    private_key: Felt,
    public_key: Felt,
}

impl StarkKeySigner {
    pub fn from_private_key(private_key: Felt) -> Result<Self, SigningError> {
        if private_key == Felt::ZERO {
            return Err(SigningError::MissingKey);
        }
        if private_key.to_bytes_be() >= CURVE_ORDER_BE {
            return Err(SigningError::MalformedKey(
                "private key is not below the curve order".to_string(),
            ));
        }
        Ok(Self {
            private_key,
            public_key: get_public_key(&private_key),
        })
    }

    pub fn from_hex(private_key: &str) -> Result<Self, SigningError> {
        if private_key.trim().is_empty() {
            return Err(SigningError::MissingKey);
        }
        let felt =
            felt_from_hex(private_key).map_err(|err| SigningError::MalformedKey(err.to_string()))?;
        Self::from_private_key(felt)
    }

    pub fn public_key(&self) -> Felt {
        self.public_key
    }
}

impl fmt::Debug for StarkKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StarkKeySigner")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl TransactionSigner for StarkKeySigner {
    fn public_key(&self) -> Felt {
        self.public_key
    }

    fn sign_hash(&self, hash: &Felt) -> Result<StarkSignature, SigningError> {
        let k = rfc6979_generate_k(hash, &self.private_key, None);
        let signature = sign(&self.private_key, hash, &k)
            .map_err(|err| SigningError::Signature(format!("{err:?}")))?;
        Ok(StarkSignature {
            r: signature.r,
            s: signature.s,
        })
    }
}

/// Check a `[r, s]` signature against a public key. Malformed inputs verify
/// as false.
pub fn verify_signature(public_key: &Felt, hash: &Felt, signature: &StarkSignature) -> bool {
    verify(public_key, hash, &signature.r, &signature.s).unwrap_or(false)
}
