//! Cairo short strings and entry point selectors.

use loyalty_types::{DecodingError, EncodingError, Felt};
use sha3::{Digest, Keccak256};

pub const MAX_SHORT_STRING_LEN: usize = 31;

/// Pack at most 31 ASCII bytes big-endian into one felt.
pub fn short_string_to_felt(value: &str) -> Result<Felt, EncodingError> {
    if value.len() > MAX_SHORT_STRING_LEN || !value.is_ascii() {
        return Err(EncodingError::InvalidShortString(value.to_string()));
    }
    Ok(Felt::from_bytes_be_slice(value.as_bytes()))
}

pub fn felt_to_short_string(value: &Felt) -> Result<String, DecodingError> {
    let bytes = value.to_bytes_be();
    if bytes[0] != 0 {
        return Err(DecodingError::OutOfRange {
            kind: "short string",
            index: 0,
        });
    }
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let text = &bytes[start..];
    if !text.is_ascii() {
        return Err(DecodingError::InvalidUtf8("short string is not ascii".to_string()));
    }
    String::from_utf8(text.to_vec()).map_err(|err| DecodingError::InvalidUtf8(err.to_string()))
}

/// `sn_keccak`: keccak256 truncated to the low 250 bits.
pub fn starknet_keccak(data: &[u8]) -> Felt {
    let mut digest: [u8; 32] = Keccak256::digest(data).into();
    digest[0] &= 0x03;
    Felt::from_bytes_be(&digest)
}

pub fn selector_from_name(name: &str) -> Felt {
    starknet_keccak(name.as_bytes())
}
