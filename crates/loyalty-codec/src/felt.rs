//! Narrowing conversions from felts to machine integers.

use loyalty_types::{DecodingError, Felt};

/// Read a felt as an unsigned integer of `width` bytes. `index` is only used
/// for error reporting.
fn felt_to_be_bytes(
    value: &Felt,
    width: usize,
    kind: &'static str,
    index: usize,
) -> Result<[u8; 16], DecodingError> {
    let bytes = value.to_bytes_be();
    if bytes[..32 - width].iter().any(|b| *b != 0) {
        return Err(DecodingError::OutOfRange { kind, index });
    }
    let mut out = [0u8; 16];
    out[16 - width..].copy_from_slice(&bytes[32 - width..]);
    Ok(out)
}

pub fn felt_to_u128(value: &Felt, index: usize) -> Result<u128, DecodingError> {
    felt_to_be_bytes(value, 16, "u128", index).map(u128::from_be_bytes)
}

pub fn felt_to_u64(value: &Felt, index: usize) -> Result<u64, DecodingError> {
    felt_to_be_bytes(value, 8, "u64", index).map(|b| u128::from_be_bytes(b) as u64)
}

pub fn felt_to_usize(value: &Felt, index: usize) -> Result<usize, DecodingError> {
    let raw = felt_to_u64(value, index)?;
    usize::try_from(raw).map_err(|_| DecodingError::OutOfRange {
        kind: "usize",
        index,
    })
}

pub fn felt_to_bool(value: &Felt, index: usize) -> Result<bool, DecodingError> {
    match felt_to_u64(value, index)? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(DecodingError::OutOfRange {
            kind: "bool",
            index,
        }),
    }
}
