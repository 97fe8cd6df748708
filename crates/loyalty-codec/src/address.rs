//! Canonical address rendering.

use loyalty_types::{felt_from_hex, felt_to_fixed_hex, ContractAddress, EncodingError, Felt};

/// `0x` followed by 64 lowercase hex digits.
pub fn canonicalize_address(value: &Felt) -> String {
    felt_to_fixed_hex(value)
}

/// Re-render any accepted hex spelling of an address in canonical form.
/// Applying it to its own output yields the same string.
pub fn canonicalize_address_str(value: &str) -> Result<String, EncodingError> {
    felt_from_hex(value).map(|felt| canonicalize_address(&felt))
}

pub fn parse_address(value: &str) -> Result<ContractAddress, EncodingError> {
    ContractAddress::from_hex(value)
}
