//! Felt codec for the loyalty contracts.
//!
//! This crate exposes:
//! - 256-bit integers as `[low, high]` limbs (`U256`, `encode_wide_int`),
//! - UTF-8 strings in the Cairo `ByteArray` layout,
//! - canonical address rendering, short strings and selectors,
//! - typed calldata encoding (`Encode`, `Calldata`),
//! - cursor-driven response decoding (`Cursor`, `Decode`, `Recipe`) and the
//!   fixed `get_details` layouts.

pub mod address;
pub mod byte_array;
pub mod calldata;
pub mod decoder;
pub mod describe;
pub mod felt;
pub mod short_string;
pub mod wide;

pub use address::{canonicalize_address, canonicalize_address_str, parse_address};
pub use byte_array::{decode_bytes, decode_string, encode_bytes, encode_string, BYTES_PER_WORD};
pub use calldata::{Calldata, Encode};
pub use decoder::{decode_exact, Cursor, Decode, FieldKind, LengthUnit, Recipe, Record, Value};
pub use describe::{CollectibleDetails, CollectibleToken, PointsDetails, DESCRIBE_ENTRY_POINT};
pub use felt::{felt_to_bool, felt_to_u128, felt_to_u64, felt_to_usize};
pub use short_string::{
    felt_to_short_string, selector_from_name, short_string_to_felt, starknet_keccak,
};
pub use wide::{decode_wide_int, encode_wide_int, U256};
