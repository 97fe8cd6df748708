use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use starknet_types_core::felt::Felt;

use crate::error::EncodingError;

/// Number of hex digits in the canonical rendering of a felt.
pub const FELT_HEX_DIGITS: usize = 64;

/// Render a felt as `0x` followed by 64 zero-padded lowercase hex digits.
pub fn felt_to_fixed_hex(value: &Felt) -> String {
    format!("0x{}", hex::encode(value.to_bytes_be()))
}

/// Parse a hex felt. Accepts an optional `0x` prefix and 1..=64 digits,
/// rejects anything at or above the field modulus.
pub fn felt_from_hex(input: &str) -> Result<Felt, EncodingError> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() || digits.len() > FELT_HEX_DIGITS {
        return Err(EncodingError::InvalidHex(input.to_string()));
    }
    let padded = format!("{digits:0>64}");
    let bytes: [u8; 32] = hex::decode(&padded)
        .map_err(|err| EncodingError::InvalidHex(format!("{input}: {err}")))?
        .try_into()
        .map_err(|_| EncodingError::InvalidHex(input.to_string()))?;
    let felt = Felt::from_bytes_be(&bytes);
    if felt.to_bytes_be() != bytes {
        return Err(EncodingError::OutOfField(input.to_string()));
    }
    Ok(felt)
}

macro_rules! impl_felt_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Felt);

        impl $name {
            pub const ZERO: Self = Self(Felt::ZERO);

            pub const fn new(value: Felt) -> Self {
                Self(value)
            }

            pub fn from_hex(input: &str) -> Result<Self, EncodingError> {
                felt_from_hex(input).map(Self)
            }

            pub const fn felt(&self) -> Felt {
                self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == Felt::ZERO
            }

            pub fn to_fixed_hex(&self) -> String {
                felt_to_fixed_hex(&self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::ZERO
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_fixed_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = EncodingError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl From<Felt> for $name {
            fn from(value: Felt) -> Self {
                Self::new(value)
            }
        }

        impl From<$name> for Felt {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_fixed_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::from_hex(&raw).map_err(de::Error::custom)
            }
        }
    };
}

impl_felt_id!(ContractAddress);
impl_felt_id!(TxHash);
impl_felt_id!(ClassHash);

/// Network identifier, carried as a Cairo short string (`SN_MAIN`, `SN_SEPOLIA`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(Felt);

impl ChainId {
    pub const fn new(value: Felt) -> Self {
        Self(value)
    }

    /// Pack an ASCII name of at most 31 bytes into a chain id.
    pub fn from_name(name: &str) -> Result<Self, EncodingError> {
        if name.is_empty() || name.len() > 31 || !name.is_ascii() {
            return Err(EncodingError::InvalidShortString(name.to_string()));
        }
        Ok(Self(Felt::from_bytes_be_slice(name.as_bytes())))
    }

    pub const fn felt(&self) -> Felt {
        self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_bytes_be();
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        match std::str::from_utf8(&bytes[start..]) {
            Ok(name) if !name.is_empty() => f.write_str(name),
            _ => f.write_str(&felt_to_fixed_hex(&self.0)),
        }
    }
}
