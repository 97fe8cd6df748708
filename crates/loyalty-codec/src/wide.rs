//! 256-bit unsigned integers carried as two 128-bit limbs.

use std::{fmt, str::FromStr};

use loyalty_types::{DecodingError, EncodingError, Felt};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{Num, ToPrimitive};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::felt::felt_to_u128;

/// Unsigned 256-bit integer. Field order makes the derived ordering numeric.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct U256 {
    high: u128,
    low: u128,
}

impl U256 {
    pub const ZERO: Self = Self::from_limbs(0, 0);
    pub const MAX: Self = Self::from_limbs(u128::MAX, u128::MAX);

    pub const fn from_limbs(low: u128, high: u128) -> Self {
        Self { high, low }
    }

    pub const fn low(&self) -> u128 {
        self.low
    }

    pub const fn high(&self) -> u128 {
        self.high
    }

    pub fn from_biguint(value: &BigUint) -> Result<Self, EncodingError> {
        let bits = value.bits();
        if bits > 256 {
            return Err(EncodingError::Overflow { kind: "u256", bits });
        }
        let mask = (BigUint::from(1u8) << 128u32) - BigUint::from(1u8);
        let low = (value & &mask).to_u128();
        let high = (value >> 128u32).to_u128();
        match (low, high) {
            (Some(low), Some(high)) => Ok(Self::from_limbs(low, high)),
            _ => Err(EncodingError::Overflow { kind: "u256", bits }),
        }
    }

    pub fn from_bigint(value: &BigInt) -> Result<Self, EncodingError> {
        if value.sign() == Sign::Minus {
            return Err(EncodingError::Negative { kind: "u256" });
        }
        Self::from_biguint(value.magnitude())
    }

    pub fn to_biguint(&self) -> BigUint {
        (BigUint::from(self.high) << 128u32) | BigUint::from(self.low)
    }

    /// `[low, high]`, the order the execution layer expects.
    pub fn to_felts(&self) -> [Felt; 2] {
        [Felt::from(self.low), Felt::from(self.high)]
    }

    /// Rebuild from limbs; `index` is the position of `low` for error reports.
    pub fn from_felts(low: &Felt, high: &Felt, index: usize) -> Result<Self, DecodingError> {
        Ok(Self::from_limbs(
            felt_to_u128(low, index)?,
            felt_to_u128(high, index + 1)?,
        ))
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        let (low, carry) = self.low.overflowing_add(rhs.low);
        let high = self
            .high
            .checked_add(rhs.high)?
            .checked_add(u128::from(carry))?;
        Some(Self::from_limbs(low, high))
    }
}

/// Encode an arbitrary-precision integer as `[low, high]`.
pub fn encode_wide_int(value: &BigUint) -> Result<[Felt; 2], EncodingError> {
    U256::from_biguint(value).map(|v| v.to_felts())
}

/// Reconstruct `(high << 128) | low`.
pub fn decode_wide_int(low: &Felt, high: &Felt) -> Result<BigUint, DecodingError> {
    U256::from_felts(low, high, 0).map(|v| v.to_biguint())
}

impl From<u128> for U256 {
    fn from(value: u128) -> Self {
        Self::from_limbs(value, 0)
    }
}

impl From<u64> for U256 {
    fn from(value: u64) -> Self {
        Self::from_limbs(u128::from(value), 0)
    }
}

impl TryFrom<&BigUint> for U256 {
    type Error = EncodingError;

    fn try_from(value: &BigUint) -> Result<Self, Self::Error> {
        Self::from_biguint(value)
    }
}

impl TryFrom<&BigInt> for U256 {
    type Error = EncodingError;

    fn try_from(value: &BigInt) -> Result<Self, Self::Error> {
        Self::from_bigint(value)
    }
}

/// Parses decimal, or hex with a `0x` prefix. A leading `-` is rejected as
/// negative rather than malformed.
impl FromStr for U256 {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('-') {
            return Err(EncodingError::Negative { kind: "u256" });
        }
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(digits) => BigUint::from_str_radix(digits, 16),
            None => BigUint::from_str_radix(s, 10),
        };
        let value = parsed.map_err(|_| EncodingError::InvalidInteger(s.to_string()))?;
        Self::from_biguint(&value)
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.high == 0 {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}", self.to_biguint())
        }
    }
}

impl fmt::Debug for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U256({self})")
    }
}

impl Serialize for U256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for U256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
