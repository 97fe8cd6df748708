//! Error types for felt encoding, response decoding, and signing.

use thiserror::Error;

/// Failure to turn a native value into field elements.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("negative value cannot be encoded as {kind}")]
    Negative { kind: &'static str },
    #[error("value does not fit {kind}: needs {bits} bits")]
    Overflow { kind: &'static str, bits: u64 },
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("invalid integer literal: {0}")]
    InvalidInteger(String),
    #[error("value exceeds the field modulus: {0}")]
    OutOfField(String),
    #[error("invalid short string: {0}")]
    InvalidShortString(String),
}

/// Failure to rebuild a native value from a field element array.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodingError {
    /// A length prefix declares more felts than remain.
    #[error("truncated {kind}: needed {needed} more felts at index {index}, have {available}")]
    Truncated {
        kind: &'static str,
        index: usize,
        needed: usize,
        available: usize,
    },
    /// Decoding ended before the array's end or tried to read past it.
    #[error("cursor mismatch: expected {expected}, actual {actual}")]
    CursorMismatch { expected: usize, actual: usize },
    #[error("felt at index {index} does not fit {kind}")]
    OutOfRange { kind: &'static str, index: usize },
    #[error("invalid length prefix {value} for {kind}")]
    InvalidLength { kind: &'static str, value: u64 },
    #[error("invalid utf-8 in byte array: {0}")]
    InvalidUtf8(String),
    #[error("field `{field}`: {reason}")]
    Field { field: &'static str, reason: String },
}

/// Failure to produce a transaction signature.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("missing private key")]
    MissingKey,
    #[error("malformed private key: {0}")]
    MalformedKey(String),
    #[error("signature failed: {0}")]
    Signature(String),
}
