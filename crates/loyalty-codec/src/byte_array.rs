//! Cairo `ByteArray` layout for UTF-8 strings.
//!
//! `[n_full_words, word_0, .., word_{n-1}, pending_word, pending_word_len]`,
//! each full word carrying 31 bytes big-endian and the pending word the
//! trailing 0..=30 bytes.

use loyalty_types::{DecodingError, Felt};

use crate::felt::felt_to_usize;

pub const BYTES_PER_WORD: usize = 31;

/// Number of felts `encode_bytes` produces for `byte_len` bytes.
pub const fn encoded_len(byte_len: usize) -> usize {
    3 + byte_len / BYTES_PER_WORD
}

pub fn encode_string(value: &str) -> Vec<Felt> {
    encode_bytes(value.as_bytes())
}

pub fn encode_bytes(bytes: &[u8]) -> Vec<Felt> {
    let mut out = Vec::with_capacity(encoded_len(bytes.len()));
    let chunks = bytes.chunks_exact(BYTES_PER_WORD);
    let pending = chunks.remainder();
    out.push(Felt::from((bytes.len() / BYTES_PER_WORD) as u64));
    for word in chunks {
        out.push(Felt::from_bytes_be_slice(word));
    }
    out.push(Felt::from_bytes_be_slice(pending));
    out.push(Felt::from(pending.len() as u64));
    out
}

/// Decode a string starting at `start`; returns the string and the index of
/// the first felt after it.
pub fn decode_string(fields: &[Felt], start: usize) -> Result<(String, usize), DecodingError> {
    let (bytes, next) = decode_bytes(fields, start)?;
    let text = String::from_utf8(bytes).map_err(|err| DecodingError::InvalidUtf8(err.to_string()))?;
    Ok((text, next))
}

pub fn decode_bytes(fields: &[Felt], start: usize) -> Result<(Vec<u8>, usize), DecodingError> {
    let available = fields.len().saturating_sub(start);
    let truncated = |needed: usize| DecodingError::Truncated {
        kind: "byte array",
        index: start,
        needed,
        available,
    };

    let count_felt = fields.get(start).ok_or_else(|| truncated(3))?;
    let full_words = felt_to_usize(count_felt, start)?;
    let needed = full_words.checked_add(3).ok_or(DecodingError::InvalidLength {
        kind: "byte array",
        value: full_words as u64,
    })?;
    if needed > available {
        return Err(truncated(needed));
    }

    let mut bytes = Vec::with_capacity(full_words * BYTES_PER_WORD + BYTES_PER_WORD);
    for offset in 0..full_words {
        let index = start + 1 + offset;
        bytes.extend_from_slice(&word_bytes(&fields[index], BYTES_PER_WORD, index)?);
    }

    let pending_index = start + 1 + full_words;
    let pending_len = felt_to_usize(&fields[pending_index + 1], pending_index + 1)?;
    if pending_len >= BYTES_PER_WORD {
        return Err(DecodingError::InvalidLength {
            kind: "pending word",
            value: pending_len as u64,
        });
    }
    bytes.extend_from_slice(&word_bytes(&fields[pending_index], pending_len, pending_index)?);

    Ok((bytes, start + needed))
}

fn word_bytes(word: &Felt, len: usize, index: usize) -> Result<Vec<u8>, DecodingError> {
    let raw = word.to_bytes_be();
    if raw[..32 - len].iter().any(|b| *b != 0) {
        return Err(DecodingError::OutOfRange {
            kind: "byte array word",
            index,
        });
    }
    Ok(raw[32 - len..].to_vec())
}
