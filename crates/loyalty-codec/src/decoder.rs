//! Positional decoding of read-call responses.
//!
//! A [`Cursor`] walks a flat felt array and every read advances it by exactly
//! the number of felts consumed. Responses are decoded either through the
//! statically typed [`Decode`] trait or a dynamic [`Recipe`]; both end with
//! [`Cursor::finish`] so an under- or over-run is reported instead of
//! silently producing a misaligned record.

use std::collections::BTreeMap;

use loyalty_types::{ContractAddress, DecodingError, Felt};
use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::{
    byte_array::decode_string,
    felt::{felt_to_bool, felt_to_u128, felt_to_u64, felt_to_usize},
    wide::U256,
};

/// What a list length prefix counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LengthUnit {
    /// Number of logical elements (Cairo `Array` / `Span` serialization).
    #[default]
    Elements,
    /// Number of felts spanned by the elements.
    Felts,
}

#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    fields: &'a [Felt],
    position: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(fields: &'a [Felt]) -> Self {
        Self {
            fields,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.fields.len() - self.position
    }

    pub fn is_at_end(&self) -> bool {
        self.position == self.fields.len()
    }

    /// Advance over `count` felts. Running past the end is a cursor
    /// mismatch, the same error `finish` gives for leftover felts.
    fn take(&mut self, count: usize) -> Result<&'a [Felt], DecodingError> {
        if count > self.remaining() {
            return Err(DecodingError::CursorMismatch {
                expected: self.position + count,
                actual: self.fields.len(),
            });
        }
        let start = self.position;
        self.position += count;
        Ok(&self.fields[start..self.position])
    }

    pub fn read_felt(&mut self) -> Result<Felt, DecodingError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodingError> {
        let index = self.position;
        felt_to_u64(&self.take(1)?[0], index)
    }

    pub fn read_u128(&mut self) -> Result<u128, DecodingError> {
        let index = self.position;
        felt_to_u128(&self.take(1)?[0], index)
    }

    pub fn read_usize(&mut self) -> Result<usize, DecodingError> {
        let index = self.position;
        felt_to_usize(&self.take(1)?[0], index)
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodingError> {
        let index = self.position;
        felt_to_bool(&self.take(1)?[0], index)
    }

    pub fn read_address(&mut self) -> Result<ContractAddress, DecodingError> {
        self.read_felt().map(ContractAddress::new)
    }

    pub fn read_wide_int(&mut self) -> Result<U256, DecodingError> {
        let index = self.position;
        let limbs = self.take(2)?;
        U256::from_felts(&limbs[0], &limbs[1], index)
    }

    pub fn read_string(&mut self) -> Result<String, DecodingError> {
        let (text, next) = decode_string(self.fields, self.position)?;
        self.position = next;
        Ok(text)
    }

    /// Read a length-prefixed list, calling `read` once per element.
    pub fn read_list<T, F>(&mut self, unit: LengthUnit, mut read: F) -> Result<Vec<T>, DecodingError>
    where
        F: FnMut(&mut Self) -> Result<T, DecodingError>,
    {
        let len = self.read_usize()?;
        match unit {
            LengthUnit::Elements => {
                // every element occupies at least one felt
                if len > self.remaining() {
                    return Err(DecodingError::Truncated {
                        kind: "list",
                        index: self.position,
                        needed: len,
                        available: self.remaining(),
                    });
                }
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(read(self)?);
                }
                Ok(items)
            }
            LengthUnit::Felts => {
                if len > self.remaining() {
                    return Err(DecodingError::Truncated {
                        kind: "list",
                        index: self.position,
                        needed: len,
                        available: self.remaining(),
                    });
                }
                let end = self.position + len;
                let mut items = Vec::new();
                while self.position < end {
                    items.push(read(self)?);
                }
                if self.position != end {
                    return Err(DecodingError::CursorMismatch {
                        expected: end,
                        actual: self.position,
                    });
                }
                Ok(items)
            }
        }
    }

    /// Succeeds only when every felt has been consumed.
    pub fn finish(self) -> Result<(), DecodingError> {
        if self.is_at_end() {
            Ok(())
        } else {
            Err(DecodingError::CursorMismatch {
                expected: self.fields.len(),
                actual: self.position,
            })
        }
    }
}

/// A value with a fixed positional layout.
pub trait Decode: Sized {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, DecodingError>;
}

/// Decode `T` and require that it spans the whole array.
pub fn decode_exact<T: Decode>(fields: &[Felt]) -> Result<T, DecodingError> {
    let mut cursor = Cursor::new(fields);
    let value = T::decode(&mut cursor)?;
    cursor.finish()?;
    Ok(value)
}

impl Decode for Felt {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, DecodingError> {
        cursor.read_felt()
    }
}

impl Decode for u64 {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, DecodingError> {
        cursor.read_u64()
    }
}

impl Decode for u128 {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, DecodingError> {
        cursor.read_u128()
    }
}

impl Decode for bool {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, DecodingError> {
        cursor.read_bool()
    }
}

impl Decode for ContractAddress {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, DecodingError> {
        cursor.read_address()
    }
}

impl Decode for U256 {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, DecodingError> {
        cursor.read_wide_int()
    }
}

impl Decode for String {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, DecodingError> {
        cursor.read_string()
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, DecodingError> {
        cursor.read_list(LengthUnit::Elements, T::decode)
    }
}

/// Shape of one response field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Felt,
    U64,
    Address,
    WideInt,
    Text,
    List {
        element: Box<FieldKind>,
        unit: LengthUnit,
    },
}

impl FieldKind {
    pub fn list(element: FieldKind) -> Self {
        Self::List {
            element: Box::new(element),
            unit: LengthUnit::Elements,
        }
    }

    pub fn list_in(element: FieldKind, unit: LengthUnit) -> Self {
        Self::List {
            element: Box::new(element),
            unit,
        }
    }

    fn read(&self, cursor: &mut Cursor<'_>) -> Result<Value, DecodingError> {
        Ok(match self {
            Self::Felt => Value::Felt(cursor.read_felt()?),
            Self::U64 => Value::U64(cursor.read_u64()?),
            Self::Address => Value::Address(cursor.read_address()?),
            Self::WideInt => Value::WideInt(cursor.read_wide_int()?),
            Self::Text => Value::Text(cursor.read_string()?),
            Self::List { element, unit } => {
                Value::List(cursor.read_list(*unit, |c| element.read(c))?)
            }
        })
    }
}

/// A decoded field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Felt(Felt),
    U64(u64),
    Address(ContractAddress),
    WideInt(U256),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    pub fn as_felt(&self) -> Option<Felt> {
        match self {
            Self::Felt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<ContractAddress> {
        match self {
            Self::Address(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_wide_int(&self) -> Option<U256> {
        match self {
            Self::WideInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Felt(v) => serializer.serialize_str(&loyalty_types::felt_to_fixed_hex(v)),
            Self::U64(v) => serializer.serialize_u64(*v),
            Self::Address(v) => v.serialize(serializer),
            Self::WideInt(v) => v.serialize(serializer),
            Self::Text(v) => serializer.serialize_str(v),
            Self::List(v) => v.serialize(serializer),
        }
    }
}

/// Ordered field layout for a read response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipe {
    fields: Vec<(&'static str, FieldKind)>,
}

impl Recipe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &'static str, kind: FieldKind) -> Self {
        self.fields.push((name, kind));
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &FieldKind)> {
        self.fields.iter().map(|(name, kind)| (*name, kind))
    }

    pub fn decode(&self, fields: &[Felt]) -> Result<Record, DecodingError> {
        let mut cursor = Cursor::new(fields);
        let mut values = BTreeMap::new();
        let mut order = Vec::with_capacity(self.fields.len());
        for (name, kind) in &self.fields {
            if values.contains_key(name) {
                return Err(DecodingError::Field {
                    field: *name,
                    reason: "declared twice in recipe".to_string(),
                });
            }
            values.insert(*name, kind.read(&mut cursor)?);
            order.push(*name);
        }
        cursor.finish()?;
        Ok(Record { order, values })
    }
}

/// Named values produced by a [`Recipe`], in recipe order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    order: Vec<&'static str>,
    values: BTreeMap<&'static str, Value>,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn names(&self) -> &[&'static str] {
        &self.order
    }

    fn expect<'r, T>(
        &'r self,
        name: &'static str,
        wanted: &'static str,
        pick: impl FnOnce(&'r Value) -> Option<T>,
    ) -> Result<T, DecodingError> {
        let value = self.get(name).ok_or_else(|| DecodingError::Field {
            field: name,
            reason: "missing".to_string(),
        })?;
        pick(value).ok_or_else(|| DecodingError::Field {
            field: name,
            reason: format!("expected {wanted}"),
        })
    }

    pub fn felt(&self, name: &'static str) -> Result<Felt, DecodingError> {
        self.expect(name, "felt", Value::as_felt)
    }

    pub fn u64(&self, name: &'static str) -> Result<u64, DecodingError> {
        self.expect(name, "u64", Value::as_u64)
    }

    pub fn address(&self, name: &'static str) -> Result<ContractAddress, DecodingError> {
        self.expect(name, "address", Value::as_address)
    }

    pub fn wide_int(&self, name: &'static str) -> Result<U256, DecodingError> {
        self.expect(name, "u256", Value::as_wide_int)
    }

    pub fn text(&self, name: &'static str) -> Result<&str, DecodingError> {
        self.expect(name, "text", Value::as_text)
    }

    pub fn list(&self, name: &'static str) -> Result<&[Value], DecodingError> {
        self.expect(name, "list", Value::as_list)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.order.len()))?;
        for name in &self.order {
            if let Some(value) = self.values.get(name) {
                map.serialize_entry(name, value)?;
            }
        }
        map.end()
    }
}
