//! Typed calldata encoding.
//!
//! Parameters are flattened in declaration order; collections carry an
//! element-count prefix the way Cairo serializes `Array`/`Span`.

use loyalty_types::{ClassHash, ContractAddress, Felt};

use crate::{byte_array::encode_string, wide::U256};

/// A value that can be appended to a calldata array.
pub trait Encode {
    fn encode(&self, out: &mut Vec<Felt>);

    fn encode_to_vec(&self) -> Vec<Felt> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}

impl Encode for Felt {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(*self);
    }
}

impl Encode for ContractAddress {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(self.felt());
    }
}

impl Encode for ClassHash {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(self.felt());
    }
}

impl Encode for U256 {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.extend(self.to_felts());
    }
}

impl Encode for str {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.extend(encode_string(self));
    }
}

impl Encode for String {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.as_str().encode(out);
    }
}

impl Encode for u64 {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(Felt::from(*self));
    }
}

impl Encode for u128 {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(Felt::from(*self));
    }
}

impl Encode for bool {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(if *self { Felt::ONE } else { Felt::ZERO });
    }
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(Felt::from(self.len() as u64));
        for item in self {
            item.encode(out);
        }
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.as_slice().encode(out);
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, out: &mut Vec<Felt>) {
        (**self).encode(out);
    }
}

/// Builder for an ordered calldata array.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Calldata {
    felts: Vec<Felt>,
}

impl Calldata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: Encode + ?Sized>(mut self, value: &T) -> Self {
        value.encode(&mut self.felts);
        self
    }

    /// Append raw felts without a length prefix.
    pub fn extend_raw(mut self, felts: impl IntoIterator<Item = Felt>) -> Self {
        self.felts.extend(felts);
        self
    }

    pub fn len(&self) -> usize {
        self.felts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.felts.is_empty()
    }

    pub fn as_slice(&self) -> &[Felt] {
        &self.felts
    }

    pub fn into_vec(self) -> Vec<Felt> {
        self.felts
    }
}

impl From<Calldata> for Vec<Felt> {
    fn from(value: Calldata) -> Self {
        value.felts
    }
}

#[cfg(test)]
mod tests {
    use loyalty_types::{ContractAddress, Felt};

    use super::{Calldata, Encode};
    use crate::wide::U256;

    #[test]
    fn concatenates_in_declaration_order() {
        let recipient = ContractAddress::new(Felt::from(0xabcu64));
        let calldata = Calldata::new()
            .push(&recipient)
            .push(&U256::from(300u64))
            .into_vec();
        assert_eq!(
            calldata,
            vec![Felt::from(0xabcu64), Felt::from(300u64), Felt::ZERO]
        );
    }

    #[test]
    fn lists_carry_element_count_prefix() {
        let ids = vec![U256::from(1u64), U256::from(2u64)];
        let felts = ids.encode_to_vec();
        assert_eq!(felts.len(), 5);
        assert_eq!(felts[0], Felt::from(2u64));
        assert_eq!(felts[3], Felt::from(2u64));
    }

    #[test]
    fn strings_use_byte_array_layout() {
        let calldata = Calldata::new().push("Gold Tier").push(&7u64);
        assert_eq!(calldata.len(), 4);
        assert_eq!(calldata.as_slice()[3], Felt::from(7u64));
    }

    #[test]
    fn raw_felts_are_not_prefixed() {
        let calldata = Calldata::new().extend_raw([Felt::ONE, Felt::from(2u64)]);
        assert_eq!(calldata.into_vec(), vec![Felt::ONE, Felt::from(2u64)]);
    }
}
