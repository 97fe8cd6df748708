//! Fixed layouts returned by the loyalty contracts' `get_details` views.

use loyalty_types::{ContractAddress, DecodingError, Felt};
use serde::Serialize;

use crate::{
    calldata::Encode,
    decoder::{decode_exact, Cursor, Decode, FieldKind, Recipe},
    wide::U256,
};

pub const DESCRIBE_ENTRY_POINT: &str = "get_details";

/// Collectible contract description. The four per-token lists are parallel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectibleDetails {
    pub name: String,
    pub issuer: ContractAddress,
    pub token_ids: Vec<U256>,
    pub prices: Vec<U256>,
    pub expiry_dates: Vec<u64>,
    pub descriptions: Vec<String>,
}

/// One token of a collectible, assembled from the parallel lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectibleToken<'a> {
    pub token_id: U256,
    pub price: U256,
    pub expiry_date: u64,
    pub description: &'a str,
}

impl CollectibleDetails {
    pub fn recipe() -> Recipe {
        Recipe::new()
            .field("name", FieldKind::Text)
            .field("issuer", FieldKind::Address)
            .field("token_ids", FieldKind::list(FieldKind::WideInt))
            .field("prices", FieldKind::list(FieldKind::WideInt))
            .field("expiry_dates", FieldKind::list(FieldKind::U64))
            .field("descriptions", FieldKind::list(FieldKind::Text))
    }

    pub fn from_response(fields: &[Felt]) -> Result<Self, DecodingError> {
        decode_exact(fields)
    }

    pub fn tokens(&self) -> impl Iterator<Item = CollectibleToken<'_>> {
        self.token_ids
            .iter()
            .zip(&self.prices)
            .zip(&self.expiry_dates)
            .zip(&self.descriptions)
            .map(|(((token_id, price), expiry_date), description)| CollectibleToken {
                token_id: *token_id,
                price: *price,
                expiry_date: *expiry_date,
                description,
            })
    }

    fn check_parallel_lists(&self) -> Result<(), DecodingError> {
        let expected = self.token_ids.len();
        for (field, len) in [
            ("prices", self.prices.len()),
            ("expiry_dates", self.expiry_dates.len()),
            ("descriptions", self.descriptions.len()),
        ] {
            if len != expected {
                return Err(DecodingError::Field {
                    field,
                    reason: format!("{len} entries for {expected} token ids"),
                });
            }
        }
        Ok(())
    }
}

impl Decode for CollectibleDetails {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, DecodingError> {
        let details = Self {
            name: cursor.read_string()?,
            issuer: cursor.read_address()?,
            token_ids: Vec::decode(cursor)?,
            prices: Vec::decode(cursor)?,
            expiry_dates: Vec::decode(cursor)?,
            descriptions: Vec::decode(cursor)?,
        };
        details.check_parallel_lists()?;
        Ok(details)
    }
}

impl Encode for CollectibleDetails {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.name.encode(out);
        self.issuer.encode(out);
        self.token_ids.encode(out);
        self.prices.encode(out);
        self.expiry_dates.encode(out);
        self.descriptions.encode(out);
    }
}

/// Points (fungible) contract description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointsDetails {
    pub name: String,
    pub symbol: String,
    pub owner: ContractAddress,
    pub decimals: u64,
    pub total_supply: U256,
}

impl PointsDetails {
    pub fn recipe() -> Recipe {
        Recipe::new()
            .field("name", FieldKind::Text)
            .field("symbol", FieldKind::Text)
            .field("owner", FieldKind::Address)
            .field("decimals", FieldKind::U64)
            .field("total_supply", FieldKind::WideInt)
    }

    pub fn from_response(fields: &[Felt]) -> Result<Self, DecodingError> {
        decode_exact(fields)
    }
}

impl Decode for PointsDetails {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, DecodingError> {
        Ok(Self {
            name: cursor.read_string()?,
            symbol: cursor.read_string()?,
            owner: cursor.read_address()?,
            decimals: cursor.read_u64()?,
            total_supply: cursor.read_wide_int()?,
        })
    }
}

impl Encode for PointsDetails {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.name.encode(out);
        self.symbol.encode(out);
        self.owner.encode(out);
        self.decimals.encode(out);
        self.total_supply.encode(out);
    }
}
