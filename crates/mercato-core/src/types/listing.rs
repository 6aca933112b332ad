//! Listing read model
//!
//! A listing is keyed by `(nft contract, token id, seller)`. The key string
//! layout is `"{nft}-{token_id}-{seller}"` with lowercase `0x` hex addresses
//! and a decimal token id, which is also the primary key of every store.

use crate::error::{MercatoError, Result};
use alloy_primitives::{hex, Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowercase `0x`-prefixed hex encoding of an address.
pub fn lower_hex(address: &Address) -> String {
    hex::encode_prefixed(address)
}

/// Composite listing key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListingId {
    pub nft_address: Address,
    pub token_id: U256,
    pub seller: Address,
}

impl ListingId {
    pub fn new(nft_address: Address, token_id: U256, seller: Address) -> Self {
        Self {
            nft_address,
            token_id,
            seller,
        }
    }

    /// Key string used as the primary key in stores.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            lower_hex(&self.nft_address),
            self.token_id,
            lower_hex(&self.seller)
        )
    }
}

impl FromStr for ListingId {
    type Err = MercatoError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, '-');
        let (nft, token, seller) = match (parts.next(), parts.next(), parts.next()) {
            (Some(nft), Some(token), Some(seller)) => (nft, token, seller),
            _ => {
                return Err(MercatoError::InvalidState(format!(
                    "listing id '{}' is not of the form nft-token-seller",
                    s
                )))
            }
        };

        let nft_address = Address::from_str(nft)
            .map_err(|e| MercatoError::InvalidState(format!("bad nft address in '{}': {}", s, e)))?;
        let token_id = U256::from_str_radix(token, 10)
            .map_err(|e| MercatoError::InvalidState(format!("bad token id in '{}': {}", s, e)))?;
        let seller = Address::from_str(seller)
            .map_err(|e| MercatoError::InvalidState(format!("bad seller in '{}': {}", s, e)))?;

        Ok(Self::new(nft_address, token_id, seller))
    }
}

/// Whether a listing can still be bought
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Sold,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Sold => "sold",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingStatus {
    type Err = MercatoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "sold" => Ok(Self::Sold),
            other => Err(MercatoError::Config(format!(
                "unknown listing status '{}', expected 'active' or 'sold'",
                other
            ))),
        }
    }
}

/// Projected listing entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    pub id: String,
    #[serde(with = "address_hex")]
    pub nft_address: Address,
    #[serde(with = "decimal")]
    pub token_id: U256,
    #[serde(with = "address_hex")]
    pub seller: Address,
    #[serde(with = "decimal")]
    pub price: U256,
    #[serde(with = "option_address_hex")]
    pub buyer: Option<Address>,
}

impl ListingRecord {
    /// A fresh, unsold listing.
    pub fn new(id: ListingId, price: U256) -> Self {
        Self {
            id: id.key(),
            nft_address: id.nft_address,
            token_id: id.token_id,
            seller: id.seller,
            price,
            buyer: None,
        }
    }

    pub fn listing_id(&self) -> ListingId {
        ListingId::new(self.nft_address, self.token_id, self.seller)
    }

    pub fn status(&self) -> ListingStatus {
        if self.buyer.is_some() {
            ListingStatus::Sold
        } else {
            ListingStatus::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.buyer.is_none()
    }

    pub fn is_sold(&self) -> bool {
        self.buyer.is_some()
    }
}

mod decimal {
    use alloy_primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_str_radix(&s, 10).map_err(serde::de::Error::custom)
    }
}

mod address_hex {
    use alloy_primitives::Address;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::lower_hex(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(serde::de::Error::custom)
    }
}

mod option_address_hex {
    use alloy_primitives::Address;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(
        value: &Option<Address>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(address) => serializer.serialize_some(&super::lower_hex(address)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Address>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| Address::from_str(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
