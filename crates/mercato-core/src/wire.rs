//! JSON wire format of feed entries
//!
//! One JSON object per entry, tagged by the contract event name:
//!
//! ```json
//! {"type":"ListingCreated","nftAddress":"0xAb..","tokenId":"1","seller":"0x..","price":"100","blockNumber":12,"logIndex":0}
//! ```
//!
//! Integers may be decimal strings, `0x` hex strings or JSON integers.
//! Decoding is strict: anything that cannot be turned into a typed
//! [`EventEnvelope`] is a [`MercatoError::MalformedEvent`].

use crate::error::{MercatoError, Result};
use crate::types::{
    lower_hex, EventEnvelope, ListingCanceled, ListingCreated, ListingPurchased, ListingUpdated,
    LogPosition, MarketplaceEvent,
};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Unsigned integer as it may appear on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawUint {
    Number(u64),
    Text(String),
}

impl From<U256> for RawUint {
    fn from(value: U256) -> Self {
        Self::Text(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListingCreated {
    pub nft_address: String,
    pub token_id: RawUint,
    pub seller: String,
    pub price: RawUint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListingUpdated {
    pub nft_address: String,
    pub token_id: RawUint,
    pub seller: String,
    pub new_price: RawUint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListingPurchased {
    pub nft_address: String,
    pub token_id: RawUint,
    pub seller: String,
    pub buyer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListingCanceled {
    pub nft_address: String,
    pub token_id: RawUint,
    pub seller: String,
}

/// Untyped event body, tagged by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RawEvent {
    ListingCreated(RawListingCreated),
    ListingUpdated(RawListingUpdated),
    ListingPurchased(RawListingPurchased),
    ListingCanceled(RawListingCanceled),
}

/// Untyped feed entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEnvelope {
    #[serde(flatten)]
    pub event: RawEvent,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<u64>,
}

impl RawEnvelope {
    /// Validate every field and build the typed envelope.
    pub fn decode(&self) -> Result<EventEnvelope> {
        let position = match (self.block_number, self.log_index) {
            (Some(block), Some(index)) => Some(LogPosition::new(block, index)),
            (None, None) => None,
            _ => {
                return Err(MercatoError::MalformedEvent(
                    "blockNumber and logIndex must be given together".into(),
                ))
            }
        };

        let event = match &self.event {
            RawEvent::ListingCreated(raw) => MarketplaceEvent::Created(ListingCreated {
                nft_address: parse_address("nftAddress", &raw.nft_address)?,
                token_id: parse_uint("tokenId", &raw.token_id)?,
                seller: parse_address("seller", &raw.seller)?,
                price: parse_uint("price", &raw.price)?,
            }),
            RawEvent::ListingUpdated(raw) => MarketplaceEvent::Updated(ListingUpdated {
                nft_address: parse_address("nftAddress", &raw.nft_address)?,
                token_id: parse_uint("tokenId", &raw.token_id)?,
                seller: parse_address("seller", &raw.seller)?,
                new_price: parse_uint("newPrice", &raw.new_price)?,
            }),
            RawEvent::ListingPurchased(raw) => MarketplaceEvent::Purchased(ListingPurchased {
                nft_address: parse_address("nftAddress", &raw.nft_address)?,
                token_id: parse_uint("tokenId", &raw.token_id)?,
                seller: parse_address("seller", &raw.seller)?,
                buyer: parse_address("buyer", &raw.buyer)?,
            }),
            RawEvent::ListingCanceled(raw) => MarketplaceEvent::Canceled(ListingCanceled {
                nft_address: parse_address("nftAddress", &raw.nft_address)?,
                token_id: parse_uint("tokenId", &raw.token_id)?,
                seller: parse_address("seller", &raw.seller)?,
            }),
        };

        Ok(EventEnvelope { position, event })
    }
}

impl From<&EventEnvelope> for RawEnvelope {
    fn from(envelope: &EventEnvelope) -> Self {
        let event = match &envelope.event {
            MarketplaceEvent::Created(e) => RawEvent::ListingCreated(RawListingCreated {
                nft_address: lower_hex(&e.nft_address),
                token_id: e.token_id.into(),
                seller: lower_hex(&e.seller),
                price: e.price.into(),
            }),
            MarketplaceEvent::Updated(e) => RawEvent::ListingUpdated(RawListingUpdated {
                nft_address: lower_hex(&e.nft_address),
                token_id: e.token_id.into(),
                seller: lower_hex(&e.seller),
                new_price: e.new_price.into(),
            }),
            MarketplaceEvent::Purchased(e) => RawEvent::ListingPurchased(RawListingPurchased {
                nft_address: lower_hex(&e.nft_address),
                token_id: e.token_id.into(),
                seller: lower_hex(&e.seller),
                buyer: lower_hex(&e.buyer),
            }),
            MarketplaceEvent::Canceled(e) => RawEvent::ListingCanceled(RawListingCanceled {
                nft_address: lower_hex(&e.nft_address),
                token_id: e.token_id.into(),
                seller: lower_hex(&e.seller),
            }),
        };

        Self {
            event,
            block_number: envelope.position.map(|p| p.block_number),
            log_index: envelope.position.map(|p| p.log_index),
        }
    }
}

/// Decode one feed entry.
pub fn decode_event(bytes: &[u8]) -> Result<EventEnvelope> {
    let raw: RawEnvelope = serde_json::from_slice(bytes)
        .map_err(|e| MercatoError::MalformedEvent(e.to_string()))?;
    raw.decode()
}

/// Encode an envelope as a feed entry.
pub fn encode_event(envelope: &EventEnvelope) -> Result<Vec<u8>> {
    serde_json::to_vec(&RawEnvelope::from(envelope))
        .map_err(|e| MercatoError::Serialization(e.to_string()))
}

fn parse_address(field: &str, value: &str) -> Result<Address> {
    let address = Address::from_str(value.trim()).map_err(|e| {
        MercatoError::MalformedEvent(format!("invalid {} '{}': {}", field, value, e))
    })?;

    if address.is_zero() {
        return Err(MercatoError::MalformedEvent(format!(
            "{} must not be the zero address",
            field
        )));
    }

    Ok(address)
}

fn parse_uint(field: &str, value: &RawUint) -> Result<U256> {
    let text = match value {
        RawUint::Number(n) => return Ok(U256::from(*n)),
        RawUint::Text(text) => text.trim(),
    };

    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() => U256::from_str_radix(hex, 16),
        None if !text.is_empty() => U256::from_str_radix(text, 10),
        _ => {
            return Err(MercatoError::MalformedEvent(format!(
                "{} must not be empty",
                field
            )))
        }
    };

    parsed.map_err(|e| MercatoError::MalformedEvent(format!("invalid {} '{}': {}", field, text, e)))
}
