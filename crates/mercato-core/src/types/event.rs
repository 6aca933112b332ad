//! Marketplace domain events
//!
//! These are the typed forms of the four events the marketplace contract
//! emits. Raw feed entries are decoded into them by [`crate::wire`].

use super::listing::ListingId;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Feed entry identifier - strictly monotonic u64
pub type EventId = u64;

/// On-chain emission order of an event
///
/// Field order matters: the derived ordering compares block first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogPosition {
    pub block_number: u64,
    pub log_index: u64,
}

impl LogPosition {
    pub fn new(block_number: u64, log_index: u64) -> Self {
        Self {
            block_number,
            log_index,
        }
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_number, self.log_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingCreated {
    pub nft_address: Address,
    pub token_id: U256,
    pub seller: Address,
    pub price: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingUpdated {
    pub nft_address: Address,
    pub token_id: U256,
    pub seller: Address,
    pub new_price: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPurchased {
    pub nft_address: Address,
    pub token_id: U256,
    pub seller: Address,
    pub buyer: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingCanceled {
    pub nft_address: Address,
    pub token_id: U256,
    pub seller: Address,
}

macro_rules! impl_listing_id {
    ($($event:ty),+) => {
        $(
            impl $event {
                /// Composite key recomputed from the event fields.
                pub fn listing_id(&self) -> ListingId {
                    ListingId::new(self.nft_address, self.token_id, self.seller)
                }
            }
        )+
    };
}

impl_listing_id!(ListingCreated, ListingUpdated, ListingPurchased, ListingCanceled);

/// Any marketplace event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketplaceEvent {
    Created(ListingCreated),
    Updated(ListingUpdated),
    Purchased(ListingPurchased),
    Canceled(ListingCanceled),
}

impl MarketplaceEvent {
    pub fn listing_id(&self) -> ListingId {
        match self {
            Self::Created(e) => e.listing_id(),
            Self::Updated(e) => e.listing_id(),
            Self::Purchased(e) => e.listing_id(),
            Self::Canceled(e) => e.listing_id(),
        }
    }

    /// Contract event name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created(_) => "ListingCreated",
            Self::Updated(_) => "ListingUpdated",
            Self::Purchased(_) => "ListingPurchased",
            Self::Canceled(_) => "ListingCanceled",
        }
    }
}

impl From<ListingCreated> for MarketplaceEvent {
    fn from(event: ListingCreated) -> Self {
        Self::Created(event)
    }
}

impl From<ListingUpdated> for MarketplaceEvent {
    fn from(event: ListingUpdated) -> Self {
        Self::Updated(event)
    }
}

impl From<ListingPurchased> for MarketplaceEvent {
    fn from(event: ListingPurchased) -> Self {
        Self::Purchased(event)
    }
}

impl From<ListingCanceled> for MarketplaceEvent {
    fn from(event: ListingCanceled) -> Self {
        Self::Canceled(event)
    }
}

/// Event plus its optional on-chain position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEnvelope {
    pub position: Option<LogPosition>,
    pub event: MarketplaceEvent,
}

impl EventEnvelope {
    /// Envelope without a position; bypasses the per-key ordering guard.
    pub fn new(event: impl Into<MarketplaceEvent>) -> Self {
        Self {
            position: None,
            event: event.into(),
        }
    }

    pub fn at(block_number: u64, log_index: u64, event: impl Into<MarketplaceEvent>) -> Self {
        Self {
            position: Some(LogPosition::new(block_number, log_index)),
            event: event.into(),
        }
    }

    pub fn listing_id(&self) -> ListingId {
        self.event.listing_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_orders_by_block_then_log_index() {
        assert!(LogPosition::new(1, 9) < LogPosition::new(2, 0));
        assert!(LogPosition::new(2, 0) < LogPosition::new(2, 1));
        assert_eq!(LogPosition::new(3, 3), LogPosition::new(3, 3));
    }

    #[test]
    fn test_every_event_kind_shares_the_key() {
        let nft = Address::repeat_byte(0x11);
        let seller = Address::repeat_byte(0x22);
        let token_id = U256::from(9u64);

        let events: Vec<MarketplaceEvent> = vec![
            ListingCreated { nft_address: nft, token_id, seller, price: U256::from(1u64) }.into(),
            ListingUpdated { nft_address: nft, token_id, seller, new_price: U256::from(2u64) }.into(),
            ListingPurchased { nft_address: nft, token_id, seller, buyer: Address::repeat_byte(0x33) }.into(),
            ListingCanceled { nft_address: nft, token_id, seller }.into(),
        ];

        let expected = ListingId::new(nft, token_id, seller);
        for event in &events {
            assert_eq!(event.listing_id(), expected);
        }
        assert_eq!(events[2].kind(), "ListingPurchased");
    }
}
