//! Listing filters for the query side.

use crate::types::{ListingRecord, ListingStatus};
use alloy_primitives::{Address, U256};

/// Filter for listing queries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingFilter {
    pub nft_address: Option<Address>,
    pub token_id: Option<U256>,
    pub seller: Option<Address>,
    pub buyer: Option<Address>,
    pub status: Option<ListingStatus>,
    pub limit: Option<usize>,
}

impl ListingFilter {
    /// Create a new empty filter (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Only listings that have not been sold.
    pub fn active() -> Self {
        Self::new().status(ListingStatus::Active)
    }

    pub fn nft_address(mut self, nft_address: Address) -> Self {
        self.nft_address = Some(nft_address);
        self
    }

    pub fn token_id(mut self, token_id: U256) -> Self {
        self.token_id = Some(token_id);
        self
    }

    /// Both halves of a token reference at once.
    pub fn token(self, nft_address: Address, token_id: U256) -> Self {
        self.nft_address(nft_address).token_id(token_id)
    }

    pub fn seller(mut self, seller: Address) -> Self {
        self.seller = Some(seller);
        self
    }

    pub fn buyer(mut self, buyer: Address) -> Self {
        self.buyer = Some(buyer);
        self
    }

    pub fn status(mut self, status: ListingStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a record passes every set criterion (ignores `limit`).
    pub fn matches(&self, record: &ListingRecord) -> bool {
        self.nft_address.map_or(true, |a| record.nft_address == a)
            && self.token_id.map_or(true, |t| record.token_id == t)
            && self.seller.map_or(true, |s| record.seller == s)
            && self.buyer.map_or(true, |b| record.buyer == Some(b))
            && self.status.map_or(true, |s| record.status() == s)
    }
}
