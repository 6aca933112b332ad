//! Read side of the listings table

use alloy_primitives::{Address, U256};
use mercato_core::{
    error::Result,
    filter::ListingFilter,
    traits::ListingStore,
    types::{ListingId, ListingRecord},
};
use serde::Serialize;
use std::sync::Arc;

/// A listing as seen by a connected wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingView {
    #[serde(flatten)]
    pub record: ListingRecord,
    /// The viewer is the seller
    pub is_owner: bool,
    pub is_active: bool,
}

impl ListingView {
    pub fn new(record: ListingRecord, viewer: Option<Address>) -> Self {
        // Address equality is byte equality, so hex case never matters here
        let is_owner = viewer.map_or(false, |v| v == record.seller);
        let is_active = record.is_active();
        Self {
            record,
            is_owner,
            is_active,
        }
    }
}

/// Query API over a listing store
pub struct ListingQuery<S: ListingStore> {
    store: Arc<S>,
}

impl<S: ListingStore> Clone for ListingQuery<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: ListingStore> ListingQuery<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Every listing without a buyer, ordered by key
    pub fn active_listings(&self) -> Result<Vec<ListingRecord>> {
        self.store.list(&ListingFilter::active())
    }

    pub fn listing(&self, id: &ListingId) -> Result<Option<ListingRecord>> {
        self.store.get(id)
    }

    pub fn list(&self, filter: &ListingFilter) -> Result<Vec<ListingRecord>> {
        self.store.list(filter)
    }

    /// All listings ever made for one token that still have a row
    pub fn listings_for_token(&self, nft_address: Address, token_id: U256) -> Result<Vec<ListingRecord>> {
        self.store.list(&ListingFilter::new().token(nft_address, token_id))
    }

    /// The most relevant listing of a token for `viewer`
    ///
    /// Preference order: the viewer's own listing, then the active one, then
    /// the first remaining record by key.
    pub fn listing_for_token(
        &self,
        nft_address: Address,
        token_id: U256,
        viewer: Option<Address>,
    ) -> Result<Option<ListingView>> {
        let mut listings = self.listings_for_token(nft_address, token_id)?;

        let own = viewer.and_then(|v| listings.iter().position(|r| r.seller == v));
        let chosen = own
            .or_else(|| listings.iter().position(|r| r.is_active()))
            .or(if listings.is_empty() { None } else { Some(0) });

        Ok(chosen.map(|index| ListingView::new(listings.swap_remove(index), viewer)))
    }
}
