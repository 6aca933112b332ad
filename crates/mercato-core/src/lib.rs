//! Mercato Core: types and traits for the marketplace listing indexer
//!
//! This crate defines the abstractions shared by every other crate:
//! - Listing read model: `ListingId`, `ListingRecord`, `ListingStatus`
//! - Marketplace events and their JSON wire format
//! - Listing store traits (read side + transactional write side)
//! - Event log trait for the append-only feed journal
//! - An in-memory listing store and event log
//!
//! Key properties of the projection:
//! - Idempotent creation: a re-delivered creation never overwrites
//! - Gap tolerance: events for unknown listings are dropped, not errors
//! - Optional per-key ordering by on-chain log position

pub mod config;
pub mod error;
pub mod event_log;
pub mod filter;
pub mod memory;
pub mod traits;
pub mod types;
pub mod wire;

pub use config::{FeedConfig, MercatoConfig, ProjectorConfig, SoldPolicy, StoreConfig};
pub use error::{MercatoError, Result};
pub use event_log::{EventLog, EventLogIterator, EventLogStats, MemoryEventLog};
pub use filter::ListingFilter;
pub use memory::{MemoryListingStore, MemoryListingTxn};
pub use traits::{ListingStore, ListingTxn};
pub use types::{
    EventEnvelope, EventId, ListingCanceled, ListingCreated, ListingId, ListingPurchased,
    ListingRecord, ListingStatus, ListingUpdated, LogPosition, MarketplaceEvent, RejectedEvent,
    StoreStatus,
};
pub use wire::{decode_event, encode_event, RawEnvelope, RawEvent};
