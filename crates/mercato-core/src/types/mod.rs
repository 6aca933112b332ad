pub mod event;
pub mod listing;
pub mod status;

pub use event::{
    EventEnvelope, EventId, ListingCanceled, ListingCreated, ListingPurchased, ListingUpdated,
    LogPosition, MarketplaceEvent,
};
pub use listing::{lower_hex, ListingId, ListingRecord, ListingStatus};
pub use status::{RejectedEvent, StoreStatus};
