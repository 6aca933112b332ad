use super::event::EventId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A feed entry that could not be decoded and was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedEvent {
    pub event_id: EventId,
    pub event_bytes: Vec<u8>,
    pub reason: String,
    pub rejected_at: DateTime<Utc>,
}

/// Snapshot of a listing store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatus {
    pub active_listings: u64,
    pub sold_listings: u64,
    /// Keys with a remembered log position (includes canceled listings).
    pub tracked_keys: u64,
    pub rejected_events: u64,
    /// Last feed event applied, `None` before the first batch.
    pub cursor: Option<EventId>,
    pub schema_version: u32,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StoreStatus {
    pub fn total_listings(&self) -> u64 {
        self.active_listings + self.sold_listings
    }
}
