use crate::error::Result;
use crate::filter::ListingFilter;
use crate::types::{EventId, ListingId, ListingRecord, LogPosition, RejectedEvent, StoreStatus};

/// Write transaction against a listing store
///
/// Holds the store's write lock for its whole lifetime, so applying a batch
/// is serialized against every other writer. Dropping an uncommitted
/// transaction rolls it back.
///
/// Note: Not required to be Send, as the SQLite backend is thread-affine
pub trait ListingTxn {
    /// Look up a listing, seeing this transaction's own writes
    fn get(&self, id: &ListingId) -> Result<Option<ListingRecord>>;

    /// Insert a listing that does not exist yet
    fn insert(&mut self, record: &ListingRecord) -> Result<()>;

    /// Overwrite price and buyer of an existing listing
    fn update(&mut self, record: &ListingRecord) -> Result<()>;

    /// Delete a listing; returns whether it existed
    fn remove(&mut self, id: &ListingId) -> Result<bool>;

    /// Highest log position that changed this key, kept across deletion
    fn key_position(&self, id: &ListingId) -> Result<Option<LogPosition>>;

    fn set_key_position(&mut self, id: &ListingId, position: LogPosition) -> Result<()>;

    /// Remember a feed entry that could not be decoded
    fn record_rejected(&mut self, event_id: EventId, bytes: &[u8], reason: &str) -> Result<()>;

    /// Commit, moving the feed cursor to `cursor` when given
    fn commit(self, cursor: Option<EventId>) -> Result<()>;

    fn rollback(self);
}

/// Keyed table of projected listings
///
/// Provides:
/// - Transactional writes through [`ListingTxn`]
/// - Point and filtered reads for the query side
/// - Cursor tracking for the feed runner
pub trait ListingStore: Send + Sync {
    type Txn<'a>: ListingTxn
    where
        Self: 'a;

    /// Begin a write transaction
    fn begin_txn(&self) -> Result<Self::Txn<'_>>;

    fn get(&self, id: &ListingId) -> Result<Option<ListingRecord>>;

    /// Listings matching `filter`, ordered by key
    fn list(&self, filter: &ListingFilter) -> Result<Vec<ListingRecord>>;

    /// Last feed event applied, `None` before the first commit with a cursor
    fn get_cursor(&self) -> Result<Option<EventId>>;

    /// Most recent rejected feed entries first
    fn rejected(&self, limit: usize) -> Result<Vec<RejectedEvent>>;

    fn status(&self) -> Result<StoreStatus>;
}
