//! In-memory listing store
//!
//! A `BTreeMap` keyed by the listing key string behind a single mutex. A
//! transaction holds the mutex and writes in place, keeping an undo log so a
//! rollback (or drop) restores the previous state.

use crate::error::Result;
use crate::filter::ListingFilter;
use crate::traits::{ListingStore, ListingTxn};
use crate::types::{
    EventId, ListingId, ListingRecord, ListingStatus, LogPosition, RejectedEvent, StoreStatus,
};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
struct MemoryState {
    listings: BTreeMap<String, ListingRecord>,
    positions: HashMap<String, LogPosition>,
    rejected: Vec<RejectedEvent>,
    cursor: Option<EventId>,
    updated_at: Option<DateTime<Utc>>,
}

enum Undo {
    Listing(String, Option<ListingRecord>),
    Position(String, Option<LogPosition>),
    Rejected,
}

/// Listing store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryListingStore {
    state: Mutex<MemoryState>,
}

impl MemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of listings currently stored (active and sold).
    pub fn len(&self) -> usize {
        self.state.lock().listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ListingStore for MemoryListingStore {
    type Txn<'a> = MemoryListingTxn<'a>;

    fn begin_txn(&self) -> Result<Self::Txn<'_>> {
        Ok(MemoryListingTxn {
            state: self.state.lock(),
            undo: Vec::new(),
            done: false,
        })
    }

    fn get(&self, id: &ListingId) -> Result<Option<ListingRecord>> {
        Ok(self.state.lock().listings.get(&id.key()).cloned())
    }

    fn list(&self, filter: &ListingFilter) -> Result<Vec<ListingRecord>> {
        let state = self.state.lock();
        let matching = state.listings.values().filter(|r| filter.matches(r)).cloned();

        Ok(match filter.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    fn get_cursor(&self) -> Result<Option<EventId>> {
        Ok(self.state.lock().cursor)
    }

    fn rejected(&self, limit: usize) -> Result<Vec<RejectedEvent>> {
        let state = self.state.lock();
        Ok(state.rejected.iter().rev().take(limit).cloned().collect())
    }

    fn status(&self) -> Result<StoreStatus> {
        let state = self.state.lock();
        let sold = state
            .listings
            .values()
            .filter(|r| r.status() == ListingStatus::Sold)
            .count() as u64;

        Ok(StoreStatus {
            active_listings: state.listings.len() as u64 - sold,
            sold_listings: sold,
            tracked_keys: state.positions.len() as u64,
            rejected_events: state.rejected.len() as u64,
            cursor: state.cursor,
            schema_version: 1,
            updated_at: state.updated_at,
        })
    }
}

/// Write transaction over [`MemoryListingStore`]
pub struct MemoryListingTxn<'a> {
    state: MutexGuard<'a, MemoryState>,
    undo: Vec<Undo>,
    done: bool,
}

impl MemoryListingTxn<'_> {
    fn undo_all(&mut self) {
        while let Some(entry) = self.undo.pop() {
            match entry {
                Undo::Listing(key, Some(previous)) => {
                    self.state.listings.insert(key, previous);
                }
                Undo::Listing(key, None) => {
                    self.state.listings.remove(&key);
                }
                Undo::Position(key, Some(previous)) => {
                    self.state.positions.insert(key, previous);
                }
                Undo::Position(key, None) => {
                    self.state.positions.remove(&key);
                }
                Undo::Rejected => {
                    self.state.rejected.pop();
                }
            }
        }
        self.done = true;
    }
}

impl ListingTxn for MemoryListingTxn<'_> {
    fn get(&self, id: &ListingId) -> Result<Option<ListingRecord>> {
        Ok(self.state.listings.get(&id.key()).cloned())
    }

    fn insert(&mut self, record: &ListingRecord) -> Result<()> {
        let previous = self.state.listings.insert(record.id.clone(), record.clone());
        self.undo.push(Undo::Listing(record.id.clone(), previous));
        Ok(())
    }

    fn update(&mut self, record: &ListingRecord) -> Result<()> {
        self.insert(record)
    }

    fn remove(&mut self, id: &ListingId) -> Result<bool> {
        let key = id.key();
        let previous = self.state.listings.remove(&key);
        let existed = previous.is_some();
        self.undo.push(Undo::Listing(key, previous));
        Ok(existed)
    }

    fn key_position(&self, id: &ListingId) -> Result<Option<LogPosition>> {
        Ok(self.state.positions.get(&id.key()).copied())
    }

    fn set_key_position(&mut self, id: &ListingId, position: LogPosition) -> Result<()> {
        let key = id.key();
        let previous = self.state.positions.insert(key.clone(), position);
        self.undo.push(Undo::Position(key, previous));
        Ok(())
    }

    fn record_rejected(&mut self, event_id: EventId, bytes: &[u8], reason: &str) -> Result<()> {
        self.state.rejected.push(RejectedEvent {
            event_id,
            event_bytes: bytes.to_vec(),
            reason: reason.to_string(),
            rejected_at: Utc::now(),
        });
        self.undo.push(Undo::Rejected);
        Ok(())
    }

    fn commit(mut self, cursor: Option<EventId>) -> Result<()> {
        if cursor.is_some() {
            self.state.cursor = cursor;
        }
        self.state.updated_at = Some(Utc::now());
        self.undo.clear();
        self.done = true;
        Ok(())
    }

    fn rollback(mut self) {
        self.undo_all();
    }
}

impl Drop for MemoryListingTxn<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.undo_all();
        }
    }
}
