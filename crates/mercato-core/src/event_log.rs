//! Event log trait and types
//!
//! The feed the chain watcher appends raw marketplace events to, and the
//! projector tails. Entries are opaque bytes here; decoding happens when
//! they are projected so a malformed entry never blocks the log.

use crate::error::{MercatoError, Result};
use crate::types::EventId;
use parking_lot::Mutex;

/// Iterator over events
pub trait EventLogIterator: Iterator<Item = Result<(EventId, Vec<u8>)>> + Send {}

impl<T: Iterator<Item = Result<(EventId, Vec<u8>)>> + Send> EventLogIterator for T {}

/// Append-only event storage
///
/// Ids are assigned by the log, starting at 0 and increasing by one per
/// entry. A single writer is assumed.
pub trait EventLog: Send + Sync {
    /// Append one entry, returning its id
    fn append(&self, event_bytes: &[u8]) -> Result<EventId>;

    /// Append several entries; returns the id of the first one
    fn append_batch(&self, events: &[Vec<u8>]) -> Result<EventId>;

    /// Id the next appended entry will get
    fn next_event_id(&self) -> Result<EventId>;

    /// Iterate over events from `start` (inclusive) to `end` (exclusive).
    /// If `end` is None, iterates to the latest event.
    fn iter_range(&self, start: EventId, end: Option<EventId>)
        -> Result<Box<dyn EventLogIterator>>;

    /// Get a single event by ID
    fn get(&self, event_id: EventId) -> Result<Option<Vec<u8>>> {
        let mut iter = self.iter_range(event_id, Some(event_id + 1))?;
        match iter.next() {
            Some(Ok((id, data))) if id == event_id => Ok(Some(data)),
            Some(Ok(_)) | None => Ok(None),
            Some(Err(e)) => Err(e),
        }
    }

    /// Flush buffered writes to disk
    fn sync(&self) -> Result<()>;

    fn stats(&self) -> Result<EventLogStats>;
}

/// Statistics about the event log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLogStats {
    pub event_count: u64,

    /// Id of the newest entry, `None` while empty
    pub newest_event_id: Option<EventId>,

    pub total_bytes: u64,

    pub file_count: usize,
}

/// Event log held in memory, for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    events: Mutex<Vec<Vec<u8>>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventLog for MemoryEventLog {
    fn append(&self, event_bytes: &[u8]) -> Result<EventId> {
        let mut events = self.events.lock();
        events.push(event_bytes.to_vec());
        Ok(events.len() as EventId - 1)
    }

    fn append_batch(&self, batch: &[Vec<u8>]) -> Result<EventId> {
        if batch.is_empty() {
            return Err(MercatoError::InvalidState("Cannot append empty batch".into()));
        }
        let mut events = self.events.lock();
        let first = events.len() as EventId;
        events.extend(batch.iter().cloned());
        Ok(first)
    }

    fn next_event_id(&self) -> Result<EventId> {
        Ok(self.events.lock().len() as EventId)
    }

    fn iter_range(
        &self,
        start: EventId,
        end: Option<EventId>,
    ) -> Result<Box<dyn EventLogIterator>> {
        let events = self.events.lock();
        let end = end.unwrap_or(events.len() as EventId).min(events.len() as EventId);
        let slice: Vec<Result<(EventId, Vec<u8>)>> = (start..end)
            .map(|id| Ok((id, events[id as usize].clone())))
            .collect();
        Ok(Box::new(slice.into_iter()))
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }

    fn stats(&self) -> Result<EventLogStats> {
        let events = self.events.lock();
        Ok(EventLogStats {
            event_count: events.len() as u64,
            newest_event_id: (events.len() as EventId).checked_sub(1),
            total_bytes: events.iter().map(|e| e.len() as u64).sum(),
            file_count: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_assigns_sequential_ids() {
        let log = MemoryEventLog::new();
        assert_eq!(log.append(b"a").unwrap(), 0);
        assert_eq!(log.append_batch(&[b"b".to_vec(), b"c".to_vec()]).unwrap(), 1);
        assert_eq!(log.next_event_id().unwrap(), 3);

        let entries: Vec<_> = log.iter_range(1, None).unwrap().map(|e| e.unwrap()).collect();
        assert_eq!(entries, vec![(1, b"b".to_vec()), (2, b"c".to_vec())]);

        assert_eq!(log.get(2).unwrap(), Some(b"c".to_vec()));
        assert_eq!(log.get(9).unwrap(), None);
        assert!(log.append_batch(&[]).is_err());
    }

    #[test]
    fn test_iter_past_end_is_empty() {
        let log = MemoryEventLog::new();
        log.append(b"a").unwrap();
        assert_eq!(log.iter_range(5, None).unwrap().count(), 0);
        assert_eq!(log.stats().unwrap().newest_event_id, Some(0));
    }
}
