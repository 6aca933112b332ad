//! File-based event feed
//!
//! Append-only journal of raw marketplace events, written by the chain
//! watcher (or `mercato ingest`) and tailed by the feed runner.
//!
//! Features:
//! - Sequential framed writes: `[event_id u64 BE][len u32 BE][bytes]`
//! - Size-based segment rotation (`events-00000000.log`, ...)
//! - One writer per directory, held through a `LOCK` file
//! - Read-only handles that follow appends made by other processes
//! - Readers stop cleanly at a partially written tail entry
//! - Append notification for push-based tailing in the same process

mod store;

pub use store::FileEventLog;
