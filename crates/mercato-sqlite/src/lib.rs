//! SQLite-backed listing store
//!
//! Persists the projected listings table so the read side survives
//! restarts and can be queried with ad-hoc SQL.
//!
//! Key features:
//! - Cursor tracking for the feed runner
//! - Per-key log positions that outlive canceled listings
//! - WAL mode for concurrent readers
//! - Atomic batch application via `BEGIN IMMEDIATE`

pub mod schema;
pub mod store;
pub mod txn;

pub use store::SqliteListingStore;
pub use txn::SqliteListingTxn;
