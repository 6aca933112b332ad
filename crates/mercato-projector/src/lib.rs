//! Listing projector
//!
//! Folds the marketplace event feed into the listings table and serves
//! the read side.
//!
//! Key features:
//! - Idempotent handlers that tolerate duplicates and gaps
//! - Configurable treatment of sold listings
//! - Per-key ordering guard on on-chain log positions
//! - Batching (events, bytes, latency limits) with atomic cursor commits
//! - Push-based tailing and graceful shutdown

pub mod projector;
pub mod query;
pub mod runner;

pub use projector::{ApplyOutcome, ListingProjector};
pub use query::{ListingQuery, ListingView};
pub use runner::{FeedRunner, RunnerStats, ShutdownHandle};
