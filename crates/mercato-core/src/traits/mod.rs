pub mod store;

pub use store::{ListingStore, ListingTxn};
