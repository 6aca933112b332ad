//! Status command implementation

use super::Context;
use anyhow::{Context as _, Result};
use mercato_core::{EventLog, ListingStore};
use mercato_projector::{FeedRunner, ListingProjector};

pub fn execute(ctx: &Context) -> Result<()> {
    let log = ctx.open_feed_reader()?;
    let store = ctx.open_store()?;

    println!("\nIndexer Status");
    println!("{}", "=".repeat(60));

    let feed = log.stats().context("Failed to read feed stats")?;
    println!("\nEvent Feed: {}", ctx.config.feed.base_dir.display());
    println!("  Events: {}", feed.event_count);
    match feed.newest_event_id {
        Some(id) => println!("  Newest Event ID: {}", id),
        None => println!("  Newest Event ID: -"),
    }
    println!("  Files: {} ({} bytes)", feed.file_count, feed.total_bytes);

    let status = store.status().context("Failed to read store status")?;
    println!("\nListing Store: {}", ctx.config.store.path.display());
    println!("  Schema Version: {}", status.schema_version);
    match status.cursor {
        Some(cursor) => println!("  Last Applied Event ID: {}", cursor),
        None => println!("  Last Applied Event ID: -"),
    }
    println!("  Active Listings: {}", status.active_listings);
    println!("  Sold Listings: {}", status.sold_listings);
    println!("  Tracked Keys: {}", status.tracked_keys);
    println!("  Rejected Events: {}", status.rejected_events);
    if let Some(updated_at) = status.updated_at {
        println!("  Updated At: {}", updated_at.to_rfc3339());
    }

    let runner = FeedRunner::new(log, store, ListingProjector::new(ctx.config.projector.clone()));
    let lag = runner.lag().context("Failed to compute lag")?;
    if lag > 0 {
        println!("\n⚠️  Projection lag: {} event(s) behind", lag);
        println!("Run 'mercato project' to catch up");
    } else {
        println!("\n✓ Projection is up to date");
    }

    Ok(())
}
