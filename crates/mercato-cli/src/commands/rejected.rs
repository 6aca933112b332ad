//! Rejected command implementation

use super::Context;
use anyhow::{Context as _, Result};
use mercato_core::ListingStore;

pub fn execute(ctx: &Context, limit: usize) -> Result<()> {
    let store = ctx.open_store()?;
    let rejected = store
        .rejected(limit)
        .context("Failed to read rejected events")?;

    if rejected.is_empty() {
        println!("✓ No rejected events");
        return Ok(());
    }

    for event in &rejected {
        println!(
            "#{} at {}: {}",
            event.event_id,
            event.rejected_at.to_rfc3339(),
            event.reason
        );
        println!("    {}", String::from_utf8_lossy(&event.event_bytes));
    }
    println!("\n{} rejected event(s) shown", rejected.len());

    Ok(())
}
