//! Project command implementation

use super::Context;
use anyhow::{Context as _, Result};
use mercato_projector::{FeedRunner, ListingProjector};

pub fn execute(ctx: &Context, continuous: bool) -> Result<()> {
    // Appends come from other processes, so continuous mode polls the feed
    let log = ctx.open_feed_reader()?;
    let store = ctx.open_store()?;
    let projector = ListingProjector::new(ctx.config.projector.clone());
    let runner = FeedRunner::new(log, store, projector);

    if continuous {
        println!("Running projector continuously... (Press Ctrl+C to stop)");

        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;

        rt.block_on(async {
            let shutdown = runner.shutdown_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Ctrl+C received, stopping");
                    shutdown.shutdown();
                }
            });
            runner.run_continuous().await
        })
        .context("Projector failed")?;

        println!("✓ Stopped, lag {} event(s)", runner.lag()?);
        return Ok(());
    }

    println!("Running projector...");

    // One pass over everything pending, batch by batch
    let mut read = 0;
    let mut applied = 0;
    let mut skipped = 0;
    let mut rejected = 0;
    loop {
        let stats = runner.run_once().context("Projector failed")?;
        if stats.is_idle() {
            break;
        }
        read += stats.events_read;
        applied += stats.events_applied;
        skipped += stats.skipped();
        rejected += stats.rejected;
        tracing::debug!(
            "Batch: {} read, {} bytes in {:?}, cursor {:?}",
            stats.events_read,
            stats.bytes_processed,
            stats.duration,
            stats.new_cursor
        );
    }

    if read == 0 {
        println!("No events to process - projection is up to date");
    } else {
        println!(
            "✓ Processed {} events: {} applied, {} skipped, {} rejected",
            read, applied, skipped, rejected
        );
    }

    Ok(())
}
