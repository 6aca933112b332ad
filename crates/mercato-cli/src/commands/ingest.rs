//! Ingest command implementation

use super::Context;
use anyhow::{Context as _, Result};
use mercato_core::EventLog;
use std::path::PathBuf;

pub fn execute(ctx: &Context, file: PathBuf) -> Result<()> {
    let data = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let mut entries = Vec::new();
    let mut skipped = 0usize;
    for (line_no, line) in data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        // Field validation happens at projection time; only framing is checked here
        match serde_json::from_str::<serde_json::Value>(line) {
            Ok(value) if value.is_object() => entries.push(line.as_bytes().to_vec()),
            Ok(_) => {
                eprintln!("line {}: not a JSON object, skipped", line_no + 1);
                skipped += 1;
            }
            Err(e) => {
                eprintln!("line {}: {}, skipped", line_no + 1, e);
                skipped += 1;
            }
        }
    }

    if entries.is_empty() {
        println!("No events to ingest ({} line(s) skipped)", skipped);
        return Ok(());
    }

    let log = ctx.open_feed()?;
    let first = log
        .append_batch(&entries)
        .context("Failed to append to event feed")?;
    log.sync().context("Failed to sync event feed")?;

    println!(
        "✓ Appended {} event(s) as #{}..#{} ({} line(s) skipped)",
        entries.len(),
        first,
        first + entries.len() as u64 - 1,
        skipped
    );
    Ok(())
}
