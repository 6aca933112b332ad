use mercato_core::{
    error::Result,
    event_log::EventLog,
    traits::{ListingStore, ListingTxn},
    types::EventId,
    wire::decode_event,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

use crate::projector::{ApplyOutcome, ListingProjector};

/// Feed runner: tails the event feed and projects it into a listing store
pub struct FeedRunner<L, S>
where
    L: EventLog,
    S: ListingStore,
{
    log: Arc<L>,
    store: Arc<S>,
    projector: ListingProjector,
    shutdown: ShutdownHandle,
    /// When set, the runner awaits this notification instead of polling.
    event_notify: Option<Arc<Notify>>,
}

/// Stops a running [`FeedRunner::run_continuous`] loop
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl<L, S> FeedRunner<L, S>
where
    L: EventLog,
    S: ListingStore,
{
    pub fn new(log: Arc<L>, store: Arc<S>, projector: ListingProjector) -> Self {
        Self {
            log,
            store,
            projector,
            shutdown: ShutdownHandle::default(),
            event_notify: None,
        }
    }

    /// Attach the feed's append notification for push-based tailing.
    ///
    /// When set, `run_continuous()` wakes as soon as an entry is appended
    /// instead of waiting out `poll_interval_ms`.
    pub fn with_event_notify(mut self, notify: Arc<Notify>) -> Self {
        self.event_notify = Some(notify);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn projector(&self) -> &ListingProjector {
        &self.projector
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Run one batch
    ///
    /// The batch and the new cursor are committed together, so a failure
    /// leaves the store exactly as it was and the batch is retried whole.
    pub fn run_once(&self) -> Result<RunnerStats> {
        let start = Instant::now();
        let config = self.projector.config();

        let cursor = self.store.get_cursor()?;
        let from = cursor.map_or(0, |c| c + 1);
        let next = self.log.next_event_id()?;
        if from >= next {
            return Ok(RunnerStats::empty(cursor));
        }
        let to = std::cmp::min(next, from + config.batch_events_max.max(1) as u64);

        let mut events = Vec::new();
        let mut total_bytes = 0;
        for entry in self.log.iter_range(from, Some(to))? {
            let (id, bytes) = entry?;
            total_bytes += bytes.len();
            events.push((id, bytes));

            if total_bytes >= config.batch_bytes_max {
                break;
            }
            if start.elapsed().as_millis() > config.max_apply_latency_ms as u128 {
                break;
            }
        }

        let last_id = match events.last() {
            Some((id, _)) => *id,
            None => return Ok(RunnerStats::empty(cursor)),
        };

        let mut stats = RunnerStats::empty(cursor);
        let mut txn = self.store.begin_txn()?;
        for (id, bytes) in &events {
            match decode_event(bytes) {
                Ok(envelope) => {
                    let outcome = self.projector.apply(&mut txn, &envelope)?;
                    stats.record(outcome);
                }
                Err(e) if e.is_malformed() => {
                    tracing::warn!("Rejecting feed entry {}: {}", id, e);
                    txn.record_rejected(*id, bytes, &e.to_string())?;
                    stats.rejected += 1;
                }
                Err(e) => return Err(e),
            }
        }
        txn.commit(Some(last_id))?;

        stats.events_read = events.len();
        stats.bytes_processed = total_bytes;
        stats.duration = start.elapsed();
        stats.new_cursor = Some(last_id);
        Ok(stats)
    }

    /// Run until the shutdown handle fires
    ///
    /// Errors abort the current batch only; the loop logs them and retries
    /// after a one second back-off.
    pub async fn run_continuous(&self) -> Result<()> {
        let poll_interval = Duration::from_millis(self.projector.config().poll_interval_ms);
        let no_events = Notify::new();
        let events = self.event_notify.as_deref().unwrap_or(&no_events);

        while !self.shutdown.is_shutdown() {
            // Register for wakeups before reading, so an append or a shutdown
            // that lands during run_once() is not lost
            let appended = events.notified();
            let stopped = self.shutdown.wake.notified();
            tokio::pin!(appended);
            tokio::pin!(stopped);
            appended.as_mut().enable();
            stopped.as_mut().enable();

            match self.run_once() {
                Ok(stats) if stats.is_idle() => {
                    if self.shutdown.is_shutdown() {
                        break;
                    }
                    // Caught up; wait for new entries or shutdown
                    tokio::select! {
                        _ = appended => {}
                        _ = stopped => {}
                        _ = tokio::time::sleep(poll_interval) => {}
                    }
                }
                Ok(stats) => {
                    tracing::debug!(
                        "Projected {} entries ({} applied, {} rejected), {} bytes in {:?}",
                        stats.events_read,
                        stats.events_applied,
                        stats.rejected,
                        stats.bytes_processed,
                        stats.duration
                    );
                }
                Err(e) => {
                    tracing::error!("Feed runner error: {}", e);
                    tokio::select! {
                        _ = stopped => {}
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            }
        }

        tracing::info!("Feed runner stopped");
        Ok(())
    }

    /// Number of feed entries not yet projected
    pub fn lag(&self) -> Result<u64> {
        let applied = self.store.get_cursor()?.map_or(0, |c| c + 1);
        Ok(self.log.next_event_id()?.saturating_sub(applied))
    }
}

/// Result of one [`FeedRunner::run_once`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnerStats {
    pub events_read: usize,
    pub events_applied: usize,
    pub duplicates: usize,
    pub missing: usize,
    pub terminal: usize,
    pub stale: usize,
    pub rejected: usize,
    pub bytes_processed: usize,
    pub duration: Duration,
    /// Cursor after the batch
    pub new_cursor: Option<EventId>,
}

impl RunnerStats {
    fn empty(cursor: Option<EventId>) -> Self {
        Self {
            new_cursor: cursor,
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Applied => self.events_applied += 1,
            ApplyOutcome::Duplicate => self.duplicates += 1,
            ApplyOutcome::Missing => self.missing += 1,
            ApplyOutcome::Terminal => self.terminal += 1,
            ApplyOutcome::Stale => self.stale += 1,
        }
    }

    /// Nothing was read
    pub fn is_idle(&self) -> bool {
        self.events_read == 0
    }

    /// Decoded entries that did not change the store
    pub fn skipped(&self) -> usize {
        self.duplicates + self.missing + self.terminal + self.stale
    }
}
