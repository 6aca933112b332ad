use mercato_core::{
    error::Result,
    traits::{ListingStore, ListingTxn},
    types::{
        EventEnvelope, ListingCanceled, ListingCreated, ListingId, ListingPurchased,
        ListingRecord, ListingUpdated, MarketplaceEvent,
    },
    ProjectorConfig, SoldPolicy,
};
use std::fmt;

/// What applying one event did to the listings table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplyOutcome {
    /// The store changed
    Applied,
    /// Creation of a listing that already exists
    Duplicate,
    /// The event references a listing that is not in the store
    Missing,
    /// Ignored because the listing is sold
    Terminal,
    /// Not newer than the last event applied to the same listing
    Stale,
}

impl ApplyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Duplicate => "duplicate",
            Self::Missing => "missing",
            Self::Terminal => "terminal",
            Self::Stale => "stale",
        }
    }
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listing projector
///
/// Folds marketplace events into the listings table. Every handler runs
/// inside the caller's transaction and never fails on business grounds:
/// duplicates, gaps and events for sold listings come back as outcomes.
#[derive(Debug, Clone, Default)]
pub struct ListingProjector {
    config: ProjectorConfig,
}

impl ListingProjector {
    pub fn new(config: ProjectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProjectorConfig {
        &self.config
    }

    /// Insert the listing unless it already exists
    pub fn on_listing_created<T: ListingTxn>(
        &self,
        txn: &mut T,
        event: &ListingCreated,
    ) -> Result<ApplyOutcome> {
        let id = event.listing_id();
        if txn.get(&id)?.is_some() {
            return Ok(ApplyOutcome::Duplicate);
        }

        txn.insert(&ListingRecord::new(id, event.price))?;
        Ok(ApplyOutcome::Applied)
    }

    pub fn on_listing_updated<T: ListingTxn>(
        &self,
        txn: &mut T,
        event: &ListingUpdated,
    ) -> Result<ApplyOutcome> {
        let mut record = match self.load_mutable(txn, &event.listing_id())? {
            Ok(record) => record,
            Err(outcome) => return Ok(outcome),
        };

        record.price = event.new_price;
        txn.update(&record)?;
        Ok(ApplyOutcome::Applied)
    }

    pub fn on_listing_purchased<T: ListingTxn>(
        &self,
        txn: &mut T,
        event: &ListingPurchased,
    ) -> Result<ApplyOutcome> {
        let mut record = match self.load_mutable(txn, &event.listing_id())? {
            Ok(record) => record,
            Err(outcome) => return Ok(outcome),
        };

        record.buyer = Some(event.buyer);
        txn.update(&record)?;
        Ok(ApplyOutcome::Applied)
    }

    /// Delete the listing; a canceled listing leaves no row behind
    pub fn on_listing_canceled<T: ListingTxn>(
        &self,
        txn: &mut T,
        event: &ListingCanceled,
    ) -> Result<ApplyOutcome> {
        let id = event.listing_id();
        if let Err(outcome) = self.load_mutable(txn, &id)? {
            return Ok(outcome);
        }

        txn.remove(&id)?;
        Ok(ApplyOutcome::Applied)
    }

    /// Fetch a listing that a non-creation event may change, or the
    /// outcome explaining why it may not
    fn load_mutable<T: ListingTxn>(
        &self,
        txn: &T,
        id: &ListingId,
    ) -> Result<std::result::Result<ListingRecord, ApplyOutcome>> {
        Ok(match txn.get(id)? {
            None => Err(ApplyOutcome::Missing),
            Some(record) if record.is_sold() && self.config.sold_policy == SoldPolicy::Terminal => {
                Err(ApplyOutcome::Terminal)
            }
            Some(record) => Ok(record),
        })
    }

    /// Route an envelope to its handler, enforcing per-key log order
    pub fn apply<T: ListingTxn>(&self, txn: &mut T, envelope: &EventEnvelope) -> Result<ApplyOutcome> {
        let id = envelope.listing_id();

        let guarded = match envelope.position {
            Some(position) if self.config.enforce_key_order => {
                if let Some(last) = txn.key_position(&id)? {
                    if position <= last {
                        tracing::debug!(
                            "{} for {} at {} is stale (last applied at {})",
                            envelope.event.kind(),
                            id,
                            position,
                            last
                        );
                        return Ok(ApplyOutcome::Stale);
                    }
                }
                Some(position)
            }
            _ => None,
        };

        let outcome = match &envelope.event {
            MarketplaceEvent::Created(event) => self.on_listing_created(txn, event)?,
            MarketplaceEvent::Updated(event) => self.on_listing_updated(txn, event)?,
            MarketplaceEvent::Purchased(event) => self.on_listing_purchased(txn, event)?,
            MarketplaceEvent::Canceled(event) => self.on_listing_canceled(txn, event)?,
        };

        if outcome == ApplyOutcome::Applied {
            if let Some(position) = guarded {
                txn.set_key_position(&id, position)?;
            }
        }

        tracing::debug!("{} for {}: {}", envelope.event.kind(), id, outcome);
        Ok(outcome)
    }

    /// Apply a single envelope in its own transaction
    ///
    /// Does not move the feed cursor.
    pub fn apply_to<S: ListingStore>(&self, store: &S, envelope: &EventEnvelope) -> Result<ApplyOutcome> {
        let mut txn = store.begin_txn()?;
        let outcome = self.apply(&mut txn, envelope)?;
        txn.commit(None)?;
        Ok(outcome)
    }
}
