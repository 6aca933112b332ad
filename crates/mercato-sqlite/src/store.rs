use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use mercato_core::{
    error::{MercatoError, Result},
    filter::ListingFilter,
    traits::ListingStore,
    types::{lower_hex, EventId, ListingId, ListingRecord, RejectedEvent, StoreStatus},
    StoreConfig,
};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row};
use std::str::FromStr;
use std::sync::Arc;

use crate::schema;
use crate::txn::SqliteListingTxn;

pub(crate) const LISTING_COLUMNS: &str = "id, nft_address, token_id, seller, price, buyer";

/// SQLite-backed listing store
pub struct SqliteListingStore {
    conn: Arc<Mutex<Connection>>,
    config: StoreConfig,
}

impl SqliteListingStore {
    /// Open (or create) the database at `config.path`
    pub fn open(config: StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            &config.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|e| MercatoError::Store(e.to_string()))?;

        Self::configure_connection(&conn, &config)?;
        schema::init_schema(&conn)?;

        tracing::debug!("Opened listing store at {}", config.path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        })
    }

    /// Get the underlying connection (for custom queries)
    pub fn conn(&self) -> &Arc<Mutex<Connection>> {
        &self.conn
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn schema_version(&self) -> Result<u32> {
        schema::schema_version(&self.conn.lock())
    }

    fn configure_connection(conn: &Connection, cfg: &StoreConfig) -> Result<()> {
        if cfg.wal_mode {
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(|e| MercatoError::Config(e.to_string()))?;
        }

        conn.pragma_update(None, "synchronous", cfg.synchronous.as_pragma())
            .map_err(|e| MercatoError::Config(e.to_string()))?;

        conn.pragma_update(None, "cache_size", cfg.cache_size)
            .map_err(|e| MercatoError::Config(e.to_string()))?;

        Ok(())
    }
}

impl ListingStore for SqliteListingStore {
    type Txn<'a> = SqliteListingTxn<'a>;

    fn begin_txn(&self) -> Result<Self::Txn<'_>> {
        SqliteListingTxn::new(self.conn.lock())
    }

    fn get(&self, id: &ListingId) -> Result<Option<ListingRecord>> {
        let conn = self.conn.lock();
        get_listing(&conn, id)
    }

    fn list(&self, filter: &ListingFilter) -> Result<Vec<ListingRecord>> {
        let mut query = format!("SELECT {} FROM listings WHERE 1=1", LISTING_COLUMNS);
        let mut bound_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(nft_address) = &filter.nft_address {
            query.push_str(" AND nft_address = ?");
            bound_params.push(Box::new(lower_hex(nft_address)));
        }
        if let Some(token_id) = &filter.token_id {
            query.push_str(" AND token_id = ?");
            bound_params.push(Box::new(token_id.to_string()));
        }
        if let Some(seller) = &filter.seller {
            query.push_str(" AND seller = ?");
            bound_params.push(Box::new(lower_hex(seller)));
        }
        if let Some(buyer) = &filter.buyer {
            query.push_str(" AND buyer = ?");
            bound_params.push(Box::new(lower_hex(buyer)));
        }
        match filter.status {
            Some(mercato_core::ListingStatus::Active) => query.push_str(" AND buyer IS NULL"),
            Some(mercato_core::ListingStatus::Sold) => query.push_str(" AND buyer IS NOT NULL"),
            None => {}
        }

        query.push_str(" ORDER BY id");
        if let Some(limit) = filter.limit {
            query.push_str(" LIMIT ?");
            bound_params.push(Box::new(limit as i64));
        }

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&query)
            .map_err(|e| MercatoError::Store(e.to_string()))?;

        let rows = stmt
            .query_map(rusqlite::params_from_iter(bound_params.iter()), ListingRow::read)
            .map_err(|e| MercatoError::Store(e.to_string()))?;

        let mut listings = Vec::new();
        for row in rows {
            let row = row.map_err(|e| MercatoError::Store(e.to_string()))?;
            listings.push(row.into_record()?);
        }
        Ok(listings)
    }

    fn get_cursor(&self) -> Result<Option<EventId>> {
        let conn = self.conn.lock();
        let cursor: i64 = conn
            .query_row(
                "SELECT last_applied_event_id FROM projection_meta WHERE id = 0",
                [],
                |row| row.get(0),
            )
            .map_err(|e| MercatoError::Store(e.to_string()))?;

        Ok(if cursor < 0 {
            None
        } else {
            Some(cursor as EventId)
        })
    }

    fn rejected(&self, limit: usize) -> Result<Vec<RejectedEvent>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT event_id, event_bytes, reason, rejected_at FROM rejected_events
                 ORDER BY seq DESC LIMIT ?1",
            )
            .map_err(|e| MercatoError::Store(e.to_string()))?;

        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| MercatoError::Store(e.to_string()))?;

        let mut rejected = Vec::new();
        for row in rows {
            let (event_id, event_bytes, reason, rejected_at) =
                row.map_err(|e| MercatoError::Store(e.to_string()))?;
            rejected.push(RejectedEvent {
                event_id: event_id as EventId,
                event_bytes,
                reason,
                rejected_at: parse_timestamp(&rejected_at)?,
            });
        }
        Ok(rejected)
    }

    fn status(&self) -> Result<StoreStatus> {
        let conn = self.conn.lock();
        let count = |sql: &str| -> Result<u64> {
            conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|n| n as u64)
                .map_err(|e| MercatoError::Store(e.to_string()))
        };

        let active_listings = count("SELECT COUNT(*) FROM listings WHERE buyer IS NULL")?;
        let sold_listings = count("SELECT COUNT(*) FROM listings WHERE buyer IS NOT NULL")?;
        let tracked_keys = count("SELECT COUNT(*) FROM listing_positions")?;
        let rejected_events = count("SELECT COUNT(*) FROM rejected_events")?;

        let (cursor, schema_version, updated_at): (i64, i64, Option<String>) = conn
            .query_row(
                "SELECT last_applied_event_id, schema_version, updated_at
                 FROM projection_meta WHERE id = 0",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(|e| MercatoError::Store(e.to_string()))?;

        Ok(StoreStatus {
            active_listings,
            sold_listings,
            tracked_keys,
            rejected_events,
            cursor: (cursor >= 0).then_some(cursor as EventId),
            schema_version: schema_version as u32,
            updated_at: updated_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

pub(crate) fn get_listing(conn: &Connection, id: &ListingId) -> Result<Option<ListingRecord>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM listings WHERE id = ?1", LISTING_COLUMNS),
            [id.key()],
            ListingRow::read,
        )
        .optional()
        .map_err(|e| MercatoError::Store(e.to_string()))?;

    row.map(ListingRow::into_record).transpose()
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| MercatoError::Store(format!("bad timestamp '{}': {}", value, e)))
}

/// Raw column values of a `listings` row
pub(crate) struct ListingRow {
    id: String,
    nft_address: String,
    token_id: String,
    seller: String,
    price: String,
    buyer: Option<String>,
}

impl ListingRow {
    pub(crate) fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            nft_address: row.get(1)?,
            token_id: row.get(2)?,
            seller: row.get(3)?,
            price: row.get(4)?,
            buyer: row.get(5)?,
        })
    }

    pub(crate) fn into_record(self) -> Result<ListingRecord> {
        let address = |value: &str| {
            Address::from_str(value)
                .map_err(|e| MercatoError::Store(format!("bad address '{}' in {}: {}", value, self.id, e)))
        };
        let uint = |value: &str| {
            U256::from_str_radix(value, 10)
                .map_err(|e| MercatoError::Store(format!("bad number '{}' in {}: {}", value, self.id, e)))
        };

        Ok(ListingRecord {
            nft_address: address(&self.nft_address)?,
            token_id: uint(&self.token_id)?,
            seller: address(&self.seller)?,
            price: uint(&self.price)?,
            buyer: self.buyer.as_deref().map(address).transpose()?,
            id: self.id.clone(),
        })
    }
}
