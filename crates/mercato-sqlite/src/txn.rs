use chrono::Utc;
use mercato_core::{
    error::{MercatoError, Result},
    traits::ListingTxn,
    types::{lower_hex, EventId, ListingId, ListingRecord, LogPosition},
};
use parking_lot::MutexGuard;
use rusqlite::{params, Connection, OptionalExtension};

use crate::store::get_listing;

/// Write transaction holding the connection for its lifetime
pub struct SqliteListingTxn<'a> {
    conn: MutexGuard<'a, Connection>,
    in_txn: bool,
}

impl<'a> SqliteListingTxn<'a> {
    pub fn new(conn: MutexGuard<'a, Connection>) -> Result<Self> {
        conn.execute("BEGIN IMMEDIATE TRANSACTION", [])
            .map_err(|e| MercatoError::Store(e.to_string()))?;

        Ok(Self { conn, in_txn: true })
    }
}

impl ListingTxn for SqliteListingTxn<'_> {
    fn get(&self, id: &ListingId) -> Result<Option<ListingRecord>> {
        get_listing(&self.conn, id)
    }

    fn insert(&mut self, record: &ListingRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO listings (id, nft_address, token_id, seller, price, buyer)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    lower_hex(&record.nft_address),
                    record.token_id.to_string(),
                    lower_hex(&record.seller),
                    record.price.to_string(),
                    record.buyer.as_ref().map(lower_hex),
                ],
            )
            .map_err(|e| MercatoError::Store(e.to_string()))?;
        Ok(())
    }

    fn update(&mut self, record: &ListingRecord) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE listings SET price = ?1, buyer = ?2 WHERE id = ?3",
                params![
                    record.price.to_string(),
                    record.buyer.as_ref().map(lower_hex),
                    record.id,
                ],
            )
            .map_err(|e| MercatoError::Store(e.to_string()))?;

        if changed == 0 {
            return Err(MercatoError::NotFound(format!("listing {}", record.id)));
        }
        Ok(())
    }

    fn remove(&mut self, id: &ListingId) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM listings WHERE id = ?1", [id.key()])
            .map_err(|e| MercatoError::Store(e.to_string()))?;
        Ok(removed > 0)
    }

    fn key_position(&self, id: &ListingId) -> Result<Option<LogPosition>> {
        self.conn
            .query_row(
                "SELECT block_number, log_index FROM listing_positions WHERE id = ?1",
                [id.key()],
                |row| {
                    let block_number: i64 = row.get(0)?;
                    let log_index: i64 = row.get(1)?;
                    Ok(LogPosition::new(block_number as u64, log_index as u64))
                },
            )
            .optional()
            .map_err(|e| MercatoError::Store(e.to_string()))
    }

    fn set_key_position(&mut self, id: &ListingId, position: LogPosition) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO listing_positions (id, block_number, log_index) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                     block_number = excluded.block_number,
                     log_index = excluded.log_index",
                params![
                    id.key(),
                    position.block_number as i64,
                    position.log_index as i64
                ],
            )
            .map_err(|e| MercatoError::Store(e.to_string()))?;
        Ok(())
    }

    fn record_rejected(&mut self, event_id: EventId, bytes: &[u8], reason: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO rejected_events (event_id, event_bytes, reason, rejected_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![event_id as i64, bytes, reason, Utc::now().to_rfc3339()],
            )
            .map_err(|e| MercatoError::Store(e.to_string()))?;
        Ok(())
    }

    fn commit(mut self, cursor: Option<EventId>) -> Result<()> {
        if !self.in_txn {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        match cursor {
            Some(cursor) => self.conn.execute(
                "UPDATE projection_meta SET last_applied_event_id = ?1, updated_at = ?2 WHERE id = 0",
                params![cursor as i64, now],
            ),
            None => self.conn.execute(
                "UPDATE projection_meta SET updated_at = ?1 WHERE id = 0",
                params![now],
            ),
        }
        .map_err(|e| MercatoError::Store(e.to_string()))?;

        self.conn
            .execute("COMMIT", [])
            .map_err(|e| MercatoError::Store(e.to_string()))?;

        self.in_txn = false;
        Ok(())
    }

    fn rollback(mut self) {
        if self.in_txn {
            let _ = self.conn.execute("ROLLBACK", []);
            self.in_txn = false;
        }
    }
}

impl Drop for SqliteListingTxn<'_> {
    fn drop(&mut self) {
        if self.in_txn {
            let _ = self.conn.execute("ROLLBACK", []);
        }
    }
}
