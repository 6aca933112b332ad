use mercato_core::error::{MercatoError, Result};
use rusqlite::Connection;

/// Schema version written by this build
pub const SCHEMA_VERSION: u32 = 1;

/// Create all tables if they do not exist yet
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS projection_meta (
            id INTEGER PRIMARY KEY CHECK (id = 0),
            last_applied_event_id INTEGER NOT NULL DEFAULT -1,
            schema_version INTEGER NOT NULL,
            updated_at TEXT
        );

        CREATE TABLE IF NOT EXISTS listings (
            id TEXT PRIMARY KEY,
            nft_address TEXT NOT NULL,
            token_id TEXT NOT NULL,
            seller TEXT NOT NULL,
            price TEXT NOT NULL,
            buyer TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_listings_token ON listings (nft_address, token_id);
        CREATE INDEX IF NOT EXISTS idx_listings_seller ON listings (seller);

        CREATE TABLE IF NOT EXISTS listing_positions (
            id TEXT PRIMARY KEY,
            block_number INTEGER NOT NULL,
            log_index INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS rejected_events (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL,
            event_bytes BLOB NOT NULL,
            reason TEXT NOT NULL,
            rejected_at TEXT NOT NULL
        );",
    )
    .map_err(|e| MercatoError::Store(e.to_string()))?;

    // -1 means no events processed yet
    conn.execute(
        "INSERT OR IGNORE INTO projection_meta (id, last_applied_event_id, schema_version)
         VALUES (0, -1, ?1)",
        [SCHEMA_VERSION as i64],
    )
    .map_err(|e| MercatoError::Store(e.to_string()))?;

    migrate(conn, SCHEMA_VERSION)
}

pub fn schema_version(conn: &Connection) -> Result<u32> {
    let version: i64 = conn
        .query_row(
            "SELECT schema_version FROM projection_meta WHERE id = 0",
            [],
            |row| row.get(0),
        )
        .map_err(|e| MercatoError::Store(e.to_string()))?;
    Ok(version as u32)
}

/// Bring the stored schema version up to `target_version`
///
/// A database written by a newer build is refused rather than downgraded.
pub fn migrate(conn: &Connection, target_version: u32) -> Result<()> {
    let current_version = schema_version(conn)?;

    if target_version < current_version {
        return Err(MercatoError::InvalidState(format!(
            "Database schema version {} is newer than supported version {}",
            current_version, target_version
        )));
    }

    if current_version == target_version {
        return Ok(());
    }

    tracing::info!(
        "Migrating listing store schema from v{} to v{}",
        current_version,
        target_version
    );
    conn.execute(
        "UPDATE projection_meta SET schema_version = ?1 WHERE id = 0",
        [target_version as i64],
    )
    .map_err(|e| MercatoError::Store(e.to_string()))?;

    Ok(())
}
