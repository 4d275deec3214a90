//! SQL schema and connection setup for the SQLite backend.
//!
//! Uses `rusqlite_migration` to manage schema migrations via SQLite's
//! `user_version` pragma. Migrations are embedded at compile time via
//! `include_str!`.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};

use crate::error::StorageError;

/// How long a statement waits on a locked database before giving up.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// All schema migrations, applied in order via `user_version` tracking.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(include_str!("migrations/001_create_metrics.sql"))])
}

/// Opens (or creates) a SQLite database at `path` with WAL mode and all
/// pending migrations applied.
///
/// With `drop_existing`, the metrics table is dropped first and the schema
/// rebuilt from scratch.
pub fn open_database(path: impl AsRef<Path>, drop_existing: bool) -> Result<Connection, StorageError> {
    let mut conn = Connection::open(path)?;
    if drop_existing {
        drop_schema(&conn)?;
    }
    configure_and_migrate(&mut conn)?;
    Ok(conn)
}

/// Opens an in-memory SQLite database with all migrations applied.
pub fn open_in_memory() -> Result<Connection, StorageError> {
    let mut conn = Connection::open_in_memory()?;
    configure_and_migrate(&mut conn)?;
    Ok(conn)
}

fn drop_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch("DROP TABLE IF EXISTS metrics;")?;
    conn.pragma_update(None, "user_version", 0)?;
    tracing::warn!("dropped existing metrics table");
    Ok(())
}

/// Configures pragmas and applies pending migrations.
fn configure_and_migrate(conn: &mut Connection) -> Result<(), StorageError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    migrations()
        .to_latest(conn)
        .map_err(|e| StorageError::unavailable(format!("migration failed: {}", e)))?;

    Ok(())
}
