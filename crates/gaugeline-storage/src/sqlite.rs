//! SQLite implementation of [`MetricStore`].
//!
//! [`SqliteStore`] keeps one row per metric. Counter accumulation happens in
//! the upsert itself, so a `put` is a single statement and a batch is one
//! transaction over the same prepared statement.

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, Statement};

use gaugeline_core::{Metric, MetricPayload};

use crate::error::StorageError;
use crate::schema::BUSY_TIMEOUT;
use crate::traits::MetricStore;

const SELECT_ONE: &str = "SELECT id, type, value, delta, hash FROM metrics WHERE id = ?1";

const SELECT_ALL: &str = "SELECT id, type, value, delta, hash FROM metrics ORDER BY id";

/// Counter onto counter adds the deltas and clears the hash; anything else
/// replaces the row. The `WHERE` on the update refuses a sum that would
/// overflow, in which case no row comes back.
const UPSERT: &str = "
    INSERT INTO metrics (id, type, value, delta, hash)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT (id) DO UPDATE SET
        type  = excluded.type,
        value = excluded.value,
        delta = CASE
            WHEN metrics.type = 'counter' AND excluded.type = 'counter'
                THEN metrics.delta + excluded.delta
            ELSE excluded.delta
        END,
        hash = CASE
            WHEN metrics.type = 'counter' AND excluded.type = 'counter' THEN NULL
            ELSE excluded.hash
        END
    WHERE NOT (
        metrics.type = 'counter' AND excluded.type = 'counter'
        AND metrics.delta > 9223372036854775807 - excluded.delta
    )
    RETURNING id, type, value, delta, hash";

/// SQLite-backed implementation of [`MetricStore`].
///
/// The connection sits behind a mutex; every write is a transaction or a
/// single atomic statement.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`, optionally dropping
    /// the existing metrics table first.
    pub fn new(path: impl AsRef<Path>, drop_table: bool) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path, drop_table)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Decodes one row through the wire payload so stored rows get the same
    /// validation as incoming requests.
    fn row_to_payload(row: &Row<'_>) -> rusqlite::Result<MetricPayload> {
        Ok(MetricPayload {
            id: row.get(0)?,
            kind: row.get(1)?,
            value: row.get(2)?,
            delta: row.get(3)?,
            hash: row.get(4)?,
        })
    }

    fn payload_to_metric(payload: MetricPayload) -> Result<Metric, StorageError> {
        Metric::try_from(payload)
            .map_err(|e| StorageError::malformed(format!("stored row is invalid: {}", e)))
    }

    /// Runs the upsert for one metric on an already prepared statement.
    fn upsert(stmt: &mut Statement<'_>, metric: &Metric) -> Result<Metric, StorageError> {
        metric.validate()?;
        let payload = MetricPayload::from(metric);
        let stored = stmt
            .query_row(
                params![payload.id, payload.kind, payload.value, payload.delta, payload.hash],
                Self::row_to_payload,
            )
            .optional()?
            .ok_or_else(|| {
                StorageError::malformed(format!("counter '{}' overflows i64", metric.id))
            })?;
        Self::payload_to_metric(stored)
    }
}

impl MetricStore for SqliteStore {
    fn get(&self, id: &str) -> Result<Metric, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(SELECT_ONE)?;
        let payload = stmt
            .query_row(params![id], Self::row_to_payload)
            .optional()?
            .ok_or_else(|| StorageError::not_found(id))?;
        Self::payload_to_metric(payload)
    }

    fn get_all(&self) -> Result<Vec<Metric>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(SELECT_ALL)?;
        let rows = stmt.query_map([], Self::row_to_payload)?;
        let mut metrics = Vec::new();
        for row in rows {
            metrics.push(Self::payload_to_metric(row?)?);
        }
        Ok(metrics)
    }

    fn exists(&self, id: &str) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM metrics WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert(&self, metric: Metric) -> Result<(), StorageError> {
        metric.validate()?;
        let payload = MetricPayload::from(&metric);
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT INTO metrics (id, type, value, delta, hash)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (id) DO NOTHING",
            params![payload.id, payload.kind, payload.value, payload.delta, payload.hash],
        )?;
        if inserted == 0 {
            return Err(StorageError::AlreadyExists { id: metric.id });
        }
        Ok(())
    }

    fn put(&self, metric: Metric) -> Result<Metric, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(UPSERT)?;
        Self::upsert(&mut stmt, &metric)
    }

    fn update_batch(&self, batch: &[Metric]) -> Result<(), StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT)?;
            for metric in batch {
                // An early return drops `tx`, which rolls back.
                Self::upsert(&mut stmt, metric)?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn reset_delta(&self, id: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE metrics SET delta = 0, hash = NULL WHERE id = ?1 AND type = 'counter'",
            params![id],
        )?;
        if updated == 1 {
            return Ok(());
        }
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM metrics WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        if exists {
            Err(StorageError::malformed(format!(
                "cannot reset delta of gauge '{}'",
                id
            )))
        } else {
            Err(StorageError::not_found(id))
        }
    }

    fn access_check(&self, timeout: Duration) -> Result<(), StorageError> {
        let conn = self.conn.try_lock_for(timeout).ok_or_else(|| {
            StorageError::unavailable(format!("connection not acquired within {:?}", timeout))
        })?;
        conn.busy_timeout(timeout)?;
        let probe = conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0));
        conn.busy_timeout(BUSY_TIMEOUT)?;
        probe?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
