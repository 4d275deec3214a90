//! The [`MetricStore`] trait defining the storage contract for metrics.
//!
//! All backends ([`MemoryStore`](crate::MemoryStore),
//! [`FileStore`](crate::FileStore), [`SqliteStore`](crate::SqliteStore))
//! implement this trait, so the agent and server never depend on which one
//! was configured.
//!
//! Write semantics are the heart of the sync protocol:
//! - a **gauge** `put` overwrites the stored value (last write wins);
//! - a **counter** `put` adds the incoming delta to the stored delta;
//! - `update_batch` applies `put` to every element, all or nothing.

use std::time::Duration;

use gaugeline_core::Metric;

use crate::error::StorageError;

/// The storage contract for metrics.
///
/// Methods take `&self`: each backend guards its state with exactly one lock,
/// so a store is shared as `Arc<dyn MetricStore>` across request handlers
/// and background tasks.
pub trait MetricStore: Send + Sync {
    /// Returns the metric stored under `id`.
    fn get(&self, id: &str) -> Result<Metric, StorageError>;

    /// Returns a copy of every stored metric, sorted by id.
    fn get_all(&self) -> Result<Vec<Metric>, StorageError>;

    /// Reports whether a metric with `id` exists.
    fn exists(&self, id: &str) -> Result<bool, StorageError>;

    /// Creates a metric; fails with `AlreadyExists` if the id is taken.
    fn insert(&self, metric: Metric) -> Result<(), StorageError>;

    /// Applies one update and returns the metric as stored.
    ///
    /// Counters accumulate onto an existing counter; everything else
    /// replaces the stored metric.
    fn put(&self, metric: Metric) -> Result<Metric, StorageError>;

    /// Applies `put` semantics to every element atomically.
    ///
    /// On error nothing from the batch is visible. Repeated ids within one
    /// batch are applied in order, so counter deltas for the same id sum.
    fn update_batch(&self, batch: &[Metric]) -> Result<(), StorageError>;

    /// Sets a counter's delta back to zero.
    fn reset_delta(&self, id: &str) -> Result<(), StorageError>;

    /// Liveness probe; fails if the backend cannot answer within `timeout`.
    fn access_check(&self, timeout: Duration) -> Result<(), StorageError>;

    /// Writes a durable snapshot. No-op for backends that are durable per write
    /// or not durable at all.
    fn persist(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Restores from the durable snapshot, if the backend keeps one.
    fn load(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
