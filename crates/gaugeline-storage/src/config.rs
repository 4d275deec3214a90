//! Backend selection.
//!
//! The server picks exactly one backend at startup; everything downstream
//! holds an `Arc<dyn MetricStore>`.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::StorageError;
use crate::file::FileStore;
use crate::memory::MemoryStore;
use crate::sqlite::SqliteStore;
use crate::traits::MetricStore;

/// Which storage backend to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// Volatile, process-local.
    Memory,
    /// In memory, with snapshots written to `path`.
    File { path: PathBuf },
    /// A SQLite database at `path`.
    Sqlite { path: PathBuf, drop_table: bool },
}

impl StorageConfig {
    /// Whether the backend writes snapshots that `persist`/`load` act on.
    pub fn snapshots(&self) -> bool {
        matches!(self, StorageConfig::File { .. })
    }
}

/// Opens the configured backend. Does not restore any snapshot.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn MetricStore>, StorageError> {
    let store: Arc<dyn MetricStore> = match config {
        StorageConfig::Memory => Arc::new(MemoryStore::new()),
        StorageConfig::File { path } => Arc::new(FileStore::new(path.clone())),
        StorageConfig::Sqlite { path, drop_table } => Arc::new(SqliteStore::new(path, *drop_table)?),
    };
    tracing::info!(backend = store.backend_name(), "storage opened");
    Ok(store)
}
