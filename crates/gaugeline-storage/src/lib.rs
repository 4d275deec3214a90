//! Storage abstraction for gaugeline metrics.
//!
//! Provides the [`MetricStore`] trait defining the storage contract that all
//! backends implement, plus three interchangeable backends:
//!
//! - [`MemoryStore`]: a single map behind one reader/writer lock.
//! - [`FileStore`]: the memory store plus newline-delimited JSON snapshots.
//! - [`SqliteStore`]: transactional SQL with accumulation done in the database.
//!
//! The backend is chosen once at startup via [`StorageConfig`] and
//! [`open_store`]; callers only ever see `Arc<dyn MetricStore>`.
//!
//! # Modules
//!
//! - [`error`]: StorageError taxonomy and the OpError wrapper
//! - [`traits`]: MetricStore trait definition
//! - [`memory`]: MemoryStore implementation
//! - [`file`]: FileStore implementation
//! - [`schema`]: SQL migrations and connection setup
//! - [`sqlite`]: SqliteStore implementation
//! - [`config`]: backend selection

pub mod config;
pub mod error;
pub mod file;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;

// Re-export key types for ergonomic use.
pub use config::{open_store, StorageConfig};
pub use error::{OpError, OpResultExt, StorageError};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::MetricStore;
