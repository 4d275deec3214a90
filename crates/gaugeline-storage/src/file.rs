//! File-backed implementation of [`MetricStore`].
//!
//! [`FileStore`] serves every request from an inner [`MemoryStore`] and adds
//! snapshots: `persist` writes the whole store as newline-delimited JSON (one
//! wire payload per line), `load` replays a snapshot back through
//! `update_batch`.
//!
//! Replay uses normal write semantics, so loading a snapshot into a store
//! that already holds counters adds the snapshot's deltas on top. A snapshot
//! is a delta log, not a state image.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use gaugeline_core::{Metric, MetricPayload};
use parking_lot::Mutex;
use tempfile::NamedTempFile;

use crate::error::StorageError;
use crate::memory::MemoryStore;
use crate::traits::MetricStore;

/// [`MemoryStore`] plus newline-delimited JSON snapshots at `path`.
#[derive(Debug)]
pub struct FileStore {
    inner: MemoryStore,
    path: PathBuf,
    /// Held from reading the store until the rename lands, so snapshots
    /// reach disk in the order they were taken.
    persist_lock: Mutex<()>,
}

impl FileStore {
    /// Creates an empty store snapshotting to `path`. Nothing is read until
    /// [`load`](MetricStore::load) is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStore {
            inner: MemoryStore::new(),
            path: path.into(),
            persist_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parses a whole snapshot. Blank lines are skipped; any other bad line
/// fails the whole snapshot.
fn parse_snapshot(text: &str) -> Result<Vec<Metric>, StorageError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            let payload = MetricPayload::from_json(line.as_bytes())
                .map_err(|e| StorageError::malformed(format!("snapshot line {}: {}", n + 1, e)))?;
            Metric::try_from(payload)
                .map_err(|e| StorageError::malformed(format!("snapshot line {}: {}", n + 1, e)))
        })
        .collect()
}

impl MetricStore for FileStore {
    fn get(&self, id: &str) -> Result<Metric, StorageError> {
        self.inner.get(id)
    }

    fn get_all(&self) -> Result<Vec<Metric>, StorageError> {
        self.inner.get_all()
    }

    fn exists(&self, id: &str) -> Result<bool, StorageError> {
        self.inner.exists(id)
    }

    fn insert(&self, metric: Metric) -> Result<(), StorageError> {
        self.inner.insert(metric)
    }

    fn put(&self, metric: Metric) -> Result<Metric, StorageError> {
        self.inner.put(metric)
    }

    fn update_batch(&self, batch: &[Metric]) -> Result<(), StorageError> {
        self.inner.update_batch(batch)
    }

    fn reset_delta(&self, id: &str) -> Result<(), StorageError> {
        self.inner.reset_delta(id)
    }

    fn access_check(&self, timeout: Duration) -> Result<(), StorageError> {
        self.inner.access_check(timeout)
    }

    fn persist(&self) -> Result<(), StorageError> {
        let _guard = self.persist_lock.lock();
        let metrics = self.inner.get_all()?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        // Write next to the target and rename over it, so readers never see
        // a half-written snapshot.
        let tmp = NamedTempFile::new_in(dir)?;
        {
            let mut out = BufWriter::new(tmp.as_file());
            for metric in &metrics {
                let line = MetricPayload::from(metric).to_json()?;
                out.write_all(&line)?;
                out.write_all(b"\n")?;
            }
            out.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StorageError::from(e.error))?;

        tracing::debug!(
            path = %self.path.display(),
            count = metrics.len(),
            "snapshot written"
        );
        Ok(())
    }

    fn load(&self) -> Result<(), StorageError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no snapshot to restore");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let metrics = parse_snapshot(&text)?;
        self.inner.update_batch(&metrics)?;

        tracing::info!(
            path = %self.path.display(),
            count = metrics.len(),
            "snapshot restored"
        );
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
