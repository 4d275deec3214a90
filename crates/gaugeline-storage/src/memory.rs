//! In-memory implementation of [`MetricStore`].
//!
//! [`MemoryStore`] is the agent's local store, the server's default backend,
//! and the live state underneath [`FileStore`](crate::FileStore). All
//! metrics live in one `HashMap` guarded by one reader/writer lock: point
//! reads share it, writes take it exclusively, and `get_all` copies under a
//! shared lock so callers never iterate live state.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;

use gaugeline_core::{Metric, MetricValue};

use crate::error::StorageError;
use crate::traits::MetricStore;

/// In-memory implementation of [`MetricStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    metrics: RwLock<HashMap<String, Metric>>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        MemoryStore {
            metrics: RwLock::new(HashMap::new()),
        }
    }

    /// Number of tracked metrics.
    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }
}

/// Computes the metric that results from applying `incoming` on top of
/// `existing`.
///
/// Counter onto counter sums the deltas and drops the tag, which described
/// the incoming delta and not the sum. Any other combination replaces.
pub(crate) fn merge(existing: Option<&Metric>, incoming: Metric) -> Result<Metric, StorageError> {
    incoming.validate()?;
    match (existing.map(|m| m.value), incoming.value) {
        (Some(MetricValue::Counter(old)), MetricValue::Counter(delta)) => {
            let sum = old.checked_add(delta).ok_or_else(|| {
                StorageError::malformed(format!("counter '{}' overflows i64", incoming.id))
            })?;
            Ok(Metric {
                id: incoming.id,
                value: MetricValue::Counter(sum),
                tag: None,
            })
        }
        _ => Ok(incoming),
    }
}

impl MetricStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Metric, StorageError> {
        self.metrics
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(id))
    }

    fn get_all(&self) -> Result<Vec<Metric>, StorageError> {
        let mut all: Vec<Metric> = self.metrics.read().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    fn exists(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.metrics.read().contains_key(id))
    }

    fn insert(&self, metric: Metric) -> Result<(), StorageError> {
        metric.validate()?;
        let mut metrics = self.metrics.write();
        if metrics.contains_key(&metric.id) {
            return Err(StorageError::AlreadyExists { id: metric.id });
        }
        metrics.insert(metric.id.clone(), metric);
        Ok(())
    }

    fn put(&self, metric: Metric) -> Result<Metric, StorageError> {
        let mut metrics = self.metrics.write();
        let merged = merge(metrics.get(&metric.id), metric)?;
        metrics.insert(merged.id.clone(), merged.clone());
        Ok(merged)
    }

    fn update_batch(&self, batch: &[Metric]) -> Result<(), StorageError> {
        let mut metrics = self.metrics.write();

        // Stage every element against a scratch map first; live state is only
        // touched once the whole batch is known to apply.
        let mut staged: HashMap<String, Metric> = HashMap::with_capacity(batch.len());
        for metric in batch {
            let existing = staged.get(&metric.id).or_else(|| metrics.get(&metric.id));
            let merged = merge(existing, metric.clone())?;
            staged.insert(merged.id.clone(), merged);
        }

        metrics.extend(staged);
        Ok(())
    }

    fn reset_delta(&self, id: &str) -> Result<(), StorageError> {
        let mut metrics = self.metrics.write();
        let metric = metrics
            .get_mut(id)
            .ok_or_else(|| StorageError::not_found(id))?;
        match metric.value {
            MetricValue::Counter(_) => {
                metric.value = MetricValue::Counter(0);
                metric.tag = None;
                Ok(())
            }
            MetricValue::Gauge(_) => Err(StorageError::malformed(format!(
                "cannot reset delta of gauge '{}'",
                id
            ))),
        }
    }

    fn access_check(&self, timeout: Duration) -> Result<(), StorageError> {
        match self.metrics.try_read_for(timeout) {
            Some(_) => Ok(()),
            None => Err(StorageError::unavailable(format!(
                "metric map lock not acquired within {:?}",
                timeout
            ))),
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaugeline_core::SigningKey;
    use std::sync::Arc;

    #[test]
    fn get_missing_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.get("nope"), Err(StorageError::NotFound { .. })));
        assert!(!store.exists("nope").unwrap());
    }

    #[test]
    fn gauge_put_overwrites() {
        let store = MemoryStore::new();
        store.put(Metric::gauge("temp", 1.0)).unwrap();
        store.put(Metric::gauge("temp", 37.5)).unwrap();
        assert_eq!(store.get("temp").unwrap().value, MetricValue::Gauge(37.5));
    }

    #[test]
    fn counter_put_accumulates_and_returns_sum() {
        let store = MemoryStore::new();
        store.put(Metric::counter("hits", 1)).unwrap();
        let stored = store.put(Metric::counter("hits", 1)).unwrap();
        assert_eq!(stored.value, MetricValue::Counter(2));
    }

    #[test]
    fn accumulation_drops_stale_tag() {
        let key = SigningKey::new("k").unwrap();
        let store = MemoryStore::new();
        let first = store.put(Metric::counter("hits", 1).signed(Some(&key))).unwrap();
        assert!(first.tag.is_some());
        let second = store.put(Metric::counter("hits", 1).signed(Some(&key))).unwrap();
        assert!(second.tag.is_none());
    }

    #[test]
    fn kind_change_replaces() {
        let store = MemoryStore::new();
        store.put(Metric::counter("x", 5)).unwrap();
        store.put(Metric::gauge("x", 2.5)).unwrap();
        assert_eq!(store.get("x").unwrap().value, MetricValue::Gauge(2.5));
        store.put(Metric::counter("x", 3)).unwrap();
        assert_eq!(store.get("x").unwrap().value, MetricValue::Counter(3));
    }

    #[test]
    fn counter_overflow_is_malformed_and_leaves_state() {
        let store = MemoryStore::new();
        store.put(Metric::counter("big", i64::MAX)).unwrap();
        assert!(matches!(
            store.put(Metric::counter("big", 1)),
            Err(StorageError::Malformed { .. })
        ));
        assert_eq!(store.get("big").unwrap().value, MetricValue::Counter(i64::MAX));
    }

    #[test]
    fn insert_rejects_existing_id() {
        let store = MemoryStore::new();
        store.insert(Metric::gauge("temp", 1.0)).unwrap();
        assert!(matches!(
            store.insert(Metric::gauge("temp", 2.0)),
            Err(StorageError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn batch_accumulates_repeated_ids() {
        let store = MemoryStore::new();
        store.put(Metric::counter("c", 10)).unwrap();
        store
            .update_batch(&[
                Metric::counter("c", 1),
                Metric::gauge("g", 1.0),
                Metric::counter("c", 2),
                Metric::gauge("g", 2.0),
            ])
            .unwrap();
        assert_eq!(store.get("c").unwrap().value, MetricValue::Counter(13));
        assert_eq!(store.get("g").unwrap().value, MetricValue::Gauge(2.0));
    }

    #[test]
    fn batch_with_malformed_element_changes_nothing() {
        let store = MemoryStore::new();
        store.put(Metric::counter("c", 10)).unwrap();
        store.put(Metric::gauge("g", 1.0)).unwrap();

        let result = store.update_batch(&[
            Metric::counter("c", 5),
            Metric::gauge("g", 9.0),
            Metric::gauge("new", 1.0),
            Metric::gauge("bad", f64::NAN),
        ]);
        assert!(matches!(result, Err(StorageError::Malformed { .. })));

        assert_eq!(store.get("c").unwrap().value, MetricValue::Counter(10));
        assert_eq!(store.get("g").unwrap().value, MetricValue::Gauge(1.0));
        assert!(!store.exists("new").unwrap());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn reset_delta_zeroes_counter_only() {
        let store = MemoryStore::new();
        store.put(Metric::counter("PollCount", 7)).unwrap();
        store.put(Metric::gauge("temp", 1.0)).unwrap();
        store.reset_delta("PollCount").unwrap();
        assert_eq!(store.get("PollCount").unwrap().value, MetricValue::Counter(0));
        assert!(store.reset_delta("temp").is_err());
        assert!(matches!(store.reset_delta("nope"), Err(StorageError::NotFound { .. })));
    }

    #[test]
    fn get_all_is_sorted_copy() {
        let store = MemoryStore::new();
        store.put(Metric::gauge("b", 1.0)).unwrap();
        store.put(Metric::gauge("a", 1.0)).unwrap();
        let snapshot = store.get_all().unwrap();
        store.put(Metric::gauge("a", 5.0)).unwrap();
        let ids: Vec<_> = snapshot.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(snapshot[0].value, MetricValue::Gauge(1.0));
    }

    #[test]
    fn access_check_times_out_under_writer() {
        let store = MemoryStore::new();
        assert!(store.access_check(Duration::from_millis(10)).is_ok());
        let _guard = store.metrics.write();
        assert!(matches!(
            store.access_check(Duration::from_millis(10)),
            Err(StorageError::BackendUnavailable { .. })
        ));
    }

    #[test]
    fn concurrent_counter_puts_sum() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.put(Metric::counter("hits", 1)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get("hits").unwrap().value, MetricValue::Counter(800));
    }

    mod laws {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn counter_puts_sum(deltas in prop::collection::vec(0i64..1_000_000, 1..50)) {
                let store = MemoryStore::new();
                for d in &deltas {
                    store.put(Metric::counter("c", *d)).unwrap();
                }
                let expected: i64 = deltas.iter().sum();
                prop_assert_eq!(store.get("c").unwrap().value, MetricValue::Counter(expected));
            }

            #[test]
            fn gauge_puts_keep_last(values in prop::collection::vec(-1.0e9f64..1.0e9, 1..50)) {
                let store = MemoryStore::new();
                for v in &values {
                    store.put(Metric::gauge("g", *v)).unwrap();
                }
                let last = *values.last().unwrap();
                prop_assert_eq!(store.get("g").unwrap().value, MetricValue::Gauge(last));
            }

            #[test]
            fn batch_equals_sequential_puts(
                deltas in prop::collection::vec(0i64..1000, 1..20),
            ) {
                let batched = MemoryStore::new();
                let sequential = MemoryStore::new();
                let batch: Vec<Metric> = deltas.iter().map(|d| Metric::counter("c", *d)).collect();
                batched.update_batch(&batch).unwrap();
                for m in batch {
                    sequential.put(m).unwrap();
                }
                prop_assert_eq!(batched.get_all().unwrap(), sequential.get_all().unwrap());
            }
        }
    }
}
