//! MetricService: the single coordinator between HTTP handlers and storage.
//!
//! All ingest and query logic flows through [`MetricService`]: decoding wire
//! payloads into metrics, verifying integrity tags when a secret is
//! configured, applying updates, persisting on write when no snapshot
//! interval is set, and re-signing metrics on the way out. Handlers are thin
//! wrappers around these methods.

use std::sync::Arc;
use std::time::Duration;

use gaugeline_core::{Metric, MetricKind, MetricPayload, MetricValue, SigningKey};
use gaugeline_storage::{MetricStore, OpResultExt, StorageError};

use crate::error::ApiError;

/// Upper bound on how long `/ping` waits for the backend.
pub const PING_TIMEOUT: Duration = Duration::from_secs(1);

/// The central service for metric ingest and queries.
pub struct MetricService {
    store: Arc<dyn MetricStore>,
    key: Option<SigningKey>,
    persist_on_write: bool,
}

impl MetricService {
    pub fn new(store: Arc<dyn MetricStore>, key: Option<SigningKey>, persist_on_write: bool) -> Self {
        MetricService {
            store,
            key,
            persist_on_write,
        }
    }

    pub fn store(&self) -> &Arc<dyn MetricStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Ingest
    // -----------------------------------------------------------------------

    /// Applies a path-encoded update such as `gauge/temp/37.5`.
    pub fn update_scalar(&self, kind: &str, id: &str, literal: &str) -> Result<Metric, ApiError> {
        let kind: MetricKind = kind.parse()?;
        let value = MetricValue::parse(kind, literal)?;
        let stored = self.write(Metric::new(id, value))?;
        self.after_write();
        Ok(stored)
    }

    /// Applies one JSON update. `header_tag` is the `Hash` header, used when
    /// the body carries no `hash` of its own.
    pub fn update_json(
        &self,
        mut payload: MetricPayload,
        header_tag: Option<&str>,
    ) -> Result<MetricPayload, ApiError> {
        let body_has_tag = payload.hash.as_deref().is_some_and(|h| !h.is_empty());
        if !body_has_tag {
            if let Some(tag) = header_tag.filter(|t| !t.is_empty()) {
                payload.hash = Some(tag.to_string());
            }
        }

        let metric = self.accept(payload)?;
        let stored = self.write(metric)?;
        self.after_write();
        Ok(self.egress(stored))
    }

    /// Applies a JSON batch atomically. Every element is decoded and verified
    /// before anything is written.
    pub fn update_batch(&self, payloads: Vec<MetricPayload>) -> Result<usize, ApiError> {
        let metrics = payloads
            .into_iter()
            .map(|p| self.accept(p))
            .collect::<Result<Vec<_>, _>>()?;
        self.store.update_batch(&metrics).op("update_batch")?;
        self.after_write();
        Ok(metrics.len())
    }

    /// Decodes a wire payload and checks its tag against the configured key.
    ///
    /// Untagged metrics are accepted; only a tag that is present and wrong
    /// is rejected.
    fn accept(&self, payload: MetricPayload) -> Result<Metric, ApiError> {
        let metric = Metric::try_from(payload)?;
        if let (Some(key), Some(_)) = (&self.key, &metric.tag) {
            if let Err(e) = metric.verify(key) {
                tracing::warn!(id = %metric.id, "rejected metric with bad integrity tag");
                return Err(e.into());
            }
        }
        Ok(metric)
    }

    /// Creates the metric the first time its id is seen and applies `put`
    /// semantics afterwards. Losing a creation race falls back to `put`.
    fn write(&self, metric: Metric) -> Result<Metric, ApiError> {
        match self.store.insert(metric.clone()).op("insert") {
            Ok(()) => {
                tracing::info!(id = %metric.id, kind = %metric.kind(), "new metric registered");
                Ok(metric)
            }
            Err(e) if matches!(e.source, StorageError::AlreadyExists { .. }) => {
                Ok(self.store.put(metric).op("put")?)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn after_write(&self) {
        if !self.persist_on_write {
            return;
        }
        // The write itself already succeeded; a failed snapshot must not
        // make the client resend counter deltas.
        if let Err(e) = self.store.persist().op("persist") {
            tracing::error!(error = %e, "synchronous persist failed");
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Looks up `id`, treating a metric stored under the other kind as absent.
    pub fn value(&self, kind: &str, id: &str) -> Result<Metric, ApiError> {
        let kind: MetricKind = kind.parse()?;
        let metric = self.store.get(id).op("get")?;
        if metric.kind() != kind {
            return Err(ApiError::NotFound(format!("no {} named '{}'", kind, id)));
        }
        Ok(metric)
    }

    /// Answers a JSON query: the payload names `id` and `type`, the response
    /// carries the current measurement, tagged when a key is configured.
    pub fn query(&self, payload: &MetricPayload) -> Result<MetricPayload, ApiError> {
        let metric = self.value(&payload.kind, &payload.id)?;
        Ok(self.egress(metric))
    }

    /// All metrics, or those of one kind, sorted by id.
    pub fn list(&self, kind: Option<MetricKind>) -> Result<Vec<Metric>, ApiError> {
        let all = self.store.get_all().op("get_all")?;
        Ok(match kind {
            Some(kind) => all.into_iter().filter(|m| m.kind() == kind).collect(),
            None => all,
        })
    }

    pub fn ping(&self) -> Result<(), ApiError> {
        self.store.access_check(PING_TIMEOUT).op("access_check")?;
        Ok(())
    }

    /// Re-signs with the server key (or strips the tag when there is none),
    /// since a stored tag may describe an older delta.
    fn egress(&self, metric: Metric) -> MetricPayload {
        MetricPayload::from(metric.signed(self.key.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaugeline_storage::{FileStore, MemoryStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Memory store that counts which write path each update took.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        inserts: AtomicUsize,
        puts: AtomicUsize,
    }

    impl MetricStore for CountingStore {
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
            self.inner.insert(metric)?;
            self.inserts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn put(&self, metric: Metric) -> Result<Metric, StorageError> {
            self.puts.fetch_add(1, Ordering::SeqCst);
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

        fn backend_name(&self) -> &'static str {
            "counting"
        }
    }

    fn service(key: Option<&str>) -> MetricService {
        MetricService::new(
            Arc::new(MemoryStore::new()),
            key.and_then(SigningKey::new),
            false,
        )
    }

    fn counter_payload(id: &str, delta: i64) -> MetricPayload {
        MetricPayload::from(Metric::counter(id, delta))
    }

    #[test]
    fn scalar_updates_accumulate_counters() {
        let svc = service(None);
        svc.update_scalar("counter", "hits", "1").unwrap();
        let stored = svc.update_scalar("counter", "hits", "1").unwrap();
        assert_eq!(stored.value, MetricValue::Counter(2));
    }

    #[test]
    fn first_sighting_creates_then_updates_accumulate() {
        let store = Arc::new(CountingStore::default());
        let svc = MetricService::new(store.clone(), None, false);

        let created = svc.update_scalar("counter", "hits", "3").unwrap();
        assert_eq!(created.value, MetricValue::Counter(3));
        assert_eq!(store.inserts.load(Ordering::SeqCst), 1);
        assert_eq!(store.puts.load(Ordering::SeqCst), 0);

        let stored = svc.update_json(counter_payload("hits", 4), None).unwrap();
        assert_eq!(stored.delta, Some(7));
        assert_eq!(store.inserts.load(Ordering::SeqCst), 1);
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scalar_errors_map_to_statuses() {
        let svc = service(None);
        assert!(matches!(
            svc.update_scalar("histogram", "x", "1"),
            Err(ApiError::NotImplemented(_))
        ));
        assert!(matches!(
            svc.update_scalar("gauge", "x", "warm"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            svc.update_scalar("counter", "x", "-3"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn header_tag_is_verified() {
        let key = SigningKey::new("secret").unwrap();
        let svc = service(Some("secret"));
        let good = Metric::gauge("temp", 1.5).signed(Some(&key)).tag.unwrap().to_hex();

        let payload = MetricPayload::from(Metric::gauge("temp", 1.5));
        svc.update_json(payload.clone(), Some(&good)).unwrap();

        let bad = Metric::gauge("temp", 9.9).signed(Some(&key)).tag.unwrap().to_hex();
        let mut tampered = payload;
        tampered.value = Some(2.5);
        assert!(matches!(
            svc.update_json(tampered, Some(&bad)),
            Err(ApiError::BadRequest(_))
        ));
        assert_eq!(svc.value("gauge", "temp").unwrap().value, MetricValue::Gauge(1.5));
    }

    #[test]
    fn tags_are_ignored_without_a_key() {
        let svc = service(None);
        let mut payload = counter_payload("c", 1);
        payload.hash = Some("00".repeat(32));
        let stored = svc.update_json(payload, None).unwrap();
        assert_eq!(stored.hash, None);
    }

    #[test]
    fn batch_with_one_bad_tag_is_rejected_whole() {
        let key = SigningKey::new("secret").unwrap();
        let svc = service(Some("secret"));
        let good = MetricPayload::from(Metric::counter("a", 1).signed(Some(&key)));
        let mut bad = MetricPayload::from(Metric::counter("b", 1).signed(Some(&key)));
        bad.delta = Some(100);

        assert!(svc.update_batch(vec![good.clone(), bad]).is_err());
        assert!(svc.list(None).unwrap().is_empty());

        assert_eq!(svc.update_batch(vec![good]).unwrap(), 1);
    }

    #[test]
    fn query_resigns_accumulated_counter() {
        let key = SigningKey::new("secret").unwrap();
        let svc = service(Some("secret"));
        for _ in 0..3 {
            let p = MetricPayload::from(Metric::counter("hits", 1).signed(Some(&key)));
            svc.update_json(p, None).unwrap();
        }
        let answer = svc
            .query(&MetricPayload::query("hits", MetricKind::Counter))
            .unwrap();
        assert_eq!(answer.delta, Some(3));
        Metric::try_from(answer).unwrap().verify(&key).unwrap();
    }

    #[test]
    fn value_of_other_kind_is_not_found() {
        let svc = service(None);
        svc.update_scalar("gauge", "x", "1").unwrap();
        assert!(matches!(svc.value("counter", "x"), Err(ApiError::NotFound(_))));
        assert!(matches!(svc.value("gauge", "y"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn list_filters_by_kind() {
        let svc = service(None);
        svc.update_scalar("gauge", "g", "1").unwrap();
        svc.update_scalar("counter", "c", "1").unwrap();
        let gauges = svc.list(Some(MetricKind::Gauge)).unwrap();
        assert_eq!(gauges.len(), 1);
        assert_eq!(gauges[0].id, "g");
        assert_eq!(svc.list(None).unwrap().len(), 2);
    }

    #[test]
    fn persist_on_write_snapshots_every_update() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("metrics.json");
        let svc = MetricService::new(Arc::new(FileStore::new(&path)), None, true);
        svc.update_scalar("counter", "c", "4").unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains(r#""delta":4"#));
    }
}
