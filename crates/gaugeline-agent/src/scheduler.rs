//! The agent's poll/report loop.
//!
//! [`Agent`] owns a local [`MemoryStore`]. A poll overwrites every gauge
//! with a fresh sample and bumps the [`POLL_COUNT`] counter; a report pushes
//! the whole store to the server. Counters are reset only once a delivery is
//! confirmed, so a failed report's increments ride along with the next one.
//! Nothing is retried within a cycle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use gaugeline_core::{CoreError, Metric, MetricPayload, MetricValue, SigningKey};
use gaugeline_storage::{MemoryStore, MetricStore};

use crate::error::AgentError;
use crate::sampler::Sampler;
use crate::transport::{ContentType, Delivery, Transport, BATCH_PATH, UPDATE_PATH};

/// Counter incremented once per poll.
pub const POLL_COUNT: &str = "PollCount";

/// Scheduling and delivery settings.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub poll_interval: Duration,
    pub report_interval: Duration,
    /// One batch request per report instead of one request per metric.
    pub batch: bool,
    /// Concurrent requests in per-metric mode.
    pub rate_limit: usize,
    /// Encoding of per-metric requests. Batches are always JSON.
    pub content_type: ContentType,
    pub key: Option<SigningKey>,
}

/// Samples into local storage and reports to a server.
pub struct Agent<S, T> {
    sampler: S,
    transport: Arc<T>,
    store: MemoryStore,
    settings: AgentSettings,
}

impl<S: Sampler, T: Transport> Agent<S, T> {
    pub fn new(sampler: S, transport: T, settings: AgentSettings) -> Self {
        Agent {
            sampler,
            transport: Arc::new(transport),
            store: MemoryStore::new(),
            settings,
        }
    }

    /// The agent-local store.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Takes one sample of every tracked gauge and increments
    /// [`POLL_COUNT`].
    pub fn poll(&mut self) -> Result<(), AgentError> {
        let mut batch = Vec::new();
        for name in self.sampler.tracked() {
            match self.sampler.sample(name) {
                Some(value) => batch.push(Metric::gauge(name, value)),
                None => tracing::trace!(metric = name, "no sample"),
            }
        }
        batch.push(Metric::counter(POLL_COUNT, 1));
        self.store.update_batch(&batch)?;
        Ok(())
    }

    /// Pushes every stored metric to the server and returns how many were
    /// delivered.
    pub async fn report(&self) -> Result<usize, AgentError> {
        let metrics = self.store.get_all()?;
        if metrics.is_empty() {
            return Ok(0);
        }
        let key = self.settings.key.as_ref();
        let metrics: Vec<Metric> = metrics.into_iter().map(|m| m.signed(key)).collect();

        if self.settings.batch {
            self.report_batch(metrics).await
        } else {
            self.report_each(metrics).await
        }
    }

    async fn report_batch(&self, metrics: Vec<Metric>) -> Result<usize, AgentError> {
        let payloads: Vec<MetricPayload> = metrics.iter().map(MetricPayload::from).collect();
        let body = serde_json::to_vec(&payloads).map_err(CoreError::from)?;
        self.transport
            .deliver(Delivery::json(BATCH_PATH, body, None))
            .await?;

        for metric in &metrics {
            self.reset_if_counter(metric)?;
        }
        tracing::debug!(count = metrics.len(), "batch report delivered");
        Ok(metrics.len())
    }

    /// One request per metric through a bounded worker pool.
    async fn report_each(&self, metrics: Vec<Metric>) -> Result<usize, AgentError> {
        let total = metrics.len();
        let permits = Arc::new(Semaphore::new(self.settings.rate_limit.max(1)));
        let mut workers = JoinSet::new();

        for metric in metrics {
            let delivery = self.encode(&metric)?;
            let transport = Arc::clone(&self.transport);
            let permits = Arc::clone(&permits);
            workers.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => transport.deliver(delivery).await,
                    Err(_) => return (metric, false),
                };
                if let Err(e) = &result {
                    tracing::warn!(id = %metric.id, error = %e, "metric delivery failed");
                }
                (metric, result.is_ok())
            });
        }

        let mut delivered = 0;
        while let Some(joined) = workers.join_next().await {
            let (metric, ok) = joined?;
            if ok {
                self.reset_if_counter(&metric)?;
                delivered += 1;
            }
        }

        if delivered < total {
            return Err(AgentError::Partial {
                failed: total - delivered,
                total,
            });
        }
        tracing::debug!(count = delivered, "per-metric report delivered");
        Ok(delivered)
    }

    fn encode(&self, metric: &Metric) -> Result<Delivery, AgentError> {
        Ok(match self.settings.content_type {
            ContentType::Json => {
                let payload = MetricPayload::from(metric);
                let body = payload.to_json()?;
                Delivery::json(UPDATE_PATH, body, payload.hash)
            }
            ContentType::Plain => Delivery::plain(
                &metric.kind().to_string(),
                &metric.id,
                &metric.value.to_plain_string(),
            ),
        })
    }

    fn reset_if_counter(&self, metric: &Metric) -> Result<(), AgentError> {
        if let MetricValue::Counter(_) = metric.value {
            self.store.reset_delta(&metric.id)?;
        }
        Ok(())
    }

    /// Runs the poll/report loop until `shutdown` resolves.
    ///
    /// Each timer first fires one full period after start. When a poll and a
    /// report fall due together the poll runs first. Shutdown wins over
    /// everything, including a report already in flight.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let start = Instant::now();
        let poll_every = self.settings.poll_interval.max(Duration::from_millis(1));
        let report_every = self.settings.report_interval.max(Duration::from_millis(1));
        let mut poll_tick = interval_at(start + poll_every, poll_every);
        let mut report_tick = interval_at(start + report_every, report_every);
        poll_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        report_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            poll = ?poll_every,
            report = ?report_every,
            batch = self.settings.batch,
            content_type = ?self.settings.content_type,
            "agent started"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = poll_tick.tick() => {
                    if let Err(e) = self.poll() {
                        tracing::warn!(error = %e, "poll failed");
                    }
                }
                _ = report_tick.tick() => {
                    tokio::select! {
                        biased;
                        _ = &mut shutdown => {
                            tracing::info!("abandoning in-flight report");
                            break;
                        }
                        result = self.report() => match result {
                            Ok(count) => tracing::info!(count, "report delivered"),
                            Err(e) => tracing::warn!(error = %e, "report dropped"),
                        },
                    }
                }
            }
        }

        tracing::info!("agent stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use std::sync::Mutex;

    /// Fixed samples, one gauge.
    struct StaticSampler(f64);

    impl Sampler for StaticSampler {
        fn tracked(&self) -> Vec<&'static str> {
            vec!["Static", "Missing"]
        }

        fn sample(&mut self, name: &str) -> Option<f64> {
            (name == "Static").then_some(self.0)
        }
    }

    /// Records deliveries; fails while `fail` is set.
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<Delivery>>,
        fail: std::sync::atomic::AtomicBool,
    }

    impl Transport for Arc<RecordingTransport> {
        async fn deliver(&self, delivery: Delivery) -> Result<(), TransportError> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(TransportError::Status {
                    status: 503,
                    body: String::new(),
                });
            }
            self.sent.lock().unwrap().push(delivery);
            Ok(())
        }
    }

    fn settings(batch: bool, key: Option<&str>) -> AgentSettings {
        AgentSettings {
            poll_interval: Duration::from_secs(2),
            report_interval: Duration::from_secs(10),
            batch,
            rate_limit: 2,
            content_type: ContentType::Json,
            key: key.and_then(SigningKey::new),
        }
    }

    fn poll_count(agent: &Agent<StaticSampler, Arc<RecordingTransport>>) -> i64 {
        match agent.store().get(POLL_COUNT).unwrap().value {
            MetricValue::Counter(d) => d,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn poll_overwrites_gauges_and_counts() {
        let transport = Arc::new(RecordingTransport::default());
        let mut agent = Agent::new(StaticSampler(1.5), transport, settings(true, None));
        agent.poll().unwrap();
        agent.poll().unwrap();
        assert_eq!(poll_count(&agent), 2);
        assert_eq!(
            agent.store().get("Static").unwrap().value,
            MetricValue::Gauge(1.5)
        );
        assert!(!agent.store().exists("Missing").unwrap());
    }

    #[tokio::test]
    async fn empty_store_reports_nothing() {
        let transport = Arc::new(RecordingTransport::default());
        let agent = Agent::new(StaticSampler(1.0), Arc::clone(&transport), settings(true, None));
        assert_eq!(agent.report().await.unwrap(), 0);
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_report_resets_counters_on_success() {
        let transport = Arc::new(RecordingTransport::default());
        let mut agent = Agent::new(StaticSampler(1.0), Arc::clone(&transport), settings(true, None));
        agent.poll().unwrap();
        agent.poll().unwrap();

        assert_eq!(agent.report().await.unwrap(), 2);
        assert_eq!(poll_count(&agent), 0);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].path, BATCH_PATH);
        let payloads = MetricPayload::batch_from_json(&sent[0].body).unwrap();
        assert_eq!(payloads.len(), 2);
        assert!(payloads.iter().any(|p| p.id == POLL_COUNT && p.delta == Some(2)));
    }

    #[tokio::test]
    async fn failed_report_keeps_counters_for_next_cycle() {
        let transport = Arc::new(RecordingTransport::default());
        let mut agent = Agent::new(StaticSampler(1.0), Arc::clone(&transport), settings(true, None));
        agent.poll().unwrap();

        transport.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(matches!(
            agent.report().await,
            Err(AgentError::Transport(TransportError::Status { status: 503, .. }))
        ));
        assert_eq!(poll_count(&agent), 1);

        agent.poll().unwrap();
        transport.fail.store(false, std::sync::atomic::Ordering::SeqCst);
        agent.report().await.unwrap();

        let sent = transport.sent.lock().unwrap();
        let payloads = MetricPayload::batch_from_json(&sent[0].body).unwrap();
        assert!(payloads.iter().any(|p| p.id == POLL_COUNT && p.delta == Some(2)));
    }

    #[tokio::test]
    async fn per_metric_report_signs_each_request() {
        let key = SigningKey::new("secret").unwrap();
        let transport = Arc::new(RecordingTransport::default());
        let mut agent = Agent::new(
            StaticSampler(3.25),
            Arc::clone(&transport),
            settings(false, Some("secret")),
        );
        agent.poll().unwrap();
        assert_eq!(agent.report().await.unwrap(), 2);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        for delivery in sent.iter() {
            assert_eq!(delivery.path, UPDATE_PATH);
            let payload = MetricPayload::from_json(&delivery.body).unwrap();
            assert_eq!(delivery.tag, payload.hash);
            Metric::try_from(payload).unwrap().verify(&key).unwrap();
        }
        assert_eq!(poll_count(&agent), 0);
    }

    #[tokio::test]
    async fn plain_report_puts_values_in_the_path() {
        let transport = Arc::new(RecordingTransport::default());
        let mut per_metric = settings(false, Some("secret"));
        per_metric.content_type = ContentType::Plain;
        let mut agent = Agent::new(StaticSampler(3.25), Arc::clone(&transport), per_metric);
        agent.poll().unwrap();
        agent.poll().unwrap();
        assert_eq!(agent.report().await.unwrap(), 2);

        let mut paths: Vec<String> = transport
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.path.clone())
            .collect();
        paths.sort();
        assert_eq!(
            paths,
            ["/update/counter/PollCount/2", "/update/gauge/Static/3.250"]
        );
        assert_eq!(poll_count(&agent), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_shutdown() {
        let transport = Arc::new(RecordingTransport::default());
        let agent = Agent::new(StaticSampler(1.0), Arc::clone(&transport), settings(true, None));
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(agent.run(async move {
            let _ = stopped.await;
        }));

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        stop.send(()).unwrap();
        handle.await.unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let payloads = MetricPayload::batch_from_json(&sent[0].body).unwrap();
        assert!(payloads.iter().any(|p| p.id == POLL_COUNT && p.delta == Some(5)));
    }
}
