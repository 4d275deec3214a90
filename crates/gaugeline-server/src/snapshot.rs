//! Periodic snapshot task.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use gaugeline_storage::{MetricStore, OpResultExt};

/// Spawns a task that calls `persist` every `period`, first one full period
/// after start. Abort the handle to stop it.
pub fn start_snapshot_task(store: Arc<dyn MetricStore>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            match store.persist().op("persist") {
                Ok(()) => tracing::debug!("periodic snapshot written"),
                Err(e) => tracing::error!(error = %e, "periodic snapshot failed"),
            }
        }
    })
}
