// Rust guideline compliant 2026-07-24

//! Periodic queue sampler.
//!
//! Samples every live queue on a fixed cadence and pushes the snapshot
//! through the [`TelemetrySink`] port. The task is detached and owned by
//! the manager, which aborts it at shutdown.

use std::sync::Arc;
use std::time::Duration;

use domain::{QueueSnapshot, TelemetrySink};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::registry::QueueRegistry;

/// Spawn the sampler. The first emission happens one full `interval` after
/// start; a missed tick is delayed rather than burst.
pub(crate) fn spawn<S>(registry: Arc<QueueRegistry>, interval: Duration, sink: S) -> JoinHandle<()>
where
    S: TelemetrySink + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Consume the immediate first tick so emissions are interval-spaced.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let snapshot: Vec<QueueSnapshot> = registry
                .snapshot()
                .into_iter()
                .map(|(descriptor, queue)| QueueSnapshot {
                    descriptor,
                    record_count: queue.size(),
                    used_bytes: queue.used_bytes(),
                    capacity_bytes: queue.capacity_bytes(),
                })
                .collect();
            log::debug!("telemetry.sampled: queues={}", snapshot.len());
            sink.emit(&snapshot);
        }
    })
}
