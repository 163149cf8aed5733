// Rust guideline compliant 2026-07-24

//! Buffer manager: the assembled per-stream buffering fabric.
//!
//! [`BufferManager`] wires the global [`MemoryBudget`], the queue registry,
//! and the enqueue/dequeue facades together, and owns the lifecycle: lazy
//! queue creation, periodic telemetry, shutdown. Configuration via
//! [`BufferConfig::builder`].

mod batch;
mod dequeue;
mod enqueue;
mod registry;
mod telemetry;

pub use batch::{Batch, BatchMessages};
pub use dequeue::BufferDequeue;
pub use enqueue::BufferEnqueue;
pub use registry::QueueRegistry;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use budget::{DEFAULT_LIMIT_FRACTION, MemoryBudget};
use domain::{StreamDescriptor, TelemetrySink};
use parking_lot::Mutex;
use stream_queue::StreamQueue;
use tokio::task::JoinHandle;

/// Default divisor computing the per-stream capacity ceiling.
pub const DEFAULT_MAX_CONCURRENT_STREAMS: u64 = 10;

/// Default telemetry cadence.
pub const DEFAULT_TELEMETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Default consumer inner-loop wait, also the producer park interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

// ---------------------------------------------------------------------------
// ManagerError
// ---------------------------------------------------------------------------

/// Errors raised while assembling the fabric.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// The supplied configuration is invalid.
    #[error("invalid buffer configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// BufferConfig + builder
// ---------------------------------------------------------------------------

/// Runtime configuration for a [`BufferManager`].
///
/// Construct via [`BufferConfig::builder`].
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Ceiling on total budget-granted bytes.
    pub global_limit_bytes: u64,
    /// Allocator granularity.
    pub block_bytes: u64,
    /// Starting capacity of every new queue; not debited from the budget.
    pub initial_queue_capacity_bytes: u64,
    /// Divisor computing the per-stream ceiling
    /// (`global_limit_bytes / max_concurrent_streams`).
    pub max_concurrent_streams: u64,
    /// Cadence of the queue sampler.
    pub telemetry_interval: Duration,
    /// Consumer poll wait and producer park interval.
    pub poll_interval: Duration,
}

/// Builder for [`BufferConfig`].
///
/// Obtain via [`BufferConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct BufferConfigBuilder {
    global_limit_bytes: u64,
    block_bytes: u64,
    initial_queue_capacity_bytes: Option<u64>,
    max_concurrent_streams: u64,
    telemetry_interval: Duration,
    poll_interval: Duration,
}

impl BufferConfig {
    /// Create a builder. `global_limit_bytes` is the only required
    /// parameter.
    ///
    /// Default values: `block_bytes = 10 MiB`, `initial_queue_capacity_bytes
    /// = block_bytes`, `max_concurrent_streams = 10`, `telemetry_interval =
    /// 10 s`, `poll_interval = 5 ms`.
    #[must_use]
    pub fn builder(global_limit_bytes: u64) -> BufferConfigBuilder {
        BufferConfigBuilder {
            global_limit_bytes,
            block_bytes: budget::DEFAULT_BLOCK_BYTES,
            initial_queue_capacity_bytes: None,
            max_concurrent_streams: DEFAULT_MAX_CONCURRENT_STREAMS,
            telemetry_interval: DEFAULT_TELEMETRY_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Builder sized to the conventional fraction of the process memory
    /// figure supplied by the embedding runtime.
    #[must_use]
    pub fn sized_for(process_memory_bytes: u64) -> BufferConfigBuilder {
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss,
            reason = "byte counts fit f64 mantissa for any realistic process size"
        )]
        let limit = (process_memory_bytes as f64 * DEFAULT_LIMIT_FRACTION) as u64;
        Self::builder(limit)
    }

    /// Per-stream capacity ceiling implied by this configuration.
    #[must_use]
    pub fn max_queue_bytes(&self) -> u64 {
        self.global_limit_bytes / self.max_concurrent_streams
    }
}

impl BufferConfigBuilder {
    /// Override the allocator granularity.
    #[must_use]
    pub fn block_bytes(mut self, block_bytes: u64) -> Self {
        self.block_bytes = block_bytes;
        self
    }

    /// Override the starting capacity of new queues. Defaults to one block.
    #[must_use]
    pub fn initial_queue_capacity_bytes(mut self, bytes: u64) -> Self {
        self.initial_queue_capacity_bytes = Some(bytes);
        self
    }

    /// Override the per-stream ceiling divisor.
    #[must_use]
    pub fn max_concurrent_streams(mut self, streams: u64) -> Self {
        self.max_concurrent_streams = streams;
        self
    }

    /// Override the telemetry cadence.
    #[must_use]
    pub fn telemetry_interval(mut self, interval: Duration) -> Self {
        self.telemetry_interval = interval;
        self
    }

    /// Override the poll/park interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::InvalidConfig`] when any byte figure or the
    /// stream divisor is zero, or when the initial queue capacity exceeds
    /// the per-stream ceiling.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<BufferConfig, ManagerError> {
        if self.global_limit_bytes == 0 {
            return Err(ManagerError::InvalidConfig {
                reason: "global_limit_bytes must be >= 1".to_owned(),
            });
        }
        if self.block_bytes == 0 {
            return Err(ManagerError::InvalidConfig {
                reason: "block_bytes must be >= 1".to_owned(),
            });
        }
        if self.max_concurrent_streams == 0 {
            return Err(ManagerError::InvalidConfig {
                reason: "max_concurrent_streams must be >= 1".to_owned(),
            });
        }
        let config = BufferConfig {
            global_limit_bytes: self.global_limit_bytes,
            block_bytes: self.block_bytes,
            initial_queue_capacity_bytes: self
                .initial_queue_capacity_bytes
                .unwrap_or(self.block_bytes),
            max_concurrent_streams: self.max_concurrent_streams,
            telemetry_interval: self.telemetry_interval,
            poll_interval: self.poll_interval,
        };
        if config.initial_queue_capacity_bytes > config.max_queue_bytes() {
            return Err(ManagerError::InvalidConfig {
                reason: format!(
                    "initial queue capacity {} exceeds per-stream ceiling {}",
                    config.initial_queue_capacity_bytes,
                    config.max_queue_bytes()
                ),
            });
        }
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// BufferManager
// ---------------------------------------------------------------------------

/// Owner of the buffering fabric.
///
/// Producers go through [`enqueue`](Self::enqueue), upload workers through
/// [`dequeue`](Self::dequeue). Shutdown ordering is external: workers finish
/// and close their batches first, then [`shutdown`](Self::shutdown) tears
/// the fabric down. Dropping the manager shuts it down as well.
#[derive(Debug)]
pub struct BufferManager {
    budget: Arc<MemoryBudget>,
    registry: Arc<QueueRegistry>,
    enqueue: BufferEnqueue,
    dequeue: BufferDequeue,
    telemetry_interval: Duration,
    telemetry: Mutex<Option<JoinHandle<()>>>,
}

impl BufferManager {
    /// Assemble the fabric from `config`.
    #[must_use]
    pub fn new(config: BufferConfig) -> Self {
        let budget = Arc::new(MemoryBudget::new(
            config.global_limit_bytes,
            config.block_bytes,
        ));
        let registry = Arc::new(QueueRegistry::new(
            config.initial_queue_capacity_bytes,
            config.max_queue_bytes(),
        ));
        log::info!(
            "buffer_manager.created: limit={} block={} max_queue={}",
            config.global_limit_bytes,
            config.block_bytes,
            config.max_queue_bytes()
        );
        Self {
            enqueue: BufferEnqueue::new(
                Arc::clone(&registry),
                Arc::clone(&budget),
                config.poll_interval,
            ),
            dequeue: BufferDequeue::new(
                Arc::clone(&registry),
                Arc::clone(&budget),
                config.poll_interval,
            ),
            telemetry_interval: config.telemetry_interval,
            telemetry: Mutex::new(None),
            budget,
            registry,
        }
    }

    /// The producer-side facade.
    #[must_use]
    pub fn enqueue(&self) -> &BufferEnqueue {
        &self.enqueue
    }

    /// The consumer-side facade.
    #[must_use]
    pub fn dequeue(&self) -> &BufferDequeue {
        &self.dequeue
    }

    /// Snapshot of all live queues, keyed by stream.
    #[must_use]
    pub fn list_buffers(&self) -> HashMap<StreamDescriptor, Arc<StreamQueue>> {
        self.registry.snapshot()
    }

    /// Bytes resident across all queues.
    #[must_use]
    pub fn total_byte_size(&self) -> u64 {
        self.registry.total_used_bytes()
    }

    /// Budget bytes currently outstanding.
    #[must_use]
    pub fn allocated_bytes(&self) -> u64 {
        self.budget.allocated_bytes()
    }

    /// Start the periodic queue sampler, replacing a previous one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_telemetry<S>(&self, sink: S)
    where
        S: TelemetrySink + Send + 'static,
    {
        let handle = telemetry::spawn(Arc::clone(&self.registry), self.telemetry_interval, sink);
        if let Some(previous) = self.telemetry.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Tear the fabric down: cancel telemetry, close and clear every queue.
    ///
    /// Cleared bytes are not refunded; the budget dies with the process.
    /// Idempotent. Call only after upload workers have drained and closed
    /// their batches.
    pub fn shutdown(&self) {
        if let Some(handle) = self.telemetry.lock().take() {
            handle.abort();
        }
        self.registry.close_all();
        log::info!("buffer_manager.shutdown: complete");
    }
}

impl Drop for BufferManager {
    /// Scoped-resource guarantee: a dropped manager is a shut-down manager.
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::{BufferConfig, BufferManager, ManagerError};
    use domain::{Message, QueueSnapshot, SizeEstimator, StreamDescriptor, TelemetrySink};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedEstimator(u64);

    impl SizeEstimator for FixedEstimator {
        fn estimate(&self, _descriptor: &StreamDescriptor, _message: &Message) -> u64 {
            self.0
        }
    }

    // BM-T01: builder defaults.
    #[test]
    fn builder_defaults() {
        let config = BufferConfig::builder(100 * 1024 * 1024).build().unwrap();
        assert_eq!(config.block_bytes, 10 * 1024 * 1024);
        assert_eq!(config.initial_queue_capacity_bytes, config.block_bytes);
        assert_eq!(config.max_concurrent_streams, 10);
        assert_eq!(config.max_queue_bytes(), 10 * 1024 * 1024);
        assert_eq!(config.telemetry_interval, Duration::from_secs(10));
        assert_eq!(config.poll_interval, Duration::from_millis(5));
    }

    // BM-T02: zero values are rejected.
    #[test]
    fn config_rejects_zeroes() {
        assert!(matches!(
            BufferConfig::builder(0).build(),
            Err(ManagerError::InvalidConfig { .. })
        ));
        assert!(matches!(
            BufferConfig::builder(1024).block_bytes(0).build(),
            Err(ManagerError::InvalidConfig { .. })
        ));
        assert!(matches!(
            BufferConfig::builder(1024).max_concurrent_streams(0).build(),
            Err(ManagerError::InvalidConfig { .. })
        ));
    }

    // BM-T03: an initial capacity above the per-stream ceiling is rejected.
    #[test]
    fn config_rejects_oversized_initial_capacity() {
        // Ceiling is 1024/10 = 102 bytes; the default initial capacity of
        // one 512-byte block cannot fit.
        let result = BufferConfig::builder(1024).block_bytes(512).build();
        assert!(matches!(result, Err(ManagerError::InvalidConfig { .. })));

        let config = BufferConfig::builder(1024)
            .block_bytes(512)
            .max_concurrent_streams(2)
            .build()
            .unwrap();
        assert_eq!(config.max_queue_bytes(), 512);
    }

    // BM-T04: sized_for applies the conventional fraction.
    #[test]
    fn sized_for_applies_fraction() {
        let config = BufferConfig::sized_for(1024 * 1024 * 1024)
            .block_bytes(1024 * 1024)
            .build()
            .unwrap();
        assert_eq!(config.global_limit_bytes, 858_993_459);
    }

    // BM-T05: list_buffers reflects lazily created queues.
    #[tokio::test]
    async fn list_buffers_tracks_creation() {
        let manager = BufferManager::new(
            BufferConfig::builder(64 * 1024)
                .block_bytes(4 * 1024)
                .max_concurrent_streams(1)
                .build()
                .unwrap(),
        );
        assert!(manager.list_buffers().is_empty());

        let descriptor = StreamDescriptor::new("public", "users");
        manager
            .enqueue()
            .add_record(&descriptor, Message::record("r"), &FixedEstimator(100))
            .await
            .unwrap();

        let buffers = manager.list_buffers();
        assert_eq!(buffers.len(), 1);
        assert_eq!(buffers[&descriptor].used_bytes(), 100);
    }

    // BM-T06: telemetry runs until shutdown cancels it.
    #[tokio::test]
    async fn telemetry_lifecycle() {
        #[derive(Default)]
        struct CountingSink {
            rounds: Arc<Mutex<usize>>,
        }

        impl TelemetrySink for CountingSink {
            fn emit(&self, _snapshot: &[QueueSnapshot]) {
                *self.rounds.lock() += 1;
            }
        }

        let manager = BufferManager::new(
            BufferConfig::builder(64 * 1024)
                .block_bytes(4 * 1024)
                .max_concurrent_streams(1)
                .telemetry_interval(Duration::from_millis(10))
                .build()
                .unwrap(),
        );
        let rounds = Arc::new(Mutex::new(0));
        manager.start_telemetry(CountingSink {
            rounds: Arc::clone(&rounds),
        });

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while *rounds.lock() == 0 {
            assert!(tokio::time::Instant::now() < deadline, "no emission in time");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        manager.shutdown();
        let emitted = *rounds.lock();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(*rounds.lock(), emitted, "sampler must stop at shutdown");
    }

    // BM-T07: shutdown clears queues without refunding and is idempotent.
    #[tokio::test]
    async fn shutdown_clears_without_refund() {
        let manager = BufferManager::new(
            BufferConfig::builder(4 * 1024)
                .block_bytes(1024)
                .max_concurrent_streams(1)
                .build()
                .unwrap(),
        );
        let descriptor = StreamDescriptor::unnamespaced("s1");
        for _ in 0..3 {
            manager
                .enqueue()
                .add_record(&descriptor, Message::record("r"), &FixedEstimator(1024))
                .await
                .unwrap();
        }
        let allocated = manager.allocated_bytes();
        assert_eq!(allocated, 2 * 1024, "two growth blocks granted");

        manager.shutdown();
        assert_eq!(manager.total_byte_size(), 0);
        assert_eq!(
            manager.allocated_bytes(),
            allocated,
            "clearing must not refund"
        );
        manager.shutdown(); // idempotent
    }
}
