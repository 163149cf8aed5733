// Rust guideline compliant 2026-07-24

//! Consumer-side facade: assembles size-capped batches and exposes
//! per-queue metadata for orchestration.

use std::sync::Arc;
use std::time::Duration;

use budget::MemoryBudget;
use domain::{BufferError, StreamDescriptor};

use crate::batch::Batch;
use crate::registry::QueueRegistry;

/// Drains per-stream queues into [`Batch`]es.
#[derive(Debug)]
pub struct BufferDequeue {
    registry: Arc<QueueRegistry>,
    budget: Arc<MemoryBudget>,
    poll_interval: Duration,
}

impl BufferDequeue {
    pub(crate) fn new(
        registry: Arc<QueueRegistry>,
        budget: Arc<MemoryBudget>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            registry,
            budget,
            poll_interval,
        }
    }

    /// Assemble a batch of up to `bytes_target` bytes from the queue for
    /// `descriptor`, by greedy head-of-line extraction.
    ///
    /// Assembly stops when the queue stays empty for one poll interval,
    /// when the target is reached, or when the head entry would overflow
    /// it. An overflowing head is never consumed: it stays queued and the
    /// batch ends below target, so a head entry alone larger than
    /// `bytes_target` yields an empty batch and the caller should retry
    /// with a larger target. A zero target returns an empty batch without
    /// polling.
    ///
    /// Each accepted entry's bytes move from the queue's capacity into the
    /// batch as they are drained, so cancelling the returned future (or the
    /// `Closed` error below) refunds correctly through the partial batch's
    /// drop.
    ///
    /// # Errors
    ///
    /// [`BufferError::UnknownStream`] when nothing was ever enqueued for
    /// `descriptor`; [`BufferError::Closed`] when the fabric shuts down
    /// mid-assembly.
    pub async fn take(
        &self,
        descriptor: &StreamDescriptor,
        bytes_target: u64,
    ) -> Result<Batch, BufferError> {
        let queue = self
            .registry
            .get(descriptor)
            .ok_or_else(|| BufferError::UnknownStream {
                descriptor: descriptor.clone(),
            })?;

        let mut batch = Batch::empty(Arc::clone(&self.budget));
        loop {
            let remaining = bytes_target - batch.size_bytes();
            if remaining == 0 {
                break;
            }
            match queue.poll_up_to(remaining, self.poll_interval).await? {
                Some(entry) => {
                    let refundable = queue.reclaim_capacity(entry.size_bytes);
                    batch.push(entry.message, entry.size_bytes, refundable);
                }
                None => break, // queue momentarily empty, or head would overflow
            }
        }
        log::debug!(
            "buffer_dequeue.batch.assembled: stream={descriptor} records={} bytes={}",
            batch.record_count(),
            batch.size_bytes()
        );
        Ok(batch)
    }

    /// Number of resident entries on the stream's queue.
    ///
    /// # Errors
    ///
    /// [`BufferError::UnknownStream`] when no queue exists.
    pub fn record_count(&self, descriptor: &StreamDescriptor) -> Result<usize, BufferError> {
        self.queue(descriptor).map(|queue| queue.size())
    }

    /// Bytes resident on the stream's queue.
    ///
    /// # Errors
    ///
    /// [`BufferError::UnknownStream`] when no queue exists.
    pub fn byte_size(&self, descriptor: &StreamDescriptor) -> Result<u64, BufferError> {
        self.queue(descriptor).map(|queue| queue.used_bytes())
    }

    /// Timestamp of the stream's most recent accepted enqueue, if any.
    ///
    /// # Errors
    ///
    /// [`BufferError::UnknownStream`] when no queue exists.
    pub fn time_of_last_record(
        &self,
        descriptor: &StreamDescriptor,
    ) -> Result<Option<std::time::Instant>, BufferError> {
        self.queue(descriptor).map(|queue| queue.last_enqueue_time())
    }

    /// Bytes resident across all queues.
    #[must_use]
    pub fn total_byte_size(&self) -> u64 {
        self.registry.total_used_bytes()
    }

    fn queue(
        &self,
        descriptor: &StreamDescriptor,
    ) -> Result<Arc<stream_queue::StreamQueue>, BufferError> {
        self.registry
            .get(descriptor)
            .ok_or_else(|| BufferError::UnknownStream {
                descriptor: descriptor.clone(),
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
