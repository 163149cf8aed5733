// Rust guideline compliant 2026-07-24

//! Producer-side facade: routes a message to its stream's queue, growing
//! capacity on back-pressure and blocking only when the global budget is
//! exhausted or the per-stream ceiling is hit.

use std::sync::Arc;
use std::time::Duration;

use budget::MemoryBudget;
use domain::{
    BufferError, CONTROL_MESSAGE_BYTES, Message, MessageKind, QueueEntry, SizeEstimator,
    StreamDescriptor,
};
use stream_queue::OfferError;

use crate::registry::QueueRegistry;

/// Admits messages into per-stream queues.
///
/// Generic over the estimator port per call for zero-cost static dispatch;
/// holds no concrete estimator reference.
#[derive(Debug)]
pub struct BufferEnqueue {
    registry: Arc<QueueRegistry>,
    budget: Arc<MemoryBudget>,
    park_interval: Duration,
}

impl BufferEnqueue {
    pub(crate) fn new(
        registry: Arc<QueueRegistry>,
        budget: Arc<MemoryBudget>,
        park_interval: Duration,
    ) -> Self {
        Self {
            registry,
            budget,
            park_interval,
        }
    }

    /// Admit `message` into the queue for `descriptor`, creating the queue
    /// on first use.
    ///
    /// RECORD messages are charged the estimator's size; every other kind
    /// is charged the fixed [`CONTROL_MESSAGE_BYTES`]. When the queue is
    /// full the facade requests a budget block and grows the queue; when no
    /// block is granted, or the queue sits at its per-stream ceiling, the
    /// producer parks in bounded sleeps until a consumer frees memory. No
    /// lock is held while parked.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Closed`] once the fabric is shut down.
    pub async fn add_record<E: SizeEstimator>(
        &self,
        descriptor: &StreamDescriptor,
        message: Message,
        estimator: &E,
    ) -> Result<(), BufferError> {
        let queue = self.registry.get_or_create(descriptor);
        let size_bytes = match message.kind() {
            MessageKind::Record => estimator.estimate(descriptor, &message),
            MessageKind::State | MessageKind::Trace | MessageKind::Control => {
                CONTROL_MESSAGE_BYTES
            }
        };

        let mut entry = QueueEntry::new(message, size_bytes);
        loop {
            entry = match queue.offer(entry) {
                Ok(()) => return Ok(()),
                Err(OfferError::Closed { .. }) => return Err(BufferError::Closed),
                Err(OfferError::Full { entry, .. }) => entry,
            };

            if queue.capacity_bytes() < queue.max_capacity_bytes() {
                let granted = self.budget.request_block();
                if granted > 0 {
                    let applied = queue.grow_capacity(granted);
                    if applied < granted {
                        // The ceiling clamped part of the block; hand the
                        // remainder straight back.
                        self.budget.free(granted - applied);
                    }
                    if applied > 0 {
                        log::debug!(
                            "buffer_enqueue.queue.grown: stream={descriptor} applied={applied} capacity={}",
                            queue.capacity_bytes()
                        );
                        continue;
                    }
                }
            }

            // Budget exhausted or ceiling reached: park until a consumer
            // drains and refunds, then retry.
            log::trace!(
                "buffer_enqueue.parked: stream={descriptor} used={} capacity={}",
                queue.used_bytes(),
                queue.capacity_bytes()
            );
            tokio::time::sleep(self.park_interval).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
