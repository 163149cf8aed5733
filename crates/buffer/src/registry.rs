// Rust guideline compliant 2026-07-22

//! Stream-to-queue registry.
//!
//! Queues are created lazily on first enqueue and live until shutdown.
//! Reads are concurrent; the write lock is taken only for a first insert.

use std::collections::HashMap;
use std::sync::Arc;

use domain::StreamDescriptor;
use parking_lot::RwLock;
use stream_queue::StreamQueue;

/// Mapping from [`StreamDescriptor`] to its queue.
///
/// `get_or_create` is atomic: concurrent first writes to the same descriptor
/// observe a single queue. The registry exclusively owns its queues; callers
/// receive shared handles.
#[derive(Debug)]
pub struct QueueRegistry {
    queues: RwLock<HashMap<StreamDescriptor, Arc<StreamQueue>>>,
    initial_capacity_bytes: u64,
    max_queue_bytes: u64,
}

impl QueueRegistry {
    /// Create an empty registry. New queues start at
    /// `initial_capacity_bytes` and are capped at `max_queue_bytes`.
    #[must_use]
    pub fn new(initial_capacity_bytes: u64, max_queue_bytes: u64) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            initial_capacity_bytes,
            max_queue_bytes,
        }
    }

    /// Resolve the queue for `descriptor`, creating it on first use.
    #[must_use]
    pub fn get_or_create(&self, descriptor: &StreamDescriptor) -> Arc<StreamQueue> {
        if let Some(queue) = self.queues.read().get(descriptor) {
            return Arc::clone(queue);
        }
        let mut queues = self.queues.write();
        // Re-checked under the write lock: a racing creator may have won.
        let queue = queues.entry(descriptor.clone()).or_insert_with(|| {
            log::info!(
                "registry.queue.created: stream={descriptor} capacity={}",
                self.initial_capacity_bytes
            );
            Arc::new(StreamQueue::new(
                self.initial_capacity_bytes,
                self.max_queue_bytes,
            ))
        });
        Arc::clone(queue)
    }

    /// Resolve the queue for `descriptor` without creating it.
    #[must_use]
    pub fn get(&self, descriptor: &StreamDescriptor) -> Option<Arc<StreamQueue>> {
        self.queues.read().get(descriptor).map(Arc::clone)
    }

    /// Point-in-time snapshot of all live queues.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<StreamDescriptor, Arc<StreamQueue>> {
        self.queues
            .read()
            .iter()
            .map(|(descriptor, queue)| (descriptor.clone(), Arc::clone(queue)))
            .collect()
    }

    /// Sum of resident bytes across all queues.
    #[must_use]
    pub fn total_used_bytes(&self) -> u64 {
        self.queues
            .read()
            .values()
            .map(|queue| queue.used_bytes())
            .sum()
    }

    /// Close and clear every queue. Cleared bytes are not refunded; the
    /// process is terminating.
    pub fn close_all(&self) {
        let queues = self.queues.read();
        for (descriptor, queue) in queues.iter() {
            queue.close();
            queue.clear();
            log::debug!("registry.queue.closed: stream={descriptor}");
        }
    }
}
