// Rust guideline compliant 2026-07-21

//! Byte-accounted blocking FIFO queue, one per stream.
//!
//! [`StreamQueue`] accounts capacity in bytes rather than element count.
//! [`offer`](StreamQueue::offer) is non-blocking and never grows capacity
//! itself; growth and shrinkage go through
//! [`grow_capacity`](StreamQueue::grow_capacity) and
//! [`reclaim_capacity`](StreamQueue::reclaim_capacity) so that the facades
//! above can keep the global budget consistent.
//! [`poll`](StreamQueue::poll) blocks up to a timeout.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use domain::{BufferError, QueueEntry};
use parking_lot::Mutex;
use tokio::sync::Notify;

// ---------------------------------------------------------------------------
// OfferError
// ---------------------------------------------------------------------------

/// Rejection of an [`offer`](StreamQueue::offer); the entry is handed back
/// so the producer can retry after growing capacity or waiting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OfferError {
    /// The entry does not fit in the remaining capacity.
    #[error("queue full (capacity: {capacity_bytes} bytes)")]
    Full {
        /// The rejected entry, returned to the caller.
        entry: QueueEntry,
        /// Capacity at the time of rejection.
        capacity_bytes: u64,
    },
    /// The queue has been shut down; no further writes are accepted.
    #[error("queue closed")]
    Closed {
        /// The rejected entry, returned to the caller.
        entry: QueueEntry,
    },
}

impl OfferError {
    /// Recover the rejected entry regardless of the rejection reason.
    #[must_use]
    pub fn into_entry(self) -> QueueEntry {
        match self {
            Self::Full { entry, .. } | Self::Closed { entry } => entry,
        }
    }
}

// ---------------------------------------------------------------------------
// Inner state
// ---------------------------------------------------------------------------

/// Lock-guarded queue state. The lock is never held across an await point.
#[derive(Debug)]
struct QueueInner {
    entries: VecDeque<QueueEntry>,
    used_bytes: u64,
    capacity_bytes: u64,
    last_enqueue: Option<Instant>,
    closed: bool,
}

/// Outcome of a single non-blocking extraction attempt.
enum TryPoll {
    Entry(QueueEntry),
    /// Head entry exceeds the caller's byte bound; it stays in place.
    TooLarge,
    Empty,
    Closed,
}

// ---------------------------------------------------------------------------
// StreamQueue
// ---------------------------------------------------------------------------

/// Blocking FIFO queue accounted in bytes.
///
/// Invariants, visible at every unlock: `used_bytes` equals the sum of
/// resident entry sizes; `used_bytes <= capacity_bytes` immediately after
/// any accepted offer; `capacity_bytes` stays within
/// `[initial_capacity_bytes, max_capacity_bytes]`. Ordering is strict FIFO
/// across all producers and consumers of this queue.
#[derive(Debug)]
pub struct StreamQueue {
    inner: Mutex<QueueInner>,
    initial_capacity_bytes: u64,
    max_capacity_bytes: u64,
    data_ready: Notify,
}

impl StreamQueue {
    /// Create an open queue with `initial_capacity_bytes` of headroom and a
    /// hard ceiling of `max_capacity_bytes`.
    #[must_use]
    pub fn new(initial_capacity_bytes: u64, max_capacity_bytes: u64) -> Self {
        debug_assert!(
            initial_capacity_bytes <= max_capacity_bytes,
            "initial capacity {initial_capacity_bytes} exceeds ceiling {max_capacity_bytes}"
        );
        Self {
            inner: Mutex::new(QueueInner {
                entries: VecDeque::new(),
                used_bytes: 0,
                capacity_bytes: initial_capacity_bytes,
                last_enqueue: None,
                closed: false,
            }),
            initial_capacity_bytes,
            max_capacity_bytes: max_capacity_bytes.max(initial_capacity_bytes),
            data_ready: Notify::new(),
        }
    }

    /// Append `entry` iff it fits in the remaining capacity (non-blocking).
    ///
    /// On success updates the byte accounting and the last-enqueue
    /// timestamp, then wakes one pending poller. Never grows capacity.
    ///
    /// # Errors
    ///
    /// [`OfferError::Full`] when `used + size > capacity` (the entry is
    /// handed back), [`OfferError::Closed`] after [`close`](Self::close).
    pub fn offer(&self, entry: QueueEntry) -> Result<(), OfferError> {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(OfferError::Closed { entry });
            }
            if inner.used_bytes + entry.size_bytes > inner.capacity_bytes {
                let capacity_bytes = inner.capacity_bytes;
                return Err(OfferError::Full {
                    entry,
                    capacity_bytes,
                });
            }
            inner.used_bytes += entry.size_bytes;
            inner.last_enqueue = Some(Instant::now());
            inner.entries.push_back(entry);
        } // lock dropped before waking the poller
        self.data_ready.notify_one();
        Ok(())
    }

    /// Remove and return the head entry, waiting up to `timeout`.
    ///
    /// Returns `Ok(None)` when the timeout elapses with the queue empty.
    ///
    /// # Errors
    ///
    /// [`BufferError::Closed`] once the queue is closed and drained.
    pub async fn poll(&self, timeout: Duration) -> Result<Option<QueueEntry>, BufferError> {
        self.poll_up_to(u64::MAX, timeout).await
    }

    /// As [`poll`](Self::poll), but a head entry larger than `max_bytes` is
    /// left in place and `Ok(None)` is returned immediately.
    ///
    /// This is the head-of-line policy of the dequeue facade: an entry that
    /// would overflow a batch target is never consumed, and never dropped.
    ///
    /// # Errors
    ///
    /// [`BufferError::Closed`] once the queue is closed and drained.
    pub async fn poll_up_to(
        &self,
        max_bytes: u64,
        timeout: Duration,
    ) -> Result<Option<QueueEntry>, BufferError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register interest before checking, so an offer landing between
            // the check and the await cannot be missed.
            let notified = self.data_ready.notified();
            match self.try_poll_bounded(max_bytes) {
                TryPoll::Entry(entry) => return Ok(Some(entry)),
                TryPoll::TooLarge => return Ok(None),
                TryPoll::Closed => return Err(BufferError::Closed),
                TryPoll::Empty => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        // Timed out; one final non-blocking attempt.
                        return Ok(match self.try_poll_bounded(max_bytes) {
                            TryPoll::Entry(entry) => Some(entry),
                            _ => None,
                        });
                    }
                }
            }
        }
    }

    /// Non-blocking sibling of [`poll`](Self::poll).
    #[must_use]
    pub fn try_poll(&self) -> Option<QueueEntry> {
        match self.try_poll_bounded(u64::MAX) {
            TryPoll::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    fn try_poll_bounded(&self, max_bytes: u64) -> TryPoll {
        let mut inner = self.inner.lock();
        let head_size = match inner.entries.front() {
            Some(head) => head.size_bytes,
            None if inner.closed => return TryPoll::Closed,
            None => return TryPoll::Empty,
        };
        if head_size > max_bytes {
            return TryPoll::TooLarge;
        }
        if let Some(entry) = inner.entries.pop_front() {
            inner.used_bytes -= entry.size_bytes;
            TryPoll::Entry(entry)
        } else {
            TryPoll::Empty
        }
    }

    /// Raise capacity by up to `bytes`, clamped at the per-stream ceiling.
    ///
    /// Returns the applied amount; the caller must return any clamped
    /// remainder to wherever the bytes came from.
    #[must_use = "the applied growth may be smaller than requested"]
    pub fn grow_capacity(&self, bytes: u64) -> u64 {
        let mut inner = self.inner.lock();
        let applied = bytes.min(self.max_capacity_bytes - inner.capacity_bytes);
        inner.capacity_bytes += applied;
        applied
    }

    /// Lower capacity by up to `bytes`, never below the initial grant and
    /// never below the bytes currently resident.
    ///
    /// Returns the applied shrink: the portion of a drained batch that the
    /// owner of those bytes may refund to the global budget.
    #[must_use = "only the returned amount may be refunded"]
    pub fn reclaim_capacity(&self, bytes: u64) -> u64 {
        let mut inner = self.inner.lock();
        let reclaimable = (inner.capacity_bytes - self.initial_capacity_bytes)
            .min(inner.capacity_bytes - inner.used_bytes);
        let applied = bytes.min(reclaimable);
        inner.capacity_bytes -= applied;
        applied
    }

    /// Stop accepting writes. Idempotent; pending pollers drain the
    /// remaining entries and then observe `Closed`.
    pub fn close(&self) {
        {
            let mut inner = self.inner.lock();
            inner.closed = true;
        }
        self.data_ready.notify_waiters();
    }

    /// Drop all resident entries without refunding their bytes anywhere.
    ///
    /// Shutdown-only: the process is terminating and the budget goes away
    /// with it.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.entries.len();
        inner.entries.clear();
        inner.used_bytes = 0;
        if dropped > 0 {
            log::debug!("stream_queue.cleared: dropped={dropped}");
        }
    }

    /// Number of resident entries.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// `true` when no entries are resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Bytes charged by resident entries.
    #[must_use]
    pub fn used_bytes(&self) -> u64 {
        self.inner.lock().used_bytes
    }

    /// Current capacity.
    #[must_use]
    pub fn capacity_bytes(&self) -> u64 {
        self.inner.lock().capacity_bytes
    }

    /// Hard per-stream ceiling fixed at construction.
    #[must_use]
    pub fn max_capacity_bytes(&self) -> u64 {
        self.max_capacity_bytes
    }

    /// Capacity the queue started with, never reclaimed.
    #[must_use]
    pub fn initial_capacity_bytes(&self) -> u64 {
        self.initial_capacity_bytes
    }

    /// Timestamp of the most recent accepted offer.
    #[must_use]
    pub fn last_enqueue_time(&self) -> Option<Instant> {
        self.inner.lock().last_enqueue
    }

    /// `true` after [`close`](Self::close).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
