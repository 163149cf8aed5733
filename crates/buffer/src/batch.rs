// Rust guideline compliant 2026-07-22

//! Size-bounded batch handed to an upload worker.
//!
//! A [`Batch`] holds bytes on the global budget from the moment the dequeue
//! facade assembles it until [`close`](Batch::close) runs. Dropping an
//! unclosed batch closes it, so an interrupted consumer can never leak
//! budget bytes.

use std::collections::VecDeque;
use std::sync::Arc;

use budget::MemoryBudget;
use domain::{BufferError, Message};

/// Lifecycle of a batch: reading the sequence moves `Open` to `Draining`;
/// `close` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchState {
    Open,
    Draining,
    Closed,
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Single-consumer holder of a drained message run.
///
/// `size_bytes` is the amount reserved from the source queue; `refundable`
/// is the portion backed by budget grants, released to the budget exactly
/// once on close. The two differ only when part of the run was carried by
/// the queue's never-debited initial capacity.
#[derive(Debug)]
pub struct Batch {
    messages: VecDeque<Message>,
    size_bytes: u64,
    refundable_bytes: u64,
    budget: Arc<MemoryBudget>,
    state: BatchState,
}

impl Batch {
    /// Create an empty open batch. Closing it is a no-op refund.
    #[must_use]
    pub(crate) fn empty(budget: Arc<MemoryBudget>) -> Self {
        Self {
            messages: VecDeque::new(),
            size_bytes: 0,
            refundable_bytes: 0,
            budget,
            state: BatchState::Open,
        }
    }

    /// Append one drained entry. `refundable` is the capacity the source
    /// queue gave up for it, established at assembly time so that dropping
    /// a partial batch refunds correctly.
    pub(crate) fn push(&mut self, message: Message, size_bytes: u64, refundable: u64) {
        self.messages.push_back(message);
        self.size_bytes += size_bytes;
        self.refundable_bytes += refundable;
    }

    /// Bytes reserved from the source queue.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Number of messages in the batch.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.messages.len()
    }

    /// `true` when the batch carries no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The batch's message sequence: a finite, single-pass iterator.
    ///
    /// The sequence is not restartable; messages it yields are gone from
    /// the batch. Consume it fully before closing.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::BatchConsumed`] once the batch is closed.
    pub fn messages(&mut self) -> Result<BatchMessages<'_>, BufferError> {
        match self.state {
            BatchState::Closed => Err(BufferError::BatchConsumed),
            BatchState::Open | BatchState::Draining => {
                self.state = BatchState::Draining;
                Ok(BatchMessages {
                    inner: &mut self.messages,
                })
            }
        }
    }

    /// Release the batch's bytes back to the budget.
    ///
    /// Idempotent: the refund happens exactly once, on the first call.
    pub fn close(&mut self) {
        if self.state == BatchState::Closed {
            return;
        }
        self.state = BatchState::Closed;
        if self.refundable_bytes > 0 {
            self.budget.free(self.refundable_bytes);
        }
        log::debug!(
            "batch.closed: bytes={} refunded={}",
            self.size_bytes,
            self.refundable_bytes
        );
    }
}

impl Drop for Batch {
    /// Guaranteed release: an abandoned batch refunds on drop.
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// BatchMessages
// ---------------------------------------------------------------------------

/// Pull iterator over a batch's messages. Obtained via
/// [`Batch::messages`]; draining it empties the batch.
#[derive(Debug)]
pub struct BatchMessages<'a> {
    inner: &'a mut VecDeque<Message>,
}

impl Iterator for BatchMessages<'_> {
    type Item = Message;

    fn next(&mut self) -> Option<Message> {
        self.inner.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.inner.len(), Some(self.inner.len()))
    }
}

impl ExactSizeIterator for BatchMessages<'_> {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::Batch;
    use budget::MemoryBudget;
    use domain::{BufferError, Message};
    use std::sync::Arc;

    fn charged_budget(bytes: u64) -> Arc<MemoryBudget> {
        let budget = Arc::new(MemoryBudget::new(1024 * 1024, bytes));
        assert_eq!(budget.request_block(), bytes);
        budget
    }

    // BA-T01: messages drain in order, exactly once.
    #[test]
    fn drains_in_order() {
        let budget = charged_budget(300);
        let mut batch = Batch::empty(Arc::clone(&budget));
        for i in 0..3 {
            batch.push(Message::record(format!("m{i}")), 100, 100);
        }
        assert_eq!(batch.record_count(), 3);
        assert_eq!(batch.size_bytes(), 300);

        let drained: Vec<String> = batch
            .messages()
            .unwrap()
            .map(|m| m.payload().to_owned())
            .collect();
        assert_eq!(drained, ["m0", "m1", "m2"]);
        assert!(batch.is_empty());
    }

    // BA-T02: close refunds exactly once; double close is a no-op.
    #[test]
    fn close_refunds_exactly_once() {
        let budget = charged_budget(200);
        let mut batch = Batch::empty(Arc::clone(&budget));
        batch.push(Message::record("a"), 100, 100);
        batch.push(Message::record("b"), 100, 100);
        assert_eq!(budget.allocated_bytes(), 200);

        batch.close();
        assert_eq!(budget.allocated_bytes(), 0);
        batch.close(); // must not refund again
        assert_eq!(budget.allocated_bytes(), 0);
    }

    // BA-T03: reading a closed batch fails.
    #[test]
    fn read_after_close_fails() {
        let budget = charged_budget(100);
        let mut batch = Batch::empty(budget);
        batch.push(Message::record("a"), 100, 100);
        batch.close();
        assert!(matches!(batch.messages(), Err(BufferError::BatchConsumed)));
    }

    // BA-T04: dropping an unclosed batch refunds.
    #[test]
    fn drop_refunds() {
        let budget = charged_budget(100);
        {
            let mut batch = Batch::empty(Arc::clone(&budget));
            batch.push(Message::record("a"), 100, 100);
            let _ = batch.messages().unwrap().next();
            // batch dropped here, still unclosed
        }
        assert_eq!(budget.allocated_bytes(), 0);
    }

    // BA-T05: a batch whose bytes were carried by initial queue capacity
    // refunds nothing.
    #[test]
    fn non_refundable_bytes_stay_put() {
        let budget = charged_budget(100);
        let mut batch = Batch::empty(Arc::clone(&budget));
        batch.push(Message::record("a"), 512, 0);
        batch.close();
        assert_eq!(budget.allocated_bytes(), 100, "nothing to refund");
        assert_eq!(batch.size_bytes(), 512);
    }

    // BA-T06: an empty batch closes as a no-op.
    #[test]
    fn empty_batch_close_is_noop() {
        let budget = charged_budget(100);
        let mut batch = Batch::empty(Arc::clone(&budget));
        assert!(batch.is_empty());
        assert_eq!(batch.size_bytes(), 0);
        batch.close();
        assert_eq!(budget.allocated_bytes(), 100);
    }
}
