// Rust guideline compliant 2026-07-18

//! Process-wide memory budget for the stream-buffering fabric.
//!
//! [`MemoryBudget`] dispenses memory in nominally fixed blocks and takes
//! refunds when consumers release drained batches. It is the single
//! authority on how many bytes the fabric may hold resident; every
//! per-stream queue grows only through it.

use parking_lot::Mutex;

/// Default allocator granularity: 10 MiB.
pub const DEFAULT_BLOCK_BYTES: u64 = 10 * 1024 * 1024;

/// Fraction of the process memory figure handed to the fabric by default.
pub const DEFAULT_LIMIT_FRACTION: f64 = 0.8;

// ---------------------------------------------------------------------------
// MemoryBudget
// ---------------------------------------------------------------------------

/// Serialized allocator dispensing memory in fixed-size blocks.
///
/// Both mutating operations take the same lock, so allocation and refund are
/// mutually exclusive; callers racing for the last partial block are
/// arbitrated FIFO by the lock. Neither operation ever blocks on anything
/// but that lock, and neither fails: an exhausted budget is reported as a
/// zero grant.
#[derive(Debug)]
pub struct MemoryBudget {
    max_bytes: u64,
    block_bytes: u64,
    allocated: Mutex<u64>,
}

impl MemoryBudget {
    /// Create a budget with `max_bytes` total and `block_bytes` granularity.
    #[must_use]
    pub fn new(max_bytes: u64, block_bytes: u64) -> Self {
        Self {
            max_bytes,
            block_bytes,
            allocated: Mutex::new(0),
        }
    }

    /// Create a budget sized to [`DEFAULT_LIMIT_FRACTION`] of
    /// `process_memory_bytes`, with the default block size.
    #[must_use]
    pub fn sized_for(process_memory_bytes: u64) -> Self {
        // Fraction in [0, 1]; the product cannot exceed u64 range.
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss,
            reason = "byte counts fit f64 mantissa for any realistic process size"
        )]
        let max = (process_memory_bytes as f64 * DEFAULT_LIMIT_FRACTION) as u64;
        Self::new(max, DEFAULT_BLOCK_BYTES)
    }

    /// Grant up to one block of memory.
    ///
    /// Returns `0` when the budget is exhausted, otherwise
    /// `min(block_bytes, max_bytes - allocated)`. The caller must treat a
    /// zero grant as "retry after a consumer frees memory".
    #[must_use = "a zero grant means the budget is exhausted and must be handled"]
    pub fn request_block(&self) -> u64 {
        let mut allocated = self.allocated.lock();
        if *allocated >= self.max_bytes {
            return 0;
        }
        let granted = self.block_bytes.min(self.max_bytes - *allocated);
        *allocated += granted;
        log::debug!(
            "budget.block.granted: bytes={granted} allocated={} max={}",
            *allocated,
            self.max_bytes
        );
        granted
    }

    /// Return `bytes` to the budget.
    ///
    /// Refunding more than is currently outstanding is a programmer error:
    /// it panics in a build with debug assertions and is logged and clamped
    /// to zero in a release build.
    pub fn free(&self, bytes: u64) {
        let mut allocated = self.allocated.lock();
        if bytes > *allocated {
            debug_assert!(
                false,
                "over-refund: freeing {bytes} bytes with {} outstanding",
                *allocated
            );
            log::error!(
                "budget.free.over_refund: bytes={bytes} allocated={}",
                *allocated
            );
            *allocated = 0;
        } else {
            *allocated -= bytes;
        }
        log::debug!("budget.freed: bytes={bytes} allocated={}", *allocated);
    }

    /// Bytes currently outstanding.
    #[must_use]
    pub fn allocated_bytes(&self) -> u64 {
        *self.allocated.lock()
    }

    /// Total byte ceiling fixed at construction.
    #[must_use]
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Allocation granularity fixed at construction.
    #[must_use]
    pub fn block_bytes(&self) -> u64 {
        self.block_bytes
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
