// Rust guideline compliant 2026-07-27

//! Rolling-average adapter for the `SizeEstimator` port.
//!
//! Keeps one cumulative moving average of serialized payload size per
//! stream. Every estimate folds the observed payload into the average, so
//! the charge tracks the stream's actual record shape over time.

use std::collections::HashMap;

use domain::{Message, SizeEstimator, StreamDescriptor};
use parking_lot::Mutex;

/// Per-stream running mean.
#[derive(Debug, Clone, Copy)]
struct RollingAverage {
    count: u64,
    mean: f64,
}

impl RollingAverage {
    #[expect(
        clippy::cast_precision_loss,
        reason = "payload sizes and counts are far below the f64 mantissa limit"
    )]
    fn observe(&mut self, bytes: u64) {
        self.count += 1;
        self.mean += (bytes as f64 - self.mean) / self.count as f64;
    }
}

/// `SizeEstimator` adapter backed by per-stream rolling averages.
///
/// Thread-safe; shared across producer tasks.
#[derive(Debug, Default)]
pub struct RollingSizeEstimator {
    streams: Mutex<HashMap<StreamDescriptor, RollingAverage>>,
}

impl RollingSizeEstimator {
    /// Create an estimator with no history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SizeEstimator for RollingSizeEstimator {
    /// Fold the message's payload size into the stream's average and return
    /// the updated mean, never less than one byte.
    fn estimate(&self, descriptor: &StreamDescriptor, message: &Message) -> u64 {
        let observed = message.payload().len() as u64;
        let mut streams = self.streams.lock();
        let average = streams
            .entry(descriptor.clone())
            .or_insert(RollingAverage { count: 0, mean: 0.0 });
        average.observe(observed);
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "the mean of u64 observations is a small non-negative f64"
        )]
        let estimate = average.mean.round() as u64;
        estimate.max(1)
    }
}
