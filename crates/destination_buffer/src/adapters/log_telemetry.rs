// Rust guideline compliant 2026-07-27

//! Log-only adapter for the `TelemetrySink` port.
//!
//! Emits one `log::debug!` row per queue and never fails. Use a custom
//! implementation for a real observability backend.

use domain::{QueueSnapshot, TelemetrySink};

/// `TelemetrySink` adapter that writes queue samples to the log facade.
#[derive(Debug)]
pub struct LogTelemetry;

impl LogTelemetry {
    /// Create a new log telemetry adapter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink for LogTelemetry {
    fn emit(&self, snapshot: &[QueueSnapshot]) {
        for row in snapshot {
            log::debug!(
                "log_telemetry.queue: stream={} records={} used={} capacity={}",
                row.descriptor,
                row.record_count,
                row.used_bytes,
                row.capacity_bytes
            );
        }
    }
}
