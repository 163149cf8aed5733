// Rust guideline compliant 2026-07-18

//! Shared domain types for the stream-buffering fabric.
//!
//! Defines `StreamDescriptor`, `Message`, `QueueEntry`, the shared
//! `BufferError` taxonomy, and the `SizeEstimator` / `TelemetrySink`
//! hexagonal port traits. All fabric crates depend on this crate; no other
//! workspace crate is imported here.

use std::fmt;

/// Nominal byte charge for every non-RECORD message.
///
/// Control-plane messages carry small out-of-band data; their true
/// serialized size is never estimated.
pub const CONTROL_MESSAGE_BYTES: u64 = 1024;

// ---------------------------------------------------------------------------
// StreamDescriptor
// ---------------------------------------------------------------------------

/// Logical identity of a data stream within one destination job.
///
/// Equality defines queue partitioning: two messages belong to the same
/// queue iff their descriptors are equal. Created by the upstream parser and
/// never mutated inside the fabric.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamDescriptor {
    namespace: Option<String>,
    name: String,
}

impl StreamDescriptor {
    /// Create a descriptor with an explicit namespace.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Create a descriptor without a namespace.
    #[must_use]
    pub fn unnamespaced(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// The namespace component, if any.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// The stream name component.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for StreamDescriptor {
    /// Renders as `namespace.name`, or just `name` when unnamespaced.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Discriminator for the unit of buffered data.
///
/// Only [`Record`](Self::Record) payloads are size-estimated; every other
/// kind is charged [`CONTROL_MESSAGE_BYTES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// A data record bound for the destination.
    Record,
    /// A checkpoint emitted by the source.
    State,
    /// Diagnostic/progress information.
    Trace,
    /// Connector control instructions.
    Control,
}

/// The unit of buffered data: a discriminator plus an opaque serialized
/// payload. The fabric never inspects the payload beyond size estimation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: MessageKind,
    payload: String,
}

impl Message {
    /// Create a message of an arbitrary kind.
    #[must_use]
    pub fn new(kind: MessageKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Shorthand for a RECORD message.
    #[must_use]
    pub fn record(payload: impl Into<String>) -> Self {
        Self::new(MessageKind::Record, payload)
    }

    /// Shorthand for a STATE message.
    #[must_use]
    pub fn state(payload: impl Into<String>) -> Self {
        Self::new(MessageKind::State, payload)
    }

    /// The message discriminator.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// The opaque serialized payload.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

// ---------------------------------------------------------------------------
// QueueEntry
// ---------------------------------------------------------------------------

/// Pairing of a message with the byte amount charged for it.
///
/// Once enqueued, `size_bytes` is what the queue charged against its
/// capacity and what a consumer later refunds through its batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// The buffered message.
    pub message: Message,
    /// Bytes charged against the owning queue's capacity.
    pub size_bytes: u64,
}

impl QueueEntry {
    /// Pair `message` with its charged size.
    #[must_use]
    pub fn new(message: Message, size_bytes: u64) -> Self {
        Self {
            message,
            size_bytes,
        }
    }
}

// ---------------------------------------------------------------------------
// QueueSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time sample of one queue, emitted through the telemetry port.
///
/// Values are per-queue snapshots; observers must not assume cross-queue
/// atomicity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// Stream the sampled queue belongs to.
    pub descriptor: StreamDescriptor,
    /// Number of resident entries.
    pub record_count: usize,
    /// Bytes currently charged by resident entries.
    pub used_bytes: u64,
    /// Current capacity of the queue.
    pub capacity_bytes: u64,
}

// ---------------------------------------------------------------------------
// BufferError
// ---------------------------------------------------------------------------

/// Errors surfaced by the buffering fabric.
///
/// Budget exhaustion and the per-stream capacity ceiling are recovered
/// internally by parking the producer and never appear here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// The queue (or the whole fabric) has been shut down.
    #[error("buffer closed")]
    Closed,
    /// No queue exists for the descriptor; nothing was ever enqueued for it.
    #[error("no queue registered for stream {descriptor}")]
    UnknownStream {
        /// The descriptor the caller asked for.
        descriptor: StreamDescriptor,
    },
    /// The batch was already closed; its sequence can no longer be read.
    #[error("batch already closed")]
    BatchConsumed,
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Hexagonal port: byte-size estimation for RECORD messages.
///
/// Implementations live outside the fabric crates (e.g. in the binary
/// crate). The enqueue facade depends exclusively on this trait -- never on
/// a concrete estimator.
pub trait SizeEstimator {
    /// Estimated serialized size of `message` on stream `descriptor`.
    fn estimate(&self, descriptor: &StreamDescriptor, message: &Message) -> u64;
}

/// Hexagonal port: destination for periodic queue telemetry.
///
/// Called from the sampler task with one snapshot row per live queue.
pub trait TelemetrySink {
    /// Emit one sampling round.
    fn emit(&self, snapshot: &[QueueSnapshot]);
}

#[cfg(test)]
mod tests {
    use super::{
        BufferError, CONTROL_MESSAGE_BYTES, Message, MessageKind, QueueEntry, SizeEstimator,
        StreamDescriptor,
    };

    #[test]
    fn descriptor_partitions_by_namespace_and_name() {
        let a = StreamDescriptor::new("public", "users");
        let b = StreamDescriptor::new("public", "users");
        let c = StreamDescriptor::new("other", "users");
        let d = StreamDescriptor::unnamespaced("users");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn descriptor_display() {
        assert_eq!(StreamDescriptor::new("public", "users").to_string(), "public.users");
        assert_eq!(StreamDescriptor::unnamespaced("users").to_string(), "users");
    }

    #[test]
    fn message_accessors() {
        let record = Message::record("{\"id\":1}");
        assert_eq!(record.kind(), MessageKind::Record);
        assert_eq!(record.payload(), "{\"id\":1}");

        let state = Message::state("{}");
        assert_eq!(state.kind(), MessageKind::State);
    }

    #[test]
    fn entry_carries_charged_size() {
        let entry = QueueEntry::new(Message::record("x"), 512);
        assert_eq!(entry.size_bytes, 512);
        assert_eq!(entry.message.kind(), MessageKind::Record);
    }

    #[test]
    fn control_charge_is_fixed() {
        assert_eq!(CONTROL_MESSAGE_BYTES, 1024);
    }

    #[test]
    fn buffer_error_variants() {
        let closed = BufferError::Closed;
        let unknown = BufferError::UnknownStream {
            descriptor: StreamDescriptor::unnamespaced("users"),
        };
        assert_ne!(closed, unknown);
        assert_eq!(unknown.to_string(), "no queue registered for stream users");
    }

    /// Verify that a minimal `SizeEstimator` implementation is usable
    /// through the port.
    #[test]
    fn size_estimator_impl() {
        struct PayloadLen;

        impl SizeEstimator for PayloadLen {
            fn estimate(&self, _descriptor: &StreamDescriptor, message: &Message) -> u64 {
                message.payload().len() as u64
            }
        }

        let descriptor = StreamDescriptor::unnamespaced("users");
        let message = Message::record("abcd");
        assert_eq!(PayloadLen.estimate(&descriptor, &message), 4);
    }
}
