// Rust guideline compliant 2026-07-27

//! Adapters (secondary ports) for the destination-buffer binary.
//!
//! Each sub-module implements one or more hexagonal port traits defined in
//! the `domain` crate. Adapters are intentionally isolated from the fabric
//! crates.

pub mod log_telemetry;
pub mod rolling_estimator;
