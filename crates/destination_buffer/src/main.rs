// Rust guideline compliant 2026-07-29

//! Destination-buffer demo entry point.
//!
//! Wires the buffering fabric to synthetic producers and upload workers:
//! three streams, one producer and one upload worker each, sharing a single
//! global memory budget. Producers block when the budget is exhausted;
//! workers drain size-capped batches and refund on close.
//!
//! # Usage
//!
//! ```text
//! # Show batch-level log lines
//! RUST_LOG=info cargo run
//!
//! # Also show budget grants and telemetry samples
//! RUST_LOG=debug cargo run
//! ```

mod adapters;
mod record_gen;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use adapters::log_telemetry::LogTelemetry;
use adapters::rolling_estimator::RollingSizeEstimator;
use anyhow::Context as _;
use buffer::{BufferConfig, BufferManager};
use domain::{BufferError, StreamDescriptor};
use record_gen::RecordGenerator;
use tracing::Instrument as _;

/// Global budget for the demo run. Small on purpose so growth and
/// back-pressure are visible in the logs.
const GLOBAL_LIMIT_BYTES: u64 = 8 * 1024 * 1024;

/// Allocator granularity for the demo run.
const BLOCK_BYTES: u64 = 256 * 1024;

/// Records each producer emits before finishing.
const RECORDS_PER_STREAM: u64 = 2_000;

/// A STATE checkpoint follows every this many records.
const CHECKPOINT_EVERY: u64 = 100;

/// Upload batch target.
const BATCH_TARGET_BYTES: u64 = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize the tracing subscriber before any async work.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = BufferConfig::builder(GLOBAL_LIMIT_BYTES)
        .block_bytes(BLOCK_BYTES)
        .max_concurrent_streams(8)
        // 2 s keeps telemetry readable in real time; production default is 10 s.
        .telemetry_interval(Duration::from_secs(2))
        .build()
        .context("failed to build buffer config")?;
    let manager = Arc::new(BufferManager::new(config));
    manager.start_telemetry(LogTelemetry::new());

    let estimator = Arc::new(RollingSizeEstimator::new());
    let producing = Arc::new(AtomicBool::new(true));

    let streams: Vec<StreamDescriptor> = ["users", "orders", "events"]
        .into_iter()
        .map(|name| StreamDescriptor::new("public", name))
        .collect();

    // -- Producers: one per stream, sharing the estimator --
    let mut producers = Vec::new();
    for (index, descriptor) in streams.iter().cloned().enumerate() {
        let manager = Arc::clone(&manager);
        let estimator = Arc::clone(&estimator);
        let span = tracing::info_span!("producer", stream = %descriptor);
        producers.push(tokio::spawn(
            async move {
                let mut generator = RecordGenerator::new(Some(index as u64));
                for i in 1..=RECORDS_PER_STREAM {
                    manager
                        .enqueue()
                        .add_record(&descriptor, generator.record(), estimator.as_ref())
                        .await?;
                    if i % CHECKPOINT_EVERY == 0 {
                        manager
                            .enqueue()
                            .add_record(&descriptor, generator.state(), estimator.as_ref())
                            .await?;
                    }
                }
                log::info!("producer.finished: stream={descriptor} records={RECORDS_PER_STREAM}");
                Ok::<(), BufferError>(())
            }
            .instrument(span),
        ));
    }

    // -- Upload workers: one per stream, draining until producers finish --
    let mut workers = Vec::new();
    for descriptor in streams.iter().cloned() {
        let manager = Arc::clone(&manager);
        let producing = Arc::clone(&producing);
        let span = tracing::info_span!("upload_worker", stream = %descriptor);
        workers.push(tokio::spawn(
            async move {
                let mut flushed = 0u64;
                loop {
                    let mut batch = match manager.dequeue().take(&descriptor, BATCH_TARGET_BYTES).await
                    {
                        Ok(batch) => batch,
                        // The producer has not created this queue yet.
                        Err(BufferError::UnknownStream { .. }) => {
                            tokio::time::sleep(Duration::from_millis(5)).await;
                            continue;
                        }
                        Err(error) => return Err(error),
                    };
                    if batch.is_empty() {
                        if producing.load(Ordering::Acquire) {
                            continue;
                        }
                        break;
                    }
                    let records = batch.messages()?.count();
                    flushed += records as u64;
                    log::info!(
                        "upload.batch.flushed: stream={descriptor} records={records} bytes={}",
                        batch.size_bytes()
                    );
                    batch.close();
                }
                log::info!("upload.finished: stream={descriptor} total_records={flushed}");
                Ok(())
            }
            .instrument(span),
        ));
    }

    let pipeline = async {
        for producer in producers {
            producer.await.context("producer task panicked")??;
        }
        // Let workers finish the remaining resident entries, then stop.
        producing.store(false, Ordering::Release);
        for worker in workers {
            worker.await.context("upload worker panicked")??;
        }
        anyhow::Ok(())
    };

    // Race the pipeline against CTRL+C.
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("main.shutdown: ctrl_c received");
        }
        result = pipeline => {
            result?;
        }
    }

    // Workers have drained (or the run was aborted); tear the fabric down.
    manager.shutdown();
    log::info!(
        "main.complete: resident_bytes={} outstanding_budget={}",
        manager.total_byte_size(),
        manager.allocated_bytes()
    );

    Ok(())
}
