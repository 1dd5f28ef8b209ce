//! aqflow runtime - daily PM2.5 aggregation service
//!
//! Wires a reading source, the aggregation engine and the outbound publisher:
//! - Source task pushes raw payloads into a bounded channel
//! - Ingestion task decodes payloads and admits them through the engine
//! - Publisher task sends finalized daily averages to the queue backend
//!
//! Usage:
//!   cargo run --release --bin aqflow -- [--backend jsonl|sqlite]
//!
//! Environment variables:
//!   READINGS_INPUT_PATH - JSONL file to tail (default: stdin)
//!   AGGREGATES_OUTPUT_PATH - JSONL queue file (default: streams/aggregates/daily.jsonl)
//!   AQFLOW_DB_PATH - SQLite queue database (default: data/aqflow.db)
//!   OUTLIER_THRESHOLD - Outlier cutoff (default: 50)
//!   READY_THRESHOLD - Samples per day before finalizing (default: 10)
//!   RETENTION_DAYS - Days of window state to keep (default: 30, 0 disables)
//!   RUST_LOG - Logging level (optional, default: info)

use aqflow::emitter::{run_publisher, AggregatePublisher, ExponentialBackoff, QueuePublisher};
use aqflow::pipeline::{
    start_pipeline_ingestion, BackendType, DailyAggregationEngine, PipelineConfig,
};
use aqflow::source::ReadingSource;
use dotenv::dotenv;
use log::{error, info};
use std::time::Duration;
use tokio::sync::mpsc;

/// How long shutdown waits for blocking tasks, such as a stdin read with no input pending
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run());
    // Aborting the stdin source does not interrupt its blocking read
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::from_env()?;
    let backend = BackendType::parse_from_args();
    let source = ReadingSource::from_input_path(config.input_path.clone());

    info!("🚀 Starting aqflow daily aggregation");
    info!("   ├─ Source: {}", source.describe());
    info!("   ├─ Outlier threshold: {}", config.engine.outlier_threshold);
    info!("   ├─ Ready threshold: {} samples", config.engine.ready_threshold);
    info!("   ├─ Retention: {} days", config.engine.retention_days);
    info!("   ├─ Day keys: UTC");
    info!("   └─ Channel buffer: {} payloads", config.channel_buffer);

    let publisher = QueuePublisher::new(backend, &config)?;
    info!("📊 Backend: {}", publisher.backend_type());

    let engine = DailyAggregationEngine::shared(config.engine);

    let (payload_tx, payload_rx) = mpsc::channel::<String>(config.channel_buffer);
    let (aggregate_tx, aggregate_rx) = mpsc::unbounded_channel();

    let backoff = ExponentialBackoff::new(
        Duration::from_secs(config.publish_retry_initial_secs),
        Duration::from_secs(config.publish_retry_max_secs),
        config.publish_max_retries,
    );
    let publisher_handle =
        tokio::spawn(run_publisher(aggregate_rx, Box::new(publisher), backoff));

    let ingestion_handle = tokio::spawn(start_pipeline_ingestion(
        payload_rx,
        engine.clone(),
        aggregate_tx,
        config.status_interval_ms,
    ));

    let mut source_handle = tokio::spawn(async move {
        match source.run(payload_tx).await {
            Ok(count) => info!("Source finished ({} payloads)", count),
            Err(e) => error!("❌ Reading source failed: {}", e),
        }
    });

    info!("✅ Pipeline running");
    info!("🔄 Press CTRL+C to shutdown");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("⚠️  Received CTRL+C, shutting down..."),
                Err(err) => error!("❌ Failed to listen for CTRL+C: {}", err),
            }
            // Dropping the source closes the payload channel
            source_handle.abort();
        }
        _ = &mut source_handle => {
            info!("Reading source ended, draining pipeline...");
        }
    }

    let ingestion_stats = ingestion_handle.await?;
    let publisher_stats = publisher_handle.await?;

    let snapshot = {
        let guard = engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.snapshot()
    };

    info!(
        "✅ aqflow stopped: {} payloads, {} malformed, {} days finalized, {} published, {} lost, {} days still open",
        ingestion_stats.received,
        ingestion_stats.malformed,
        ingestion_stats.finalized,
        publisher_stats.published,
        publisher_stats.failed,
        snapshot.windows.iter().filter(|w| !w.finalized).count()
    );

    Ok(())
}
