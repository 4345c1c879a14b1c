//! Pulse node binary — the main entry point for the Pulse pipeline.
//!
//! Loads configuration, initializes structured logging, wires the pipeline,
//! then ingests NDJSON sensor readings from stdin: one [`Reading`] per
//! line, each published as a `reading_ingested` event. Verdicts and
//! processing failures are printed to stdout as JSON lines.

mod config;

use std::sync::Arc;

use pulse_bus::{EventHandler, HandlerError};
use pulse_pipeline::PipelineBuilder;
use pulse_types::{CorrelationId, EventEnvelope, EventKind, EventPayload, Reading};
use pulse_validate::MemoryHistory;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

/// Prints every envelope it receives as one JSON line on stdout.
///
/// Stands in for the external forecasting/notification consumers.
struct StdoutConsumer;

#[async_trait::async_trait]
impl EventHandler for StdoutConsumer {
    fn id(&self) -> &str {
        "stdout-consumer"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<(), HandlerError> {
        let line = serde_json::to_string(event)
            .map_err(|e| HandlerError::with_source("failed to serialize envelope", e))?;
        println!("{line}");
        Ok(())
    }
}

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("PULSE_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

/// Parses one NDJSON line into a validated reading.
fn parse_reading(line: &str) -> Result<Reading, String> {
    let raw: Reading = serde_json::from_str(line).map_err(|e| e.to_string())?;
    // Re-run construction so externally supplied values get the same
    // validation and clamping as internally built readings.
    Reading::new(
        raw.sensor_id,
        raw.timestamp,
        raw.value,
        raw.quality,
        raw.unit,
        raw.sensor_type,
    )
    .map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let config_path = resolved_config_path.as_deref().unwrap_or("config.toml");

    // Load configuration
    let (config, config_origin) = config::load_config(config_path)
        .expect("failed to load configuration — the node cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match config_origin {
        config::ConfigOrigin::File => {
            tracing::info!(source = config_source, path = config_path, "configuration loaded");
        }
        config::ConfigOrigin::Defaults => {
            tracing::info!(
                source = config_source,
                path = config_path,
                "config file not found, using defaults"
            );
        }
    }

    let history = Arc::new(MemoryHistory::new());
    let pipeline = PipelineBuilder::new(history.clone())
        .detector_config(config.detector)
        .rule_config(config.rules)
        .history_config(config.history)
        .classifier_config(config.classifier)
        .rolling_window(config.pipeline.window_capacity, config.pipeline.min_samples)
        .build()
        .expect("failed to build pipeline — configuration rejected");

    let consumer: Arc<dyn EventHandler> = Arc::new(StdoutConsumer);
    pipeline.bus.subscribe(EventKind::AnomalyValidated, consumer.clone());
    pipeline.bus.subscribe(EventKind::ProcessingFailed, consumer);

    tracing::info!("reading NDJSON sensor readings from stdin");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut ingested: u64 = 0;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "failed to read stdin; shutting down");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let reading = match parse_reading(&line) {
            Ok(reading) => reading,
            Err(message) => {
                tracing::warn!(error = %message, "skipping malformed reading line");
                continue;
            }
        };

        // Record first so the validation stage's history fetch (strictly
        // before the reading's timestamp) can see prior readings.
        history.record(reading.clone());
        pipeline
            .bus
            .publish(EventEnvelope::new(
                EventPayload::ReadingIngested { reading },
                CorrelationId::new(),
            ))
            .await;
        ingested += 1;
    }

    tracing::info!(count = ingested, "stdin closed; node exiting");
}
