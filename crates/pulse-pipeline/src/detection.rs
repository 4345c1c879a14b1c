//! Detection stage: turns ingested readings into anomaly alerts.
//!
//! Maintains per-sensor rolling statistics, scores each reading with the
//! injected density scorer and the statistical detector, and fuses the two
//! verdicts. Anomalous fused verdicts become alerts on the bus.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use pulse_bus::{EventHandler, HandlerError};
use pulse_detect::{detect, fuse, DensityScorer, DetectorConfig, RollingStats};
use pulse_types::{Alert, AnomalyType, EventEnvelope, EventPayload, Reading};
use serde_json::json;

use crate::{report_failure, EventPublisher, StageError};

const STAGE_ID: &str = "detection";

/// Bus handler for `reading_ingested` events.
pub struct DetectionStage {
    publisher: Arc<dyn EventPublisher>,
    scorer: Arc<dyn DensityScorer>,
    config: DetectorConfig,
    window_capacity: usize,
    min_samples: usize,
    /// Per-sensor rolling windows. Guarded by a std Mutex held only for
    /// brief map operations, never across an `.await` point.
    stats: Mutex<HashMap<String, RollingStats>>,
}

impl DetectionStage {
    /// Builds the stage with its collaborators injected.
    ///
    /// `window_capacity` bounds each sensor's rolling window;
    /// `min_samples` is the number of prior readings required before the
    /// detector scores a sensor (warmup readings only feed the window).
    pub fn new(
        publisher: Arc<dyn EventPublisher>,
        scorer: Arc<dyn DensityScorer>,
        config: DetectorConfig,
        window_capacity: usize,
        min_samples: usize,
    ) -> Self {
        Self {
            publisher,
            scorer,
            config,
            window_capacity,
            min_samples,
            stats: Mutex::new(HashMap::new()),
        }
    }

    /// Baseline mean/std for a sensor, or `None` while it is warming up.
    ///
    /// The current reading is excluded: the baseline is computed before the
    /// value is pushed into the window.
    fn baseline(&self, sensor_id: &str) -> Option<(f64, f64)> {
        let stats = self.stats.lock().expect("rolling stats poisoned");
        let window = stats.get(sensor_id)?;
        if window.len() < self.min_samples {
            return None;
        }
        Some((window.mean()?, window.population_std()?))
    }

    fn push_value(&self, sensor_id: &str, value: f64) {
        let mut stats = self.stats.lock().expect("rolling stats poisoned");
        stats
            .entry(sensor_id.to_string())
            .or_insert_with(|| RollingStats::new(self.window_capacity))
            .push(value);
    }
}

#[async_trait::async_trait]
impl EventHandler for DetectionStage {
    fn id(&self) -> &str {
        STAGE_ID
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<(), HandlerError> {
        let EventPayload::ReadingIngested { reading } = &event.payload else {
            let error = StageError::UnexpectedPayload {
                stage_id: STAGE_ID,
                kind: event.kind,
            };
            report_failure(&*self.publisher, STAGE_ID, &error, event, false).await;
            return Err(HandlerError::with_source("detection stage failed", error));
        };

        let baseline = self.baseline(&reading.sensor_id);
        let stat = match baseline {
            None => {
                tracing::debug!(
                    sensor_id = %reading.sensor_id,
                    correlation_id = %event.correlation_id,
                    "sensor warming up; reading feeds the rolling window only"
                );
                self.push_value(&reading.sensor_id, reading.value);
                return Ok(());
            }
            Some((mean, std)) => match detect(reading.value, mean, std, &self.config) {
                Ok(stat) => stat,
                Err(detect_error) => {
                    let error = StageError::from(detect_error);
                    report_failure(&*self.publisher, STAGE_ID, &error, event, false).await;
                    return Err(HandlerError::with_source("detection stage failed", error));
                }
            },
        };
        self.push_value(&reading.sensor_id, reading.value);

        let density = self.scorer.score(reading);
        let fused = fuse(density.prediction, density.score, &stat);
        if !fused.is_anomaly {
            tracing::debug!(
                sensor_id = %reading.sensor_id,
                correlation_id = %event.correlation_id,
                label = %fused.label,
                "reading within expected bounds"
            );
            return Ok(());
        }

        let severity = severity_from_confidence(fused.confidence);
        let alert = match build_alert(reading, &fused.label, severity, fused.confidence, &density, &stat)
        {
            Ok(alert) => alert,
            Err(domain_error) => {
                let error = StageError::from(domain_error);
                report_failure(&*self.publisher, STAGE_ID, &error, event, false).await;
                return Err(HandlerError::with_source("detection stage failed", error));
            }
        };

        tracing::info!(
            sensor_id = %reading.sensor_id,
            correlation_id = %event.correlation_id,
            label = %fused.label,
            confidence = fused.confidence,
            severity,
            "anomaly detected"
        );

        let envelope = EventEnvelope::new(
            EventPayload::AnomalyDetected {
                alert,
                triggering_reading: reading.clone(),
                severity,
            },
            event.correlation_id,
        );
        if let Err(publish_error) = self.publisher.publish(envelope).await {
            let error = StageError::from(publish_error);
            report_failure(&*self.publisher, STAGE_ID, &error, event, true).await;
            return Err(HandlerError::with_source("detection stage failed", error));
        }
        Ok(())
    }
}

fn build_alert(
    reading: &Reading,
    label: &str,
    severity: u8,
    confidence: f64,
    density: &pulse_detect::DensityScore,
    stat: &pulse_detect::Detection,
) -> Result<Alert, pulse_types::DomainError> {
    Alert::new(
        reading.sensor_id.clone(),
        anomaly_type_from_label(label),
        severity,
        confidence,
        format!(
            "{} on sensor {} (value {:.3} {})",
            label, reading.sensor_id, reading.value, reading.unit
        ),
        json!({
            "label": label,
            "density_score": density.score,
            "statistical_label": stat.label,
            "statistical_confidence": stat.confidence,
            "fused_confidence": confidence,
        }),
    )
}

/// Maps the fused confidence onto the 1..=5 severity scale.
fn severity_from_confidence(confidence: f64) -> u8 {
    match confidence {
        c if c < 0.2 => 1,
        c if c < 0.4 => 2,
        c if c < 0.6 => 3,
        c if c < 0.8 => 4,
        _ => 5,
    }
}

/// Derives the alert category from the fused verdict label.
///
/// Density-only detections are pattern deviations; anything citing a
/// threshold is a threshold breach; combined-signal labels are treated as
/// spikes.
fn anomaly_type_from_label(label: &str) -> AnomalyType {
    if label.contains("threshold") {
        AnomalyType::ThresholdBreach
    } else if label.contains("isolation") {
        AnomalyType::PatternDeviation
    } else {
        AnomalyType::Spike
    }
}
