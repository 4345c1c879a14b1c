//! Shared types, error definitions, and constants for the Pulse platform.
//!
//! This crate provides the foundational types used across all Pulse crates:
//! sensor readings, maintenance alerts, validation verdicts, the event
//! payload union carried on the bus, and domain-specific error types (via
//! `thiserror`).
//!
//! No crate in the workspace depends on anything *except* `pulse-types` for
//! cross-cutting type definitions. This keeps the dependency graph clean and
//! prevents circular dependencies.

mod event;

pub use event::{EventEnvelope, EventKind, EventPayload, ParseEventKindError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised when constructing domain entities from raw values.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Severity must be in the range 1..=5.
    #[error("severity {0} out of range (expected 1..=5)")]
    SeverityOutOfRange(u8),
    /// A numeric field that must be finite was NaN or infinite.
    #[error("non-finite value for field '{0}'")]
    NonFinite(&'static str),
}

/// The kind of sensor that produced a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    /// Temperature sensor (degrees Celsius).
    Temperature,
    /// Pressure sensor (kilopascals).
    Pressure,
    /// Vibration sensor (mm/s RMS).
    Vibration,
    /// Flow sensor (litres/minute).
    Flow,
    /// Anything else; excluded from type-specific rule checks.
    Other,
}

impl SensorType {
    /// Returns the canonical string label for this sensor type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Pressure => "pressure",
            Self::Vibration => "vibration",
            Self::Flow => "flow",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category assigned by the detection stage to an anomalous reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    /// Sudden short-lived excursion from the recent baseline.
    Spike,
    /// Value crossed a statistical sigma threshold.
    ThresholdBreach,
    /// Slow sustained departure from the baseline.
    Drift,
    /// Shape of the recent series departs from the learned pattern.
    PatternDeviation,
}

impl AnomalyType {
    /// Returns the canonical string label for this anomaly type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spike => "spike",
            Self::ThresholdBreach => "threshold_breach",
            Self::Drift => "drift",
            Self::PatternDeviation => "pattern_deviation",
        }
    }
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single sensor reading as ingested from the field.
///
/// Readings are produced once by the ingestion collaborator and consumed by
/// the detection stage; they are never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Stable identifier of the sensor that produced the value.
    pub sensor_id: String,
    /// When the reading was taken.
    pub timestamp: DateTime<Utc>,
    /// The measured value, in `unit`.
    pub value: f64,
    /// Data-quality score in [0, 1]; clamped at construction.
    pub quality: f64,
    /// Unit of measure (e.g. "celsius", "kPa").
    pub unit: String,
    /// Sensor category; drives type-specific validation rules.
    pub sensor_type: SensorType,
}

impl Reading {
    /// Builds a reading, rejecting non-finite values and clamping `quality`
    /// into [0, 1].
    pub fn new(
        sensor_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        value: f64,
        quality: f64,
        unit: impl Into<String>,
        sensor_type: SensorType,
    ) -> Result<Self, DomainError> {
        if !value.is_finite() {
            return Err(DomainError::NonFinite("value"));
        }
        if !quality.is_finite() {
            return Err(DomainError::NonFinite("quality"));
        }
        Ok(Self {
            sensor_id: sensor_id.into(),
            timestamp,
            value,
            quality: quality.clamp(0.0, 1.0),
            unit: unit.into(),
            sensor_type,
        })
    }
}

/// A maintenance alert raised by the detection stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Sensor the alert concerns.
    pub sensor_id: String,
    /// Anomaly category.
    pub anomaly_type: AnomalyType,
    /// Severity in 1..=5 (5 = most severe).
    pub severity: u8,
    /// Detector confidence in [0, 1]; clamped at construction.
    pub confidence: f64,
    /// Human-readable summary of the anomaly.
    pub description: String,
    /// Structured supporting evidence (detector scores, thresholds, ...).
    pub evidence: serde_json::Value,
}

impl Alert {
    /// Builds an alert. Severity outside 1..=5 is a construction error;
    /// confidence is clamped into [0, 1] after a finiteness check.
    pub fn new(
        sensor_id: impl Into<String>,
        anomaly_type: AnomalyType,
        severity: u8,
        confidence: f64,
        description: impl Into<String>,
        evidence: serde_json::Value,
    ) -> Result<Self, DomainError> {
        if !(1..=5).contains(&severity) {
            return Err(DomainError::SeverityOutOfRange(severity));
        }
        if !confidence.is_finite() {
            return Err(DomainError::NonFinite("confidence"));
        }
        Ok(Self {
            sensor_id: sensor_id.into(),
            anomaly_type,
            severity,
            confidence: confidence.clamp(0.0, 1.0),
            description: description.into(),
            evidence,
        })
    }
}

/// Tri-state outcome of the validation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    /// The alert survived validation and should be acted on.
    Credible,
    /// The evidence points to a false positive.
    FalsePositiveSuspected,
    /// Neither threshold reached; further investigation needed.
    Uncertain,
}

impl VerdictStatus {
    /// Returns the canonical string label for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Credible => "credible",
            Self::FalsePositiveSuspected => "false_positive_suspected",
            Self::Uncertain => "uncertain",
        }
    }
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The final classified, confidence-scored outcome of validating one alert.
///
/// Verdicts are always built fresh; the originating [`Alert`] is never
/// mutated by the validation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Classification of the alert after all adjustments.
    pub status: VerdictStatus,
    /// Aggregated confidence, clamped into [0, 1].
    pub final_confidence: f64,
    /// Audit trail: one entry per rule or historical check that fired, in
    /// firing order.
    pub reasons: Vec<String>,
    /// Trace token threading this alert through the pipeline.
    pub correlation_id: CorrelationId,
}

/// Opaque token threading one logical request through all pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generates a fresh random correlation ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests;
