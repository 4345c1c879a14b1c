//! Event envelope, payload union, and routing-kind types for the bus.
//!
//! Payloads are a closed tagged union with one variant per event type, so
//! handlers pattern-match instead of probing dictionary keys. The routing
//! [`EventKind`] is always derived from the payload variant; the two can
//! never disagree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Alert, CorrelationId, Reading, VerdictStatus};

/// Routing key for bus subscriptions, one per event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A new sensor reading entered the pipeline.
    ReadingIngested,
    /// The detection stage raised an alert.
    AnomalyDetected,
    /// The validation stage produced a verdict.
    AnomalyValidated,
    /// A stage could not complete a traversal.
    ProcessingFailed,
}

impl EventKind {
    /// Returns the canonical string label for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadingIngested => "reading_ingested",
            Self::AnomalyDetected => "anomaly_detected",
            Self::AnomalyValidated => "anomaly_validated",
            Self::ProcessingFailed => "processing_failed",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown event-kind label.
#[derive(Debug, Error)]
#[error("unknown event kind: {0}")]
pub struct ParseEventKindError(pub String);

impl std::str::FromStr for EventKind {
    type Err = ParseEventKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reading_ingested" => Ok(Self::ReadingIngested),
            "anomaly_detected" => Ok(Self::AnomalyDetected),
            "anomaly_validated" => Ok(Self::AnomalyValidated),
            "processing_failed" => Ok(Self::ProcessingFailed),
            _ => Err(ParseEventKindError(s.to_string())),
        }
    }
}

/// Structured event payloads, one variant per event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A reading entered the pipeline from an ingestion collaborator.
    ReadingIngested {
        /// The ingested reading.
        reading: Reading,
    },
    /// The detection stage flagged a reading as anomalous.
    AnomalyDetected {
        /// The raised alert.
        alert: Alert,
        /// The reading that triggered it.
        triggering_reading: Reading,
        /// Severity copied from the alert for quick filtering.
        severity: u8,
    },
    /// The validation stage classified an alert.
    AnomalyValidated {
        /// The alert as originally raised (never mutated).
        original_alert: Alert,
        /// The reading that triggered the alert.
        triggering_reading: Reading,
        /// Tri-state classification.
        status: VerdictStatus,
        /// Aggregated confidence in [0, 1].
        final_confidence: f64,
        /// Audit trail in firing order.
        reasons: Vec<String>,
    },
    /// A stage could not complete; the traversal halted here.
    ProcessingFailed {
        /// Identifier of the stage that failed.
        failed_stage_id: String,
        /// Rendered error chain.
        error_message: String,
        /// The payload the stage was processing, serialized as-is.
        original_payload: serde_json::Value,
        /// True when the computation succeeded but publishing the result
        /// failed.
        is_publish_failure: bool,
    },
}

impl EventPayload {
    /// Returns the routing kind for this payload.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ReadingIngested { .. } => EventKind::ReadingIngested,
            Self::AnomalyDetected { .. } => EventKind::AnomalyDetected,
            Self::AnomalyValidated { .. } => EventKind::AnomalyValidated,
            Self::ProcessingFailed { .. } => EventKind::ProcessingFailed,
        }
    }
}

/// The immutable unit of communication on the bus.
///
/// Envelopes are constructed once by the publishing stage and handed to
/// subscribers by shared reference; nothing downstream can mutate them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Routing kind, derived from the payload variant.
    pub kind: EventKind,
    /// The structured payload.
    pub payload: EventPayload,
    /// Trace token threading one logical request through all stages.
    pub correlation_id: CorrelationId,
    /// When the envelope was published.
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    /// Wraps a payload in a new envelope stamped with the current time.
    pub fn new(payload: EventPayload, correlation_id: CorrelationId) -> Self {
        Self {
            kind: payload.kind(),
            payload,
            correlation_id,
            timestamp: Utc::now(),
        }
    }
}
