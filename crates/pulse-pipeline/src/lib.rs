//! Pipeline stages and composition root.
//!
//! Wires the detection and validation stages onto the event bus: an
//! external producer publishes `reading_ingested`, the detection stage
//! fuses a density verdict with the statistical detector and publishes
//! `anomaly_detected`, the validation stage runs the rule engine and
//! historical evaluator and publishes `anomaly_validated`. A stage that
//! cannot complete emits `processing_failed` and halts that traversal.
//!
//! All collaborators (history source, density scorer, configs) are passed
//! in explicitly through [`PipelineBuilder`]; there are no global
//! registries.

mod builder;
mod detection;
mod validation;

pub use builder::{BuildError, Pipeline, PipelineBuilder};
pub use detection::DetectionStage;
pub use validation::ValidationStage;

use pulse_bus::EventBus;
use pulse_types::{EventEnvelope, EventKind};
use thiserror::Error;

/// Error raised when an envelope could not be handed to downstream
/// consumers.
#[derive(Debug, Error)]
#[error("failed to publish {kind}: {message}")]
pub struct PublishError {
    /// Kind of the envelope that could not be published.
    pub kind: EventKind,
    /// Rendered cause.
    pub message: String,
}

/// Outbound seam for stages.
///
/// Stages publish downstream envelopes through this trait rather than a
/// concrete bus, so tests and alternative transports can be injected. The
/// in-process [`EventBus`] never fails to accept an envelope; transports
/// that can fail surface a [`PublishError`], which stages escalate as a
/// `processing_failed` event with the `is_publish_failure` marker.
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    /// Hands one envelope to downstream consumers.
    async fn publish(&self, event: EventEnvelope) -> Result<(), PublishError>;
}

#[async_trait::async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), PublishError> {
        EventBus::publish(self, event).await;
        Ok(())
    }
}

/// Failure modes of a pipeline stage.
#[derive(Debug, Error)]
pub enum StageError {
    /// The detector rejected its numeric inputs.
    #[error("detector rejected input: {0}")]
    Detector(#[from] pulse_detect::DetectError),
    /// A stage received an envelope whose payload it cannot process.
    #[error("stage '{stage_id}' received unexpected payload for event '{kind}'")]
    UnexpectedPayload {
        /// The receiving stage.
        stage_id: &'static str,
        /// Kind of the offending envelope.
        kind: EventKind,
    },
    /// A computed result could not be announced downstream.
    #[error(transparent)]
    Publish(#[from] PublishError),
    /// Building a domain entity from computed values failed.
    #[error("invalid computed entity: {0}")]
    Domain(#[from] pulse_types::DomainError),
}

/// Emits a `processing_failed` event for a stage that could not complete.
///
/// Best-effort: if the failure event itself cannot be published there is
/// nothing left to announce on, so the error is logged and dropped.
pub(crate) async fn report_failure(
    publisher: &dyn EventPublisher,
    stage_id: &'static str,
    error: &StageError,
    original: &EventEnvelope,
    is_publish_failure: bool,
) {
    let payload = pulse_types::EventPayload::ProcessingFailed {
        failed_stage_id: stage_id.to_string(),
        error_message: error.to_string(),
        original_payload: serde_json::to_value(&original.payload)
            .unwrap_or(serde_json::Value::Null),
        is_publish_failure,
    };
    let envelope = EventEnvelope::new(payload, original.correlation_id);
    if let Err(publish_error) = publisher.publish(envelope).await {
        tracing::error!(
            stage = stage_id,
            correlation_id = %original.correlation_id,
            error = %publish_error,
            "failed to emit processing_failed event"
        );
    }
}
