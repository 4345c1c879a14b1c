//! Validation stage: turns anomaly alerts into classified verdicts.
//!
//! Runs the rule engine and the historical context evaluator over each
//! alert, aggregates the adjustments, and publishes the tri-state verdict.
//! A history-fetch failure degrades to "no historical context"; a publish
//! failure of the verdict itself is escalated with the
//! `is_publish_failure` marker.

use std::sync::Arc;

use pulse_bus::{EventHandler, HandlerError};
use pulse_types::{EventEnvelope, EventPayload};
use pulse_validate::{
    classify, evaluate_history, evaluate_rules, ClassifierConfig, HistoryConfig, HistorySource,
    RuleConfig, RuleOutcome,
};

use crate::{report_failure, EventPublisher, StageError};

const STAGE_ID: &str = "validation";

/// Bus handler for `anomaly_detected` events.
pub struct ValidationStage {
    publisher: Arc<dyn EventPublisher>,
    history: Arc<dyn HistorySource>,
    rule_config: RuleConfig,
    history_config: HistoryConfig,
    classifier_config: ClassifierConfig,
}

impl ValidationStage {
    /// Builds the stage with its collaborators injected.
    pub fn new(
        publisher: Arc<dyn EventPublisher>,
        history: Arc<dyn HistorySource>,
        rule_config: RuleConfig,
        history_config: HistoryConfig,
        classifier_config: ClassifierConfig,
    ) -> Self {
        Self {
            publisher,
            history,
            rule_config,
            history_config,
            classifier_config,
        }
    }
}

#[async_trait::async_trait]
impl EventHandler for ValidationStage {
    fn id(&self) -> &str {
        STAGE_ID
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<(), HandlerError> {
        let EventPayload::AnomalyDetected {
            alert,
            triggering_reading,
            ..
        } = &event.payload
        else {
            let error = StageError::UnexpectedPayload {
                stage_id: STAGE_ID,
                kind: event.kind,
            };
            report_failure(&*self.publisher, STAGE_ID, &error, event, false).await;
            return Err(HandlerError::with_source("validation stage failed", error));
        };

        let rule_outcome = evaluate_rules(alert, triggering_reading, &self.rule_config);

        // The only I/O-bound step in the pipeline. Failures degrade to a
        // zero adjustment rather than aborting validation.
        let history_outcome = match self
            .history
            .recent_readings(
                &alert.sensor_id,
                triggering_reading.timestamp,
                self.history_config.history_limit,
            )
            .await
        {
            Ok(window) => {
                evaluate_history(alert, triggering_reading, &window, &self.history_config)
            }
            Err(fetch_error) => {
                tracing::warn!(
                    sensor_id = %alert.sensor_id,
                    correlation_id = %event.correlation_id,
                    error = %fetch_error,
                    "history fetch failed; validating without historical context"
                );
                RuleOutcome::neutral("Historical context unavailable; validated without it.")
            }
        };

        let verdict = classify(
            alert.confidence,
            &rule_outcome,
            &history_outcome,
            &self.classifier_config,
            event.correlation_id,
        );

        tracing::info!(
            sensor_id = %alert.sensor_id,
            correlation_id = %event.correlation_id,
            status = %verdict.status,
            final_confidence = verdict.final_confidence,
            "anomaly validated"
        );

        let envelope = EventEnvelope::new(
            EventPayload::AnomalyValidated {
                original_alert: alert.clone(),
                triggering_reading: triggering_reading.clone(),
                status: verdict.status,
                final_confidence: verdict.final_confidence,
                reasons: verdict.reasons,
            },
            event.correlation_id,
        );
        if let Err(publish_error) = self.publisher.publish(envelope).await {
            // Computed correctly but could not announce it.
            let error = StageError::from(publish_error);
            report_failure(&*self.publisher, STAGE_ID, &error, event, true).await;
            return Err(HandlerError::with_source("validation stage failed", error));
        }
        Ok(())
    }
}
