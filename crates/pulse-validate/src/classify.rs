//! Confidence aggregation and tri-state classification.

use pulse_types::{CorrelationId, Verdict, VerdictStatus};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, RuleOutcome};

/// Classification thresholds for the aggregated confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// At or above this the verdict is credible.
    pub credible_threshold: f64,
    /// Below this the alert is a suspected false positive.
    pub false_positive_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            credible_threshold: 0.7,
            false_positive_threshold: 0.4,
        }
    }
}

impl ClassifierConfig {
    /// Validates the thresholds, returning them unchanged on success.
    ///
    /// # Errors
    ///
    /// Rejects non-finite thresholds, thresholds outside [0, 1], and a
    /// false-positive threshold at or above the credible threshold.
    pub fn validate(self) -> Result<Self, ConfigError> {
        for (field, value) in [
            ("credible_threshold", self.credible_threshold),
            ("false_positive_threshold", self.false_positive_threshold),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field, value });
            }
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { field, value });
            }
        }
        if self.false_positive_threshold >= self.credible_threshold {
            return Err(ConfigError::UnorderedThresholds {
                fp: self.false_positive_threshold,
                credible: self.credible_threshold,
            });
        }
        Ok(self)
    }
}

/// Sums the original confidence with every adjustment, clamps into [0, 1],
/// and maps the result onto a tri-state status.
///
/// Reasons are the rule-engine reasons followed by the historical-evaluator
/// reasons, preserving firing order. Pure and deterministic: fixed inputs
/// always yield an identical verdict.
pub fn classify(
    alert_confidence: f64,
    rule: &RuleOutcome,
    history: &RuleOutcome,
    config: &ClassifierConfig,
    correlation_id: CorrelationId,
) -> Verdict {
    let final_confidence =
        (alert_confidence + rule.adjustment + history.adjustment).clamp(0.0, 1.0);

    let status = if final_confidence >= config.credible_threshold {
        VerdictStatus::Credible
    } else if final_confidence < config.false_positive_threshold {
        VerdictStatus::FalsePositiveSuspected
    } else {
        VerdictStatus::Uncertain
    };

    let mut reasons = rule.reasons.clone();
    reasons.extend(history.reasons.iter().cloned());

    Verdict {
        status,
        final_confidence,
        reasons,
        correlation_id,
    }
}
