//! Historical context evaluator.
//!
//! Analyzes a bounded window of readings strictly before the triggering
//! reading (most-recent-first) for two signals: local stability of the
//! recent baseline, and a recurring-anomaly pattern across adjacent
//! readings. Each fired check contributes a signed adjustment; reason order
//! is stability first, recurrence second.

use pulse_types::{Alert, Reading};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, RuleOutcome};

/// Thresholds and adjustments for the historical context evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of most-recent readings used for the stability check.
    pub stability_window: usize,
    /// Relative std bound: the baseline is stable when
    /// `std < stability_factor * |mean| + epsilon`.
    pub stability_factor: f64,
    /// Absolute std floor below which the baseline is always stable.
    pub min_std_floor: f64,
    /// Relative change between adjacent readings counted as an anomaly pair.
    pub diff_factor: f64,
    /// Fraction of anomalous pairs above which the recurring check fires.
    pub threshold_pct: f64,
    /// Maximum number of historical readings fetched per evaluation.
    pub history_limit: usize,
    /// Guard against division by zero and exact-zero std comparisons.
    pub epsilon: f64,
    /// Adjustment when the current value jumps sharply off a stable
    /// baseline. Positive by default: on a flat baseline a large jump
    /// corroborates the anomaly.
    pub jump_adjustment: f64,
    /// Adjustment when the current value deviates only mildly from a stable
    /// baseline.
    pub minor_deviation_adjustment: f64,
    /// Adjustment when the recent baseline is volatile.
    pub volatile_adjustment: f64,
    /// Adjustment when a recurring anomaly pattern is detected.
    pub recurring_adjustment: f64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            stability_window: 5,
            stability_factor: 0.1,
            min_std_floor: 0.5,
            diff_factor: 0.3,
            threshold_pct: 0.25,
            history_limit: 20,
            epsilon: 1e-9,
            jump_adjustment: 0.10,
            minor_deviation_adjustment: -0.05,
            volatile_adjustment: -0.03,
            recurring_adjustment: -0.15,
        }
    }
}

impl HistoryConfig {
    /// Validates the config, returning it unchanged on success.
    ///
    /// # Errors
    ///
    /// Rejects non-finite fields, `threshold_pct` outside [0, 1],
    /// non-positive `diff_factor`/`epsilon`, `stability_window < 2`, and
    /// `history_limit < 1`.
    pub fn validate(self) -> Result<Self, ConfigError> {
        for (field, value) in [
            ("stability_factor", self.stability_factor),
            ("min_std_floor", self.min_std_floor),
            ("diff_factor", self.diff_factor),
            ("threshold_pct", self.threshold_pct),
            ("epsilon", self.epsilon),
            ("jump_adjustment", self.jump_adjustment),
            ("minor_deviation_adjustment", self.minor_deviation_adjustment),
            ("volatile_adjustment", self.volatile_adjustment),
            ("recurring_adjustment", self.recurring_adjustment),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field, value });
            }
        }
        if !(0.0..=1.0).contains(&self.threshold_pct) {
            return Err(ConfigError::OutOfUnitRange {
                field: "threshold_pct",
                value: self.threshold_pct,
            });
        }
        for (field, value) in [("diff_factor", self.diff_factor), ("epsilon", self.epsilon)] {
            if value <= 0.0 {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        if self.stability_window < 2 {
            return Err(ConfigError::CountTooSmall {
                field: "stability_window",
                min: 2,
                value: self.stability_window,
            });
        }
        if self.history_limit < 1 {
            return Err(ConfigError::CountTooSmall {
                field: "history_limit",
                min: 1,
                value: self.history_limit,
            });
        }
        Ok(self)
    }
}

/// Evaluates the historical context of one alert.
///
/// `window` holds readings strictly before `reading.timestamp`,
/// most-recent-first, bounded by `config.history_limit`. An empty window
/// yields a zero adjustment with an explanatory reason; this function never
/// fails.
pub fn evaluate_history(
    alert: &Alert,
    reading: &Reading,
    window: &[Reading],
    config: &HistoryConfig,
) -> RuleOutcome {
    if window.is_empty() {
        return RuleOutcome::neutral("No historical readings available for context.");
    }

    tracing::debug!(
        sensor_id = %alert.sensor_id,
        anomaly_type = %alert.anomaly_type,
        window_len = window.len(),
        "evaluating historical context"
    );

    let mut adjustment = 0.0;
    let mut reasons = Vec::new();

    if let Some((delta, reason)) = stability_check(reading, window, config) {
        adjustment += delta;
        reasons.push(reason);
    }
    if let Some((delta, reason)) = recurring_check(window, config) {
        adjustment += delta;
        reasons.push(reason);
    }

    if reasons.is_empty() {
        return RuleOutcome::neutral("No significant historical patterns.");
    }
    RuleOutcome { adjustment, reasons }
}

/// Recent-stability check over the most recent `stability_window` values.
///
/// Fires one of three branches once enough history exists: a sharp jump off
/// a stable baseline, a minor deviation from a stable baseline, or a
/// volatile baseline.
fn stability_check(
    reading: &Reading,
    window: &[Reading],
    config: &HistoryConfig,
) -> Option<(f64, String)> {
    if window.len() < config.stability_window {
        return None;
    }

    let recent: Vec<f64> = window[..config.stability_window]
        .iter()
        .map(|r| r.value)
        .collect();
    let n = recent.len() as f64;
    let mean = recent.iter().sum::<f64>() / n;
    let std = (recent.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();

    let stable =
        std < config.stability_factor * mean.abs() + config.epsilon || std < config.min_std_floor;
    if !stable {
        return Some((
            config.volatile_adjustment,
            format!(
                "Volatile baseline (mean {:.3}, std {:.3}) reduces certainty in the anomaly.",
                mean, std
            ),
        ));
    }

    if (reading.value - mean).abs() > 3.0 * (std + config.epsilon) {
        return Some((
            config.jump_adjustment,
            format!(
                "Sharp jump from stable baseline (mean {:.3}, std {:.3}).",
                mean, std
            ),
        ));
    }
    Some((
        config.minor_deviation_adjustment,
        format!(
            "Minor deviation from stable baseline (mean {:.3}, std {:.3}).",
            mean, std
        ),
    ))
}

/// Recurring-anomaly check over adjacent window pairs.
///
/// Counts adjacent (newer, older) pairs whose relative change exceeds
/// `diff_factor`; fires when the anomalous fraction exceeds
/// `threshold_pct`.
fn recurring_check(window: &[Reading], config: &HistoryConfig) -> Option<(f64, String)> {
    if window.len() < 2 {
        return None;
    }

    let mut exceeding = 0usize;
    for pair in window.windows(2) {
        let newer = pair[0].value;
        let older = pair[1].value;
        let relative = (newer - older).abs() / (older.abs() + config.epsilon);
        if relative > config.diff_factor {
            exceeding += 1;
        }
    }

    let pairs = window.len() - 1;
    let ratio = exceeding as f64 / pairs as f64;
    if ratio <= config.threshold_pct {
        return None;
    }
    Some((
        config.recurring_adjustment,
        format!(
            "Recurring anomaly pattern detected ({exceeding} of {pairs} adjacent changes exceed the noise threshold)."
        ),
    ))
}
