//! Sigma-threshold statistical deviation detector.
//!
//! Scores one reading value against a rolling mean and standard deviation.
//! A value further than `sigma_threshold * std` from the mean is anomalous,
//! with confidence growing from `min_confidence` at the threshold boundary
//! towards 1.0 as the deviation grows.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when building a [`DetectorConfig`] from raw values.
///
/// Out-of-range values are rejected at construction, never silently clamped.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration field was NaN or infinite.
    #[error("detector config field '{field}' must be finite, got {value}")]
    NonFinite {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// `sigma_threshold` must be strictly positive.
    #[error("sigma_threshold must be > 0, got {0}")]
    NonPositiveSigma(f64),
    /// `min_confidence` must lie within [0, 1].
    #[error("min_confidence must be within [0, 1], got {0}")]
    MinConfidenceOutOfRange(f64),
    /// `tolerance` must be non-negative.
    #[error("tolerance must be >= 0, got {0}")]
    NegativeTolerance(f64),
}

/// Tunable thresholds for the statistical detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Multiple of the standard deviation beyond which a value is anomalous.
    pub sigma_threshold: f64,
    /// Confidence assigned exactly at the threshold boundary.
    pub min_confidence: f64,
    /// Values within this distance are treated as equal (zero-std handling).
    pub tolerance: f64,
}

impl DetectorConfig {
    /// Builds a validated config.
    ///
    /// # Errors
    ///
    /// Rejects non-finite fields, `sigma_threshold <= 0`, `min_confidence`
    /// outside [0, 1], and negative `tolerance`.
    pub fn new(sigma_threshold: f64, min_confidence: f64, tolerance: f64) -> Result<Self, ConfigError> {
        for (field, value) in [
            ("sigma_threshold", sigma_threshold),
            ("min_confidence", min_confidence),
            ("tolerance", tolerance),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field, value });
            }
        }
        if sigma_threshold <= 0.0 {
            return Err(ConfigError::NonPositiveSigma(sigma_threshold));
        }
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(ConfigError::MinConfidenceOutOfRange(min_confidence));
        }
        if tolerance < 0.0 {
            return Err(ConfigError::NegativeTolerance(tolerance));
        }
        Ok(Self {
            sigma_threshold,
            min_confidence,
            tolerance,
        })
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sigma_threshold: 3.0,
            min_confidence: 0.5,
            tolerance: 1e-9,
        }
    }
}

/// Errors raised by [`detect`] for invalid numeric inputs.
#[derive(Debug, Error)]
pub enum DetectError {
    /// An input was NaN or infinite.
    #[error("non-finite detector input '{field}': {value}")]
    NonFinite {
        /// Name of the offending input.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// The standard deviation was negative.
    #[error("negative standard deviation: {0}")]
    NegativeStd(f64),
    /// The supplied configuration was itself invalid.
    #[error("invalid detector config: {0}")]
    Config(#[from] ConfigError),
}

/// One detector verdict: flag, confidence in [0, 1], and a label describing
/// which branch produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Whether the value was flagged as anomalous.
    pub is_anomaly: bool,
    /// Detector confidence in [0, 1]; 0.0 for normal verdicts.
    pub confidence: f64,
    /// Branch label (e.g. `statistical_threshold_breach`, `normal`).
    pub label: String,
}

impl Detection {
    fn normal(label: &str) -> Self {
        Self {
            is_anomaly: false,
            confidence: 0.0,
            label: label.to_string(),
        }
    }

    fn anomaly(confidence: f64, label: &str) -> Self {
        Self {
            is_anomaly: true,
            confidence,
            label: label.to_string(),
        }
    }
}

/// Scores `value` against a rolling `mean` and `std`.
///
/// With `threshold = sigma_threshold * std`:
///
/// - `std` within `tolerance` of zero degenerates to an equality check:
///   `value ≈ mean` is normal, anything else is a full-confidence anomaly.
/// - `|value - mean| <= threshold` is normal with confidence 0.
/// - Otherwise the value is anomalous with confidence
///   `min_confidence + (1 - min_confidence) * (1 - threshold / deviation)`,
///   which equals `min_confidence` just past the boundary and approaches
///   1.0 as the deviation grows.
///
/// # Errors
///
/// Rejects NaN/infinite inputs, `std < 0`, and an out-of-range `config`
/// (`sigma_threshold <= 0`, `min_confidence` outside [0, 1], negative
/// `tolerance`). For all finite inputs with `std >= 0` and a valid config
/// the function never fails.
pub fn detect(
    value: f64,
    mean: f64,
    std: f64,
    config: &DetectorConfig,
) -> Result<Detection, DetectError> {
    for (field, input) in [("value", value), ("mean", mean), ("std", std)] {
        if !input.is_finite() {
            return Err(DetectError::NonFinite { field, value: input });
        }
    }
    if std < 0.0 {
        return Err(DetectError::NegativeStd(std));
    }
    // Struct-literal and deserialized configs bypass `DetectorConfig::new`;
    // re-validate the thresholds before trusting them.
    DetectorConfig::new(config.sigma_threshold, config.min_confidence, config.tolerance)?;

    // Degenerate distribution: every historical value was (nearly) identical.
    if std <= config.tolerance {
        if (value - mean).abs() <= config.tolerance {
            return Ok(Detection::normal("normal_zero_std"));
        }
        return Ok(Detection::anomaly(1.0, "statistical_threshold_breach_zero_std"));
    }

    let threshold = config.sigma_threshold * std;
    let deviation = (value - mean).abs();
    if deviation <= threshold {
        return Ok(Detection::normal("normal"));
    }

    let confidence =
        config.min_confidence + (1.0 - config.min_confidence) * (1.0 - threshold / deviation);
    Ok(Detection::anomaly(confidence, "statistical_threshold_breach"))
}
