//! Ensemble fusion of a density-based detector verdict with the statistical
//! detector verdict.
//!
//! The density detector (isolation-forest style) reports an inlier/outlier
//! prediction plus a raw score; fusion weighs it against the statistical
//! verdict and produces one combined [`Detection`].

use pulse_types::Reading;

use crate::statistical::Detection;

/// Inlier/outlier prediction from the density detector.
///
/// Mirrors the isolation-forest convention of `1` (inlier) / `-1` (outlier).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DensityPrediction {
    /// The reading looks like the training distribution.
    Inlier,
    /// The reading is isolated from the training distribution.
    Outlier,
}

/// Output of one density-detector evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityScore {
    /// Inlier/outlier prediction.
    pub prediction: DensityPrediction,
    /// Raw anomaly score; magnitude feeds the fused confidence.
    pub score: f64,
}

/// Seam for the external density model.
///
/// Model training and the model registry live outside the pipeline; stages
/// receive a scorer by injection and never know which model backs it.
pub trait DensityScorer: Send + Sync {
    /// Name of the scorer, for logs and evidence records.
    fn name(&self) -> &str;

    /// Scores one reading.
    fn score(&self, reading: &Reading) -> DensityScore;
}

/// Scorer used when no density model is attached: everything is an inlier,
/// so detection falls through to the statistical verdict alone.
pub struct NullDensityScorer;

impl DensityScorer for NullDensityScorer {
    fn name(&self) -> &str {
        "null"
    }

    fn score(&self, _reading: &Reading) -> DensityScore {
        DensityScore {
            prediction: DensityPrediction::Inlier,
            score: 0.0,
        }
    }
}

/// Merges the density verdict with the statistical verdict.
///
/// - Both flag: fused confidence is `0.6 * (0.5 + |score| * 0.5) + 0.4 *
///   stat_confidence`, labelled `ensemble_if_and_statistical` regardless of
///   the statistical label.
/// - Only the density detector flags: its confidence is discounted by 0.8,
///   labelled `isolation_forest_anomaly`.
/// - Only the statistical detector flags: its confidence is discounted by
///   0.8 and the label is derived from the statistical label.
/// - Neither flags: not an anomaly, confidence 0.0, and the statistical
///   label passes through unchanged.
pub fn fuse(prediction: DensityPrediction, score: f64, stat: &Detection) -> Detection {
    let density_flags = prediction == DensityPrediction::Outlier;
    match (density_flags, stat.is_anomaly) {
        (true, true) => {
            let density_confidence = 0.5 + score.abs() * 0.5;
            Detection {
                is_anomaly: true,
                confidence: 0.6 * density_confidence + 0.4 * stat.confidence,
                label: "ensemble_if_and_statistical".to_string(),
            }
        }
        (true, false) => Detection {
            is_anomaly: true,
            confidence: (0.5 + score.abs() * 0.5) * 0.8,
            label: "isolation_forest_anomaly".to_string(),
        },
        (false, true) => Detection {
            is_anomaly: true,
            confidence: stat.confidence * 0.8,
            label: derive_statistical_label(&stat.label).to_string(),
        },
        (false, false) => Detection {
            is_anomaly: false,
            confidence: 0.0,
            label: stat.label.clone(),
        },
    }
}

/// Maps a statistical branch label onto the fused anomaly-type label.
fn derive_statistical_label(stat_label: &str) -> &'static str {
    if stat_label.contains("z_score") {
        "statistical_z_score_violation"
    } else if stat_label.contains("threshold") {
        "statistical_threshold_violation"
    } else {
        "unknown_anomaly_type"
    }
}
