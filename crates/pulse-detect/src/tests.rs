//! Unit tests for the statistical detector, ensemble fusion, and rolling
//! statistics.

use crate::{
    detect, fuse, DensityPrediction, Detection, DetectorConfig, DetectError, RollingStats,
};

const EPS: f64 = 1e-9;

fn config() -> DetectorConfig {
    DetectorConfig::default()
}

fn stat(is_anomaly: bool, confidence: f64, label: &str) -> Detection {
    Detection {
        is_anomaly,
        confidence,
        label: label.to_string(),
    }
}

// ── detect: fixtures ─────────────────────────────────────────────────

#[test]
fn within_threshold_is_normal() {
    let d = detect(105.0, 100.0, 5.0, &config()).expect("finite inputs");
    assert!(!d.is_anomaly);
    assert_eq!(d.confidence, 0.0);
    assert_eq!(d.label, "normal");
}

#[test]
fn deviation_twenty_gives_confidence_0_625() {
    let d = detect(120.0, 100.0, 5.0, &config()).expect("finite inputs");
    assert!(d.is_anomaly);
    assert!((d.confidence - 0.625).abs() < EPS);
    assert_eq!(d.label, "statistical_threshold_breach");
}

#[test]
fn deviation_fifty_gives_confidence_0_85() {
    let d = detect(150.0, 100.0, 5.0, &config()).expect("finite inputs");
    assert!(d.is_anomaly);
    assert!((d.confidence - 0.85).abs() < EPS);
}

#[test]
fn confidence_approaches_min_confidence_at_boundary() {
    // deviation = 15.001, threshold = 15 -> confidence ≈ 0.500033
    let d = detect(115.001, 100.0, 5.0, &config()).expect("finite inputs");
    assert!(d.is_anomaly);
    assert!((d.confidence - 0.500033).abs() < 1e-5);
}

#[test]
fn zero_std_equal_value_is_normal() {
    let d = detect(100.0, 100.0, 0.0, &config()).expect("finite inputs");
    assert!(!d.is_anomaly);
    assert_eq!(d.confidence, 0.0);
    assert_eq!(d.label, "normal_zero_std");
}

#[test]
fn zero_std_deviating_value_is_full_confidence_anomaly() {
    let d = detect(101.0, 100.0, 0.0, &config()).expect("finite inputs");
    assert!(d.is_anomaly);
    assert_eq!(d.confidence, 1.0);
    assert_eq!(d.label, "statistical_threshold_breach_zero_std");
}

// ── detect: validation ───────────────────────────────────────────────

#[test]
fn non_finite_inputs_are_rejected() {
    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        assert!(matches!(
            detect(bad, 100.0, 5.0, &config()),
            Err(DetectError::NonFinite { field: "value", .. })
        ));
        assert!(matches!(
            detect(100.0, bad, 5.0, &config()),
            Err(DetectError::NonFinite { field: "mean", .. })
        ));
        assert!(matches!(
            detect(100.0, 100.0, bad, &config()),
            Err(DetectError::NonFinite { field: "std", .. })
        ));
    }
}

#[test]
fn negative_std_is_rejected() {
    assert!(matches!(
        detect(100.0, 100.0, -1.0, &config()),
        Err(DetectError::NegativeStd(_))
    ));
}

#[test]
fn detect_never_fails_on_finite_inputs_with_nonnegative_std() {
    let values = [-1e6, -3.5, 0.0, 0.1, 42.0, 1e6];
    let stds = [0.0, 1e-12, 0.5, 10.0, 1e4];
    for &value in &values {
        for &mean in &values {
            for &std in &stds {
                let d = detect(value, mean, std, &config()).expect("must not fail");
                assert!((0.0..=1.0).contains(&d.confidence));
            }
        }
    }
}

#[test]
fn detector_config_rejects_out_of_range_values() {
    assert!(DetectorConfig::new(0.0, 0.5, 1e-9).is_err());
    assert!(DetectorConfig::new(-1.0, 0.5, 1e-9).is_err());
    assert!(DetectorConfig::new(3.0, 1.5, 1e-9).is_err());
    assert!(DetectorConfig::new(3.0, -0.1, 1e-9).is_err());
    assert!(DetectorConfig::new(3.0, 0.5, -1e-9).is_err());
    assert!(DetectorConfig::new(f64::NAN, 0.5, 1e-9).is_err());
    assert!(DetectorConfig::new(3.0, 0.5, 1e-9).is_ok());
}

#[test]
fn detect_rejects_config_that_skipped_validation() {
    // Struct-literal and deserialized configs never went through
    // `DetectorConfig::new`; a negative sigma would otherwise push
    // confidence past 1.0.
    let negative_sigma = DetectorConfig {
        sigma_threshold: -3.0,
        ..DetectorConfig::default()
    };
    assert!(matches!(
        detect(120.0, 100.0, 5.0, &negative_sigma),
        Err(DetectError::Config(_))
    ));

    let floor_above_one = DetectorConfig {
        min_confidence: 1.5,
        ..DetectorConfig::default()
    };
    assert!(matches!(
        detect(120.0, 100.0, 5.0, &floor_above_one),
        Err(DetectError::Config(_))
    ));

    let negative_tolerance = DetectorConfig {
        tolerance: -1e-9,
        ..DetectorConfig::default()
    };
    assert!(matches!(
        detect(120.0, 100.0, 5.0, &negative_tolerance),
        Err(DetectError::Config(_))
    ));
}

// ── fuse ─────────────────────────────────────────────────────────────

#[test]
fn both_detectors_anomalous_blends_confidences() {
    let fused = fuse(
        DensityPrediction::Outlier,
        -0.2,
        &stat(true, 0.8, "statistical_threshold_breach"),
    );
    assert!(fused.is_anomaly);
    // 0.6 * (0.5 + 0.1) + 0.4 * 0.8 = 0.68
    assert!((fused.confidence - 0.68).abs() < EPS);
    assert_eq!(fused.label, "ensemble_if_and_statistical");
}

#[test]
fn density_only_discounts_its_confidence() {
    let fused = fuse(DensityPrediction::Outlier, -0.5, &stat(false, 0.0, "normal"));
    assert!(fused.is_anomaly);
    // (0.5 + 0.25) * 0.8 = 0.6
    assert!((fused.confidence - 0.6).abs() < EPS);
    assert_eq!(fused.label, "isolation_forest_anomaly");
}

#[test]
fn statistical_only_maps_label_from_branch() {
    let fused = fuse(
        DensityPrediction::Inlier,
        0.0,
        &stat(true, 0.5, "statistical_threshold_breach"),
    );
    assert!(fused.is_anomaly);
    assert!((fused.confidence - 0.4).abs() < EPS);
    assert_eq!(fused.label, "statistical_threshold_violation");

    let fused = fuse(DensityPrediction::Inlier, 0.0, &stat(true, 0.5, "z_score_breach"));
    assert_eq!(fused.label, "statistical_z_score_violation");

    let fused = fuse(DensityPrediction::Inlier, 0.0, &stat(true, 0.5, "something_else"));
    assert_eq!(fused.label, "unknown_anomaly_type");
}

#[test]
fn neither_detector_passes_statistical_label_through() {
    let fused = fuse(DensityPrediction::Inlier, 0.3, &stat(false, 0.0, "normal_zero_std"));
    assert!(!fused.is_anomaly);
    assert_eq!(fused.confidence, 0.0);
    assert_eq!(fused.label, "normal_zero_std");
}

// ── rolling stats ────────────────────────────────────────────────────

#[test]
fn rolling_stats_empty_window_has_no_stats() {
    let stats = RollingStats::new(8);
    assert!(stats.is_empty());
    assert_eq!(stats.mean(), None);
    assert_eq!(stats.population_std(), None);
}

#[test]
fn rolling_stats_computes_population_std() {
    let mut stats = RollingStats::new(8);
    for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
        stats.push(v);
    }
    assert_eq!(stats.mean(), Some(5.0));
    assert!((stats.population_std().expect("non-empty") - 2.0).abs() < EPS);
}

#[test]
fn rolling_stats_evicts_oldest_at_capacity() {
    let mut stats = RollingStats::new(3);
    for v in [1.0, 2.0, 3.0, 4.0] {
        stats.push(v);
    }
    assert_eq!(stats.len(), 3);
    assert_eq!(stats.mean(), Some(3.0));
}
