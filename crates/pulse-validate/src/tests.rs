//! Unit tests for the rule engine, historical evaluator, classifier, and
//! in-memory history source.

use chrono::{Duration, TimeZone, Utc};
use pulse_types::{Alert, AnomalyType, CorrelationId, Reading, SensorType, VerdictStatus};
use serde_json::json;

use crate::{
    classify, evaluate_history, evaluate_rules, ClassifierConfig, HistoryConfig, HistorySource,
    MemoryHistory, RuleConfig, RuleOutcome,
};

fn reading(value: f64, quality: f64, sensor_type: SensorType) -> Reading {
    Reading::new("pump-7", Utc::now(), value, quality, "celsius", sensor_type)
        .expect("reading should construct")
}

fn alert(confidence: f64, severity: u8, anomaly_type: AnomalyType) -> Alert {
    Alert::new("pump-7", anomaly_type, severity, confidence, "test alert", json!({}))
        .expect("alert should construct")
}

/// Builds a most-recent-first window from values, newest value first, with
/// one-minute spacing ending just before `now`.
fn window(values: &[f64]) -> Vec<Reading> {
    let now = Utc::now();
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            Reading::new(
                "pump-7",
                now - Duration::minutes(i as i64 + 1),
                value,
                1.0,
                "celsius",
                SensorType::Temperature,
            )
            .expect("reading should construct")
        })
        .collect()
}

// ── rule engine ──────────────────────────────────────────────────────

#[test]
fn no_rule_fires_yields_neutral_outcome() {
    let outcome = evaluate_rules(
        &alert(0.9, 2, AnomalyType::Drift),
        &reading(50.0, 0.95, SensorType::Vibration),
        &RuleConfig::default(),
    );
    assert_eq!(outcome.adjustment, 0.0);
    assert_eq!(outcome.reasons, vec!["No rule-based adjustments applied.".to_string()]);
}

#[test]
fn low_confidence_rule_fires_and_cites_value() {
    let outcome = evaluate_rules(
        &alert(0.2, 2, AnomalyType::Drift),
        &reading(50.0, 0.95, SensorType::Vibration),
        &RuleConfig::default(),
    );
    assert!((outcome.adjustment - (-0.1)).abs() < 1e-12);
    assert_eq!(outcome.reasons.len(), 1);
    assert!(outcome.reasons[0].contains("0.20"));
}

#[test]
fn poor_quality_rule_fires() {
    let outcome = evaluate_rules(
        &alert(0.9, 2, AnomalyType::Drift),
        &reading(50.0, 0.3, SensorType::Vibration),
        &RuleConfig::default(),
    );
    assert!((outcome.adjustment - (-0.2)).abs() < 1e-12);
    assert!(outcome.reasons[0].contains("quality"));
}

#[test]
fn marginal_range_rule_fires_near_operating_bound() {
    // Temperature range (-20, 120), margin 10% of span = 14. Value 115 sits
    // within the band around the high bound.
    let outcome = evaluate_rules(
        &alert(0.9, 4, AnomalyType::Spike),
        &reading(115.0, 0.95, SensorType::Temperature),
        &RuleConfig::default(),
    );
    assert!((outcome.adjustment - (-0.05)).abs() < 1e-12);
    assert!(outcome.reasons[0].contains("marginally"));
}

#[test]
fn marginal_range_rule_requires_severity_and_type() {
    let config = RuleConfig::default();
    // Below the severity floor.
    let outcome = evaluate_rules(
        &alert(0.9, 2, AnomalyType::Spike),
        &reading(115.0, 0.95, SensorType::Temperature),
        &config,
    );
    assert_eq!(outcome.adjustment, 0.0);

    // Wrong anomaly type.
    let outcome = evaluate_rules(
        &alert(0.9, 4, AnomalyType::Drift),
        &reading(115.0, 0.95, SensorType::Temperature),
        &config,
    );
    assert_eq!(outcome.adjustment, 0.0);

    // Sensor type without a configured operating range.
    let outcome = evaluate_rules(
        &alert(0.9, 4, AnomalyType::Spike),
        &reading(115.0, 0.95, SensorType::Vibration),
        &config,
    );
    assert_eq!(outcome.adjustment, 0.0);
}

#[test]
fn rules_sum_and_preserve_declaration_order() {
    let outcome = evaluate_rules(
        &alert(0.2, 4, AnomalyType::Spike),
        &reading(115.0, 0.3, SensorType::Temperature),
        &RuleConfig::default(),
    );
    assert!((outcome.adjustment - (-0.35)).abs() < 1e-12);
    assert_eq!(outcome.reasons.len(), 3);
    assert!(outcome.reasons[0].contains("confidence"));
    assert!(outcome.reasons[1].contains("quality"));
    assert!(outcome.reasons[2].contains("marginally"));
}

#[test]
fn rule_config_rejects_bad_values() {
    let mut config = RuleConfig::default();
    config.quality_floor = 1.5;
    assert!(config.validate().is_err());

    let mut config = RuleConfig::default();
    config.temperature_range = (120.0, -20.0);
    assert!(config.validate().is_err());

    let mut config = RuleConfig::default();
    config.low_confidence_adjustment = f64::NAN;
    assert!(config.validate().is_err());

    assert!(RuleConfig::default().validate().is_ok());
}

// ── historical evaluator ─────────────────────────────────────────────

#[test]
fn empty_window_is_neutral_and_never_fails() {
    let outcome = evaluate_history(
        &alert(0.8, 3, AnomalyType::Spike),
        &reading(60.0, 1.0, SensorType::Temperature),
        &[],
        &HistoryConfig::default(),
    );
    assert_eq!(outcome.adjustment, 0.0);
    assert_eq!(
        outcome.reasons,
        vec!["No historical readings available for context.".to_string()]
    );
}

#[test]
fn sharp_jump_from_stable_baseline_corroborates() {
    let outcome = evaluate_history(
        &alert(0.8, 3, AnomalyType::Spike),
        &reading(60.0, 1.0, SensorType::Temperature),
        &window(&[50.0, 50.0, 50.0, 50.0, 50.0]),
        &HistoryConfig::default(),
    );
    assert!((outcome.adjustment - 0.10).abs() < 1e-12);
    assert!(outcome.reasons[0].contains("Sharp jump"));
}

#[test]
fn minor_deviation_from_stable_baseline_penalizes() {
    let outcome = evaluate_history(
        &alert(0.8, 3, AnomalyType::Spike),
        &reading(50.0, 1.0, SensorType::Temperature),
        &window(&[50.0, 50.0, 50.0, 50.0, 50.0]),
        &HistoryConfig::default(),
    );
    assert!((outcome.adjustment - (-0.05)).abs() < 1e-12);
    assert!(outcome.reasons[0].contains("Minor deviation"));
}

#[test]
fn volatile_baseline_fires_without_recurrence() {
    // Large overall spread but adjacent changes all at or below the 0.3
    // noise threshold, so only the stability check fires.
    let outcome = evaluate_history(
        &alert(0.8, 3, AnomalyType::Spike),
        &reading(130.0, 1.0, SensorType::Temperature),
        &window(&[100.0, 125.0, 100.0, 80.0, 100.0]),
        &HistoryConfig::default(),
    );
    assert!((outcome.adjustment - (-0.03)).abs() < 1e-12);
    assert_eq!(outcome.reasons.len(), 1);
    assert!(outcome.reasons[0].contains("Volatile baseline"));
}

#[test]
fn recurring_pattern_fires_below_stability_window() {
    // Three readings: too few for the stability check, enough for the
    // recurrence check, with every adjacent change above the threshold.
    let outcome = evaluate_history(
        &alert(0.8, 3, AnomalyType::Spike),
        &reading(60.0, 1.0, SensorType::Temperature),
        &window(&[10.0, 20.0, 5.0]),
        &HistoryConfig::default(),
    );
    assert!((outcome.adjustment - (-0.15)).abs() < 1e-12);
    assert_eq!(outcome.reasons.len(), 1);
    assert!(outcome.reasons[0].contains("Recurring anomaly pattern"));
}

#[test]
fn stability_reason_precedes_recurrence_reason() {
    // Volatile window whose adjacent changes also exceed the threshold.
    let outcome = evaluate_history(
        &alert(0.8, 3, AnomalyType::Spike),
        &reading(60.0, 1.0, SensorType::Temperature),
        &window(&[10.0, 50.0, 5.0, 80.0, 30.0]),
        &HistoryConfig::default(),
    );
    assert!((outcome.adjustment - (-0.18)).abs() < 1e-12);
    assert_eq!(outcome.reasons.len(), 2);
    assert!(outcome.reasons[0].contains("Volatile baseline"));
    assert!(outcome.reasons[1].contains("Recurring anomaly pattern"));
}

#[test]
fn quiet_short_window_reports_no_significant_patterns() {
    let outcome = evaluate_history(
        &alert(0.8, 3, AnomalyType::Spike),
        &reading(100.0, 1.0, SensorType::Temperature),
        &window(&[100.0, 101.0]),
        &HistoryConfig::default(),
    );
    assert_eq!(outcome.adjustment, 0.0);
    assert_eq!(outcome.reasons, vec!["No significant historical patterns.".to_string()]);
}

#[test]
fn history_config_rejects_bad_values() {
    let mut config = HistoryConfig::default();
    config.stability_window = 1;
    assert!(config.validate().is_err());

    let mut config = HistoryConfig::default();
    config.threshold_pct = 1.5;
    assert!(config.validate().is_err());

    let mut config = HistoryConfig::default();
    config.diff_factor = 0.0;
    assert!(config.validate().is_err());

    let mut config = HistoryConfig::default();
    config.epsilon = 0.0;
    assert!(config.validate().is_err());

    let mut config = HistoryConfig::default();
    config.history_limit = 0;
    assert!(config.validate().is_err());

    assert!(HistoryConfig::default().validate().is_ok());
}

// ── classifier ───────────────────────────────────────────────────────

#[test]
fn classifier_maps_tri_state_thresholds() {
    let config = ClassifierConfig::default();
    let neutral = RuleOutcome::neutral("n/a");
    let id = CorrelationId::new();

    let verdict = classify(0.7, &neutral, &neutral, &config, id);
    assert_eq!(verdict.status, VerdictStatus::Credible);

    let verdict = classify(0.39, &neutral, &neutral, &config, id);
    assert_eq!(verdict.status, VerdictStatus::FalsePositiveSuspected);

    let verdict = classify(0.5, &neutral, &neutral, &config, id);
    assert_eq!(verdict.status, VerdictStatus::Uncertain);
}

#[test]
fn final_confidence_is_always_clamped() {
    let config = ClassifierConfig::default();
    let id = CorrelationId::new();
    for adjustment in [-1e9, -2.0, -0.5, 0.0, 0.5, 2.0, 1e9] {
        let outcome = RuleOutcome {
            adjustment,
            reasons: vec!["x".to_string()],
        };
        let verdict = classify(0.5, &outcome, &RuleOutcome::neutral("n/a"), &config, id);
        assert!((0.0..=1.0).contains(&verdict.final_confidence));
    }
}

#[test]
fn classifier_concatenates_reasons_rules_first() {
    let rule = RuleOutcome {
        adjustment: -0.1,
        reasons: vec!["rule-a".to_string(), "rule-b".to_string()],
    };
    let history = RuleOutcome {
        adjustment: 0.1,
        reasons: vec!["history-a".to_string()],
    };
    let verdict = classify(
        0.5,
        &rule,
        &history,
        &ClassifierConfig::default(),
        CorrelationId::new(),
    );
    assert_eq!(verdict.reasons, vec!["rule-a", "rule-b", "history-a"]);
}

#[test]
fn classification_is_deterministic() {
    let rule = RuleOutcome {
        adjustment: -0.1,
        reasons: vec!["rule".to_string()],
    };
    let history = RuleOutcome {
        adjustment: 0.05,
        reasons: vec!["history".to_string()],
    };
    let config = ClassifierConfig::default();
    let id = CorrelationId::new();

    let first = classify(0.6, &rule, &history, &config, id);
    let second = classify(0.6, &rule, &history, &config, id);
    assert_eq!(first, second);
}

#[test]
fn classifier_config_rejects_bad_thresholds() {
    let config = ClassifierConfig {
        credible_threshold: 0.4,
        false_positive_threshold: 0.7,
    };
    assert!(config.validate().is_err());

    let config = ClassifierConfig {
        credible_threshold: 1.2,
        false_positive_threshold: 0.4,
    };
    assert!(config.validate().is_err());

    assert!(ClassifierConfig::default().validate().is_ok());
}

// ── memory history source ────────────────────────────────────────────

#[tokio::test]
async fn memory_history_returns_most_recent_first_strictly_before() {
    let store = MemoryHistory::new();
    let base = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).single().expect("valid timestamp");

    for minute in 0..6 {
        let r = Reading::new(
            "pump-7",
            base + Duration::minutes(minute),
            minute as f64,
            1.0,
            "celsius",
            SensorType::Temperature,
        )
        .expect("reading should construct");
        store.record(r);
    }

    let fetched = store
        .recent_readings("pump-7", base + Duration::minutes(4), 3)
        .await
        .expect("fetch should succeed");

    // Readings at minutes 0..=3 qualify; most-recent-first, capped at 3.
    let values: Vec<f64> = fetched.iter().map(|r| r.value).collect();
    assert_eq!(values, vec![3.0, 2.0, 1.0]);
}

#[tokio::test]
async fn memory_history_unknown_sensor_is_empty() {
    let store = MemoryHistory::new();
    let fetched = store
        .recent_readings("nope", Utc::now(), 10)
        .await
        .expect("fetch should succeed");
    assert!(fetched.is_empty());
}
