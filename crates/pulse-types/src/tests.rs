//! Unit tests for shared domain types.

use chrono::Utc;
use serde_json::json;

use crate::{
    Alert, AnomalyType, CorrelationId, DomainError, EventEnvelope, EventKind, EventPayload,
    Reading, SensorType, VerdictStatus,
};

fn sample_reading() -> Reading {
    Reading::new("pump-7", Utc::now(), 42.0, 0.95, "celsius", SensorType::Temperature)
        .expect("reading should construct")
}

// ── construction validation ──────────────────────────────────────────

#[test]
fn reading_clamps_quality() {
    let r = Reading::new("s", Utc::now(), 1.0, 1.7, "u", SensorType::Other)
        .expect("should construct");
    assert_eq!(r.quality, 1.0);

    let r = Reading::new("s", Utc::now(), 1.0, -0.2, "u", SensorType::Other)
        .expect("should construct");
    assert_eq!(r.quality, 0.0);
}

#[test]
fn reading_rejects_non_finite_value() {
    let err = Reading::new("s", Utc::now(), f64::NAN, 0.5, "u", SensorType::Other)
        .expect_err("NaN value must be rejected");
    assert!(matches!(err, DomainError::NonFinite("value")));
}

#[test]
fn alert_rejects_out_of_range_severity() {
    for severity in [0u8, 6] {
        let err = Alert::new("s", AnomalyType::Spike, severity, 0.5, "d", json!({}))
            .expect_err("severity outside 1..=5 must be rejected");
        assert!(matches!(err, DomainError::SeverityOutOfRange(_)));
    }
}

#[test]
fn alert_clamps_confidence() {
    let a = Alert::new("s", AnomalyType::Spike, 3, 1.4, "d", json!({}))
        .expect("should construct");
    assert_eq!(a.confidence, 1.0);
}

// ── labels and parsing ───────────────────────────────────────────────

#[test]
fn event_kind_labels_round_trip() {
    for kind in [
        EventKind::ReadingIngested,
        EventKind::AnomalyDetected,
        EventKind::AnomalyValidated,
        EventKind::ProcessingFailed,
    ] {
        let parsed: EventKind = kind.as_str().parse().expect("label should parse");
        assert_eq!(parsed, kind);
    }
    assert!("no_such_event".parse::<EventKind>().is_err());
}

#[test]
fn verdict_status_labels() {
    assert_eq!(VerdictStatus::Credible.as_str(), "credible");
    assert_eq!(
        VerdictStatus::FalsePositiveSuspected.as_str(),
        "false_positive_suspected"
    );
    assert_eq!(VerdictStatus::Uncertain.as_str(), "uncertain");
}

// ── envelope ─────────────────────────────────────────────────────────

#[test]
fn envelope_kind_derived_from_payload() {
    let envelope = EventEnvelope::new(
        EventPayload::ReadingIngested {
            reading: sample_reading(),
        },
        CorrelationId::new(),
    );
    assert_eq!(envelope.kind, EventKind::ReadingIngested);
}

#[test]
fn payload_serializes_with_event_type_tag() {
    let payload = EventPayload::ProcessingFailed {
        failed_stage_id: "validation".to_string(),
        error_message: "boom".to_string(),
        original_payload: json!({"x": 1}),
        is_publish_failure: false,
    };
    let value = serde_json::to_value(&payload).expect("should serialize");
    assert_eq!(value["event_type"], "processing_failed");

    let back: EventPayload = serde_json::from_value(value).expect("should deserialize");
    assert_eq!(back, payload);
}
