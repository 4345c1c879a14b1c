//! Heuristic rule engine.
//!
//! Each rule is an independent pure check over the (alert, reading) pair
//! producing an optional signed adjustment plus a reason. Rules fire in
//! declaration order and their adjustments sum; reason order is preserved
//! for auditability.

use pulse_types::{Alert, AnomalyType, Reading, SensorType};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, RuleOutcome};

/// Adjustment table and floors for the rule engine.
///
/// One canonical table; deployments tune individual fields rather than
/// swapping whole tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Alerts below this original confidence draw the low-confidence rule.
    pub low_confidence_floor: f64,
    /// Adjustment applied by the low-confidence rule.
    pub low_confidence_adjustment: f64,
    /// Readings below this quality draw the poor-quality rule.
    pub quality_floor: f64,
    /// Adjustment applied by the poor-quality rule.
    pub poor_quality_adjustment: f64,
    /// Minimum severity for the marginal-range rule to apply.
    pub severity_floor: u8,
    /// Fraction of the operating-range span treated as "marginal" around
    /// each range boundary.
    pub marginal_margin_pct: f64,
    /// Adjustment applied by the marginal-range rule.
    pub marginal_range_adjustment: f64,
    /// Typical operating range for temperature sensors (°C).
    pub temperature_range: (f64, f64),
    /// Typical operating range for pressure sensors (kPa).
    pub pressure_range: (f64, f64),
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            low_confidence_floor: 0.3,
            low_confidence_adjustment: -0.1,
            quality_floor: 0.5,
            poor_quality_adjustment: -0.2,
            severity_floor: 3,
            marginal_margin_pct: 0.10,
            marginal_range_adjustment: -0.05,
            temperature_range: (-20.0, 120.0),
            pressure_range: (0.0, 500.0),
        }
    }
}

impl RuleConfig {
    /// Validates the table, returning it unchanged on success.
    ///
    /// # Errors
    ///
    /// Rejects non-finite fields, floors outside [0, 1], a non-positive or
    /// oversized margin, and reversed operating ranges.
    pub fn validate(self) -> Result<Self, ConfigError> {
        for (field, value) in [
            ("low_confidence_floor", self.low_confidence_floor),
            ("low_confidence_adjustment", self.low_confidence_adjustment),
            ("quality_floor", self.quality_floor),
            ("poor_quality_adjustment", self.poor_quality_adjustment),
            ("marginal_margin_pct", self.marginal_margin_pct),
            ("marginal_range_adjustment", self.marginal_range_adjustment),
            ("temperature_range.low", self.temperature_range.0),
            ("temperature_range.high", self.temperature_range.1),
            ("pressure_range.low", self.pressure_range.0),
            ("pressure_range.high", self.pressure_range.1),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field, value });
            }
        }
        for (field, value) in [
            ("low_confidence_floor", self.low_confidence_floor),
            ("quality_floor", self.quality_floor),
            ("marginal_margin_pct", self.marginal_margin_pct),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { field, value });
            }
        }
        for (field, (low, high)) in [
            ("temperature_range", self.temperature_range),
            ("pressure_range", self.pressure_range),
        ] {
            if low > high {
                return Err(ConfigError::ReversedRange { field, low, high });
            }
        }
        Ok(self)
    }

    fn operating_range(&self, sensor_type: SensorType) -> Option<(f64, f64)> {
        match sensor_type {
            SensorType::Temperature => Some(self.temperature_range),
            SensorType::Pressure => Some(self.pressure_range),
            _ => None,
        }
    }
}

/// Applies every rule to the (alert, reading) pair.
///
/// Returns the summed adjustment and one reason per fired rule, in
/// declaration order. When no rule fires the adjustment is 0.0 with a
/// single explanatory reason.
pub fn evaluate_rules(alert: &Alert, reading: &Reading, config: &RuleConfig) -> RuleOutcome {
    let mut adjustment = 0.0;
    let mut reasons = Vec::new();

    if alert.confidence < config.low_confidence_floor {
        adjustment += config.low_confidence_adjustment;
        reasons.push(format!(
            "Original detection confidence {:.2} is below the {:.2} floor.",
            alert.confidence, config.low_confidence_floor
        ));
    }

    if reading.quality < config.quality_floor {
        adjustment += config.poor_quality_adjustment;
        reasons.push(format!(
            "Reading quality {:.2} is below the {:.2} floor.",
            reading.quality, config.quality_floor
        ));
    }

    if let Some(reason) = marginal_range_reason(alert, reading, config) {
        adjustment += config.marginal_range_adjustment;
        reasons.push(reason);
    }

    if reasons.is_empty() {
        return RuleOutcome::neutral("No rule-based adjustments applied.");
    }
    RuleOutcome { adjustment, reasons }
}

/// Type-specific range check.
///
/// For temperature/pressure sensors with a spike or threshold-breach
/// anomaly at or above the severity floor: a value sitting within the
/// margin band around either operating-range boundary is weak evidence of
/// a real fault rather than an extreme excursion.
fn marginal_range_reason(alert: &Alert, reading: &Reading, config: &RuleConfig) -> Option<String> {
    if alert.severity < config.severity_floor {
        return None;
    }
    if !matches!(alert.anomaly_type, AnomalyType::Spike | AnomalyType::ThresholdBreach) {
        return None;
    }
    let (low, high) = config.operating_range(reading.sensor_type)?;
    let margin = config.marginal_margin_pct * (high - low);

    let near_low = (reading.value - low).abs() <= margin;
    let near_high = (reading.value - high).abs() <= margin;
    if !(near_low || near_high) {
        return None;
    }

    let boundary = if near_low { low } else { high };
    Some(format!(
        "Value {:.2} sits marginally around the {} operating bound {:.2}; weak evidence of an extreme excursion.",
        reading.value,
        reading.sensor_type,
        boundary
    ))
}
