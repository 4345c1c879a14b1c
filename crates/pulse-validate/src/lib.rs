//! Multi-signal validation of anomaly alerts.
//!
//! Turns a raw detector verdict into a calibrated, classified decision:
//! the rule engine applies independent heuristics to the (alert, reading)
//! pair, the historical context evaluator analyzes a bounded window of
//! prior readings, and the classifier sums the adjustments, clamps the
//! result into [0, 1], and maps it onto a tri-state [`VerdictStatus`].
//!
//! Every adjustment produces a *new* [`Verdict`]; the originating alert is
//! never mutated.
//!
//! [`VerdictStatus`]: pulse_types::VerdictStatus
//! [`Verdict`]: pulse_types::Verdict

mod classify;
mod history;
mod rules;
mod source;

pub use classify::{classify, ClassifierConfig};
pub use history::{evaluate_history, HistoryConfig};
pub use rules::{evaluate_rules, RuleConfig};
pub use source::{HistoryError, HistorySource, MemoryHistory};

use thiserror::Error;

/// Errors raised when validating a configuration struct.
///
/// Out-of-range values are rejected, never silently clamped.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration field was NaN or infinite.
    #[error("config field '{field}' must be finite, got {value}")]
    NonFinite {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// A field that must lie within [0, 1] did not.
    #[error("config field '{field}' must be within [0, 1], got {value}")]
    OutOfUnitRange {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// A field that must be strictly positive was not.
    #[error("config field '{field}' must be > 0, got {value}")]
    NonPositive {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// A count field was below its minimum.
    #[error("config field '{field}' must be >= {min}, got {value}")]
    CountTooSmall {
        /// Name of the offending field.
        field: &'static str,
        /// Minimum accepted value.
        min: usize,
        /// The rejected value.
        value: usize,
    },
    /// The classifier thresholds are not ordered.
    #[error("false_positive_threshold ({fp}) must be below credible_threshold ({credible})")]
    UnorderedThresholds {
        /// The rejected false-positive threshold.
        fp: f64,
        /// The rejected credible threshold.
        credible: f64,
    },
    /// A range field has its bounds reversed.
    #[error("config field '{field}' has reversed bounds ({low} > {high})")]
    ReversedRange {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected lower bound.
        low: f64,
        /// The rejected upper bound.
        high: f64,
    },
}

/// The outcome of one evaluator: a signed confidence delta plus an ordered
/// audit trail of the checks that fired.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    /// Sum of the adjustments of every check that fired.
    pub adjustment: f64,
    /// One reason per fired check, in firing order. Never empty: evaluators
    /// emit an explanatory entry even when nothing fired.
    pub reasons: Vec<String>,
}

impl RuleOutcome {
    /// A zero adjustment with a single explanatory reason.
    pub fn neutral(reason: impl Into<String>) -> Self {
        Self {
            adjustment: 0.0,
            reasons: vec![reason.into()],
        }
    }
}

#[cfg(test)]
mod tests;
