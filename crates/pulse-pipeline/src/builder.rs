//! Composition root for the pipeline.
//!
//! Constructs the bus and both stages, injecting every collaborator
//! explicitly. Configs are validated here; an invalid value fails the
//! build rather than surfacing mid-traversal.

use std::sync::Arc;

use pulse_bus::EventBus;
use pulse_detect::{DensityScorer, DetectorConfig, NullDensityScorer};
use pulse_types::EventKind;
use pulse_validate::{ClassifierConfig, HistoryConfig, HistorySource, RuleConfig};
use thiserror::Error;

use crate::{DetectionStage, EventPublisher, ValidationStage};

/// Errors raised while building the pipeline.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The detector config was rejected.
    #[error(transparent)]
    Detector(#[from] pulse_detect::ConfigError),
    /// A validation-side config was rejected.
    #[error(transparent)]
    Validation(#[from] pulse_validate::ConfigError),
    /// The rolling-window parameters are inconsistent.
    #[error("rolling window misconfigured: capacity {capacity} must be >= min_samples {min_samples} >= 1")]
    Window {
        /// Configured window capacity.
        capacity: usize,
        /// Configured warmup sample count.
        min_samples: usize,
    },
}

/// A fully wired pipeline.
pub struct Pipeline {
    /// The bus carrying all pipeline events. External producers publish
    /// `reading_ingested` here; external consumers subscribe to
    /// `anomaly_validated` and `processing_failed`.
    pub bus: Arc<EventBus>,
    /// Handle to the detection stage (for unsubscribing or inspection).
    pub detection: Arc<DetectionStage>,
    /// Handle to the validation stage.
    pub validation: Arc<ValidationStage>,
}

/// Builder wiring the stages onto a fresh bus.
pub struct PipelineBuilder {
    history: Arc<dyn HistorySource>,
    scorer: Arc<dyn DensityScorer>,
    detector_config: DetectorConfig,
    rule_config: RuleConfig,
    history_config: HistoryConfig,
    classifier_config: ClassifierConfig,
    window_capacity: usize,
    min_samples: usize,
}

impl PipelineBuilder {
    /// Starts a builder with default configs, a null density scorer, and
    /// the given history source.
    pub fn new(history: Arc<dyn HistorySource>) -> Self {
        Self {
            history,
            scorer: Arc::new(NullDensityScorer),
            detector_config: DetectorConfig::default(),
            rule_config: RuleConfig::default(),
            history_config: HistoryConfig::default(),
            classifier_config: ClassifierConfig::default(),
            window_capacity: 64,
            min_samples: 10,
        }
    }

    /// Attaches a density scorer (defaults to [`NullDensityScorer`]).
    pub fn density_scorer(mut self, scorer: Arc<dyn DensityScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Overrides the statistical detector config.
    pub fn detector_config(mut self, config: DetectorConfig) -> Self {
        self.detector_config = config;
        self
    }

    /// Overrides the rule-engine table.
    pub fn rule_config(mut self, config: RuleConfig) -> Self {
        self.rule_config = config;
        self
    }

    /// Overrides the historical-evaluator config.
    pub fn history_config(mut self, config: HistoryConfig) -> Self {
        self.history_config = config;
        self
    }

    /// Overrides the classifier thresholds.
    pub fn classifier_config(mut self, config: ClassifierConfig) -> Self {
        self.classifier_config = config;
        self
    }

    /// Sets the per-sensor rolling window capacity and warmup sample count.
    pub fn rolling_window(mut self, capacity: usize, min_samples: usize) -> Self {
        self.window_capacity = capacity;
        self.min_samples = min_samples;
        self
    }

    /// Validates every config, wires both stages onto a fresh bus, and
    /// returns the pipeline.
    ///
    /// # Errors
    ///
    /// Any out-of-range config value fails the build.
    pub fn build(self) -> Result<Pipeline, BuildError> {
        let detector_config = DetectorConfig::new(
            self.detector_config.sigma_threshold,
            self.detector_config.min_confidence,
            self.detector_config.tolerance,
        )?;
        let rule_config = self.rule_config.validate()?;
        let history_config = self.history_config.validate()?;
        let classifier_config = self.classifier_config.validate()?;
        if self.min_samples < 1 || self.window_capacity < self.min_samples {
            return Err(BuildError::Window {
                capacity: self.window_capacity,
                min_samples: self.min_samples,
            });
        }

        let bus = Arc::new(EventBus::new());
        let publisher: Arc<dyn EventPublisher> = bus.clone();

        let detection = Arc::new(DetectionStage::new(
            publisher.clone(),
            self.scorer,
            detector_config,
            self.window_capacity,
            self.min_samples,
        ));
        let validation = Arc::new(ValidationStage::new(
            publisher,
            self.history,
            rule_config,
            history_config,
            classifier_config,
        ));

        bus.subscribe(EventKind::ReadingIngested, detection.clone());
        bus.subscribe(EventKind::AnomalyDetected, validation.clone());

        tracing::info!("pipeline wired: detection and validation stages subscribed");
        Ok(Pipeline {
            bus,
            detection,
            validation,
        })
    }
}
