//! Node configuration loading from file and environment variables.
//!
//! Each pipeline config section deserializes directly into its domain
//! struct; range validation happens when the pipeline is built, so an
//! out-of-range value fails startup rather than being silently clamped.

use pulse_detect::DetectorConfig;
use pulse_validate::{ClassifierConfig, HistoryConfig, RuleConfig};
use serde::Deserialize;
use thiserror::Error;

/// Top-level node configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Statistical detector thresholds.
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Rule-engine adjustment table.
    #[serde(default)]
    pub rules: RuleConfig,

    /// Historical context evaluator settings.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Classifier thresholds.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Stage wiring settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Stage wiring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Per-sensor rolling window capacity.
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,

    /// Readings required before a sensor is scored.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "pulse_pipeline=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_window_capacity() -> usize {
    64
}

fn default_min_samples() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_capacity: default_window_capacity(),
            min_samples: default_min_samples(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Where a loaded [`Config`] came from.
///
/// Returned alongside the config so the caller can report the missing-file
/// fallback after the tracing subscriber is up; logging it here would be
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Parsed from the file at the given path.
    File,
    /// The file did not exist; built-in defaults were used.
    Defaults,
}

/// Loads configuration from a TOML file, falling back to defaults when the
/// file does not exist.
///
/// Environment variable overrides:
/// - `PULSE_LOG_LEVEL` overrides `logging.level`
/// - `PULSE_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: &str) -> Result<(Config, ConfigOrigin), ConfigError> {
    let (mut config, origin) = match std::fs::read_to_string(path) {
        Ok(contents) => (toml::from_str(&contents)?, ConfigOrigin::File),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (Config::default(), ConfigOrigin::Defaults)
        }
        Err(e) => return Err(ConfigError::FileRead(e)),
    };

    // Environment variable overrides
    if let Ok(level) = std::env::var("PULSE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("PULSE_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok((config, origin))
}
