//! Anomaly detection primitives for the Pulse pipeline.
//!
//! Implements the sigma-threshold statistical deviation detector, the
//! ensemble fusion of a density-based detector verdict with the statistical
//! verdict, and the per-sensor rolling statistics that feed the detector.
//!
//! The density model itself lives behind the [`DensityScorer`] seam; model
//! training and the model registry are external collaborators.

mod ensemble;
mod rolling;
mod statistical;

pub use ensemble::{fuse, DensityPrediction, DensityScore, DensityScorer, NullDensityScorer};
pub use rolling::RollingStats;
pub use statistical::{detect, ConfigError, Detection, DetectorConfig, DetectError};

#[cfg(test)]
mod tests;
