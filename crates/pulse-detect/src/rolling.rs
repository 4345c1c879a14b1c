//! Bounded rolling mean/std over the most recent values of one sensor.
//!
//! The window is small (tens to a few hundred values), so mean and variance
//! are recomputed on read rather than maintained incrementally. This keeps
//! the semantics exactly windowed and matches the population-std convention
//! used by the historical context evaluator.

use std::collections::VecDeque;

/// Rolling window of recent values with mean/std accessors.
#[derive(Debug, Clone)]
pub struct RollingStats {
    window: VecDeque<f64>,
    capacity: usize,
}

impl RollingStats {
    /// Creates an empty window holding at most `capacity` values.
    ///
    /// A zero capacity is bumped to 1 so the window can always hold the
    /// latest value.
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Appends a value, evicting the oldest once the window is full.
    pub fn push(&mut self, value: f64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);
    }

    /// Number of values currently in the window.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// True when no values have been pushed yet.
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Mean of the windowed values, or `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        Some(self.window.iter().sum::<f64>() / self.window.len() as f64)
    }

    /// Population standard deviation of the windowed values, or `None` when
    /// empty. A single-value window has std 0.
    pub fn population_std(&self) -> Option<f64> {
        let mean = self.mean()?;
        let n = self.window.len() as f64;
        let variance = self.window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(variance.sqrt())
    }
}
