//! History-window access for the validation stage.
//!
//! The fetch is the only I/O-bound step in the pipeline: a read-only,
//! bounded query behind the [`HistorySource`] seam. Persistence lives with
//! an external collaborator; stages receive a source by injection.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use pulse_types::Reading;
use thiserror::Error;

/// Errors raised by a history backend.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The backend could not serve the query.
    #[error("history backend unavailable: {0}")]
    Unavailable(String),
}

/// Read-only access to a sensor's recent readings.
#[async_trait::async_trait]
pub trait HistorySource: Send + Sync {
    /// Returns up to `limit` readings for `sensor_id` strictly before
    /// `before`, most-recent-first.
    async fn recent_readings(
        &self,
        sensor_id: &str,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reading>, HistoryError>;
}

/// In-memory history source for the node binary and tests.
///
/// The lock guards brief map operations only and is never held across an
/// `.await` point.
pub struct MemoryHistory {
    readings: Mutex<HashMap<String, Vec<Reading>>>,
}

impl MemoryHistory {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            readings: Mutex::new(HashMap::new()),
        }
    }

    /// Records a reading for later retrieval.
    pub fn record(&self, reading: Reading) {
        let mut map = self.readings.lock().expect("history store poisoned");
        map.entry(reading.sensor_id.clone()).or_default().push(reading);
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HistorySource for MemoryHistory {
    async fn recent_readings(
        &self,
        sensor_id: &str,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reading>, HistoryError> {
        let map = self.readings.lock().expect("history store poisoned");
        let mut matching: Vec<Reading> = map
            .get(sensor_id)
            .map(|readings| {
                readings
                    .iter()
                    .filter(|r| r.timestamp < before)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching.truncate(limit);
        Ok(matching)
    }
}
