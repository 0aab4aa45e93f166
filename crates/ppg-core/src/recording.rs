//! Raw-signal capture between "start recording" and "stop recording"

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Filtered samples accumulated since recording began
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSession {
    /// Unique identifier for this recording
    pub id: Uuid,
    /// When "start recording" was pressed
    pub started_at: DateTime<Utc>,
    /// Filtered samples in arrival order
    samples: Vec<f64>,
}

impl RecordingSession {
    /// Start a new, empty recording now
    pub fn start() -> Self {
        Self::started_at(Utc::now())
    }

    pub fn started_at(started_at: DateTime<Utc>) -> Self {
        RecordingSession {
            id: Uuid::new_v4(),
            started_at,
            samples: Vec::new(),
        }
    }

    pub fn push(&mut self, filtered: f64) {
        self.samples.push(filtered);
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Recording start as whole seconds since the Unix epoch (UTC)
    pub fn unix_timestamp(&self) -> i64 {
        self.started_at.timestamp()
    }

    /// Captured duration at the given sample rate
    pub fn duration_secs(&self, sample_rate: f64) -> f64 {
        if sample_rate > 0.0 {
            self.samples.len() as f64 / sample_rate
        } else {
            0.0
        }
    }
}
