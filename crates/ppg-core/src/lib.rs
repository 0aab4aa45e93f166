//! PPG-Core: Foundation types for the PPG acquisition pipeline
//!
//! Error taxonomy, HRV metric sets, experiment conditions and recording sessions.

pub mod error;
pub mod metrics;
pub mod condition;
pub mod recording;

pub use error::{AnalysisError, PpgError, PpgResult};
pub use metrics::{MetricName, MetricSet};
pub use condition::ConditionId;
pub use recording::RecordingSession;
