//! Pipeline state, events and counters exposed to presentation layers

use ppg_core::{AnalysisError, ConditionId, MetricSet, PpgError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Acquisition state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    /// Device is not read
    Idle,
    Acquiring,
    /// Acquiring and capturing filtered samples
    Recording,
}

impl PipelineState {
    pub fn is_acquiring(&self) -> bool {
        !matches!(self, PipelineState::Idle)
    }
}

/// Why a feature window produced no metrics
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// No condition was selected when the window triggered
    NoCondition,
    /// Extraction is gated on an active recording
    NotRecording,
    /// The feature worker was still busy with earlier windows
    QueueFull,
    Analysis(AnalysisError),
    /// Metrics were computed but the aggregator refused them
    Rejected(PpgError),
}

/// Notifications broadcast to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StateChanged(PipelineState),
    WindowRecorded {
        sequence: u64,
        condition: ConditionId,
        metrics: MetricSet,
    },
    WindowSkipped {
        sequence: u64,
        reason: SkipReason,
    },
    RecordingSaved {
        raw_path: PathBuf,
        features_path: PathBuf,
        samples: usize,
    },
    RecordingFailed {
        reason: String,
    },
}

/// Most recent sample, for plotting
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LiveSample {
    /// Arrival index since the pipeline started
    pub index: u64,
    pub raw: f64,
    pub filtered: f64,
}

/// Feature-window counters shared between the acquisition task and the worker
#[derive(Debug, Default)]
pub struct ExtractionStats {
    dispatched: AtomicU64,
    recorded: AtomicU64,
    skipped: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`ExtractionStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtractionSnapshot {
    pub dispatched: u64,
    pub recorded: u64,
    pub skipped: u64,
    pub dropped: u64,
}

impl ExtractionStats {
    pub(crate) fn dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn recorded(&self) {
        self.recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ExtractionSnapshot {
        ExtractionSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            recorded: self.recorded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
