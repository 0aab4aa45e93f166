//! Persistence boundary for finished recordings

use chrono::{DateTime, Utc};
use ppg_core::{ConditionId, PpgError, PpgResult, RecordingSession};
use ppg_processing::ConditionMetrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything handed to persistence when a recording stops
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingArtifact {
    pub experiment: String,
    /// Condition selected when the recording ended
    pub condition: Option<ConditionId>,
    pub sample_rate: f64,
    pub session: RecordingSession,
    /// Full metric history, condition -> metric -> values
    pub history: BTreeMap<ConditionId, ConditionMetrics>,
    pub pipeline_started_at: DateTime<Utc>,
}

/// Where a recording ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedRecording {
    pub raw_path: PathBuf,
    pub features_path: PathBuf,
    pub samples: usize,
}

/// Writes recording artifacts somewhere durable. Called from a blocking context.
pub trait RecordingSink: Send + Sync {
    fn persist(&self, artifact: &RecordingArtifact) -> PpgResult<SavedRecording>;
}

/// On-disk layout of a raw signal file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSignalFile {
    pub experiment: String,
    pub condition: Option<ConditionId>,
    pub sample_rate: f64,
    #[serde(flatten)]
    pub session: RecordingSession,
}

/// JSON files under a data directory:
/// `<experiment>_<condition>_raw_signal_<unix>.json` per recording and
/// `<experiment>_featDict_<unix>.json` per pipeline run.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    data_dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn raw_signal_path(&self, artifact: &RecordingArtifact) -> PathBuf {
        let condition = artifact
            .condition
            .as_ref()
            .map_or("unassigned", ConditionId::as_str);
        self.data_dir.join(format!(
            "{}_{}_raw_signal_{}.json",
            artifact.experiment,
            condition,
            artifact.session.unix_timestamp()
        ))
    }

    pub fn features_path(&self, artifact: &RecordingArtifact) -> PathBuf {
        self.data_dir.join(format!(
            "{}_featDict_{}.json",
            artifact.experiment,
            artifact.pipeline_started_at.timestamp()
        ))
    }
}

impl RecordingSink for JsonFileSink {
    fn persist(&self, artifact: &RecordingArtifact) -> PpgResult<SavedRecording> {
        fs::create_dir_all(&self.data_dir).map_err(|e| persistence(&self.data_dir, e))?;

        let raw_path = self.raw_signal_path(artifact);
        let raw = RawSignalFile {
            experiment: artifact.experiment.clone(),
            condition: artifact.condition.clone(),
            sample_rate: artifact.sample_rate,
            session: artifact.session.clone(),
        };
        write_json(&raw_path, &raw)?;

        let features_path = self.features_path(artifact);
        write_json(&features_path, &artifact.history)?;

        info!(
            raw = %raw_path.display(),
            features = %features_path.display(),
            samples = artifact.session.len(),
            "recording saved"
        );

        Ok(SavedRecording {
            raw_path,
            features_path,
            samples: artifact.session.len(),
        })
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> PpgResult<()> {
    let file = File::create(path).map_err(|e| persistence(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value).map_err(|e| persistence(path, e))?;
    writer.flush().map_err(|e| persistence(path, e))
}

fn persistence(path: &Path, err: impl std::fmt::Display) -> PpgError {
    PpgError::Persistence {
        reason: format!("{}: {}", path.display(), err),
    }
}
