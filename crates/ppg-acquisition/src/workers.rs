//! Background workers fed by the acquisition loop

use crate::events::{ExtractionStats, PipelineEvent, SkipReason};
use crate::sink::{RecordingArtifact, RecordingSink};
use ppg_core::ConditionId;
use ppg_processing::{ConditionAggregator, FeatureExtractor};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

/// Window snapshot queued for extraction under the condition selected at trigger time
#[derive(Debug, Clone, PartialEq)]
pub struct WindowJob {
    pub sequence: u64,
    pub condition: ConditionId,
    pub window: Vec<f64>,
}

/// Extract metrics for each queued window and record them; failed windows are skipped
pub async fn run_feature_worker(
    mut jobs: mpsc::Receiver<WindowJob>,
    extractor: FeatureExtractor,
    sample_rate: f64,
    aggregator: Arc<RwLock<ConditionAggregator>>,
    events: broadcast::Sender<PipelineEvent>,
    stats: Arc<ExtractionStats>,
) {
    info!(analyzer = extractor.analyzer_name(), "feature worker started");

    while let Some(WindowJob { sequence, condition, window }) = jobs.recv().await {
        let analysis = extractor.clone();
        let result =
            tokio::task::spawn_blocking(move || analysis.extract(&window, sample_rate)).await;

        match result {
            Ok(Ok(metrics)) => {
                let recorded = aggregator.write().await.record(&condition, metrics);
                match recorded {
                    Ok(()) => {
                        stats.recorded();
                        debug!(sequence, %condition, bpm = metrics.bpm, "window recorded");
                        let _ = events.send(PipelineEvent::WindowRecorded {
                            sequence,
                            condition,
                            metrics,
                        });
                    }
                    Err(e) => {
                        stats.skipped();
                        error!(sequence, %condition, error = %e, "window metrics rejected by aggregator");
                        let _ = events.send(PipelineEvent::WindowSkipped {
                            sequence,
                            reason: SkipReason::Rejected(e),
                        });
                    }
                }
            }
            Ok(Err(e)) => {
                stats.skipped();
                warn!(sequence, %condition, error = %e, "feature window skipped");
                let _ = events.send(PipelineEvent::WindowSkipped {
                    sequence,
                    reason: SkipReason::Analysis(e),
                });
            }
            Err(e) => {
                stats.skipped();
                error!(sequence, error = %e, "feature extraction task failed");
            }
        }
    }

    debug!("feature worker stopped");
}

/// Persist each finished recording through `sink`
pub async fn run_persistence_worker(
    mut artifacts: mpsc::Receiver<RecordingArtifact>,
    sink: Arc<dyn RecordingSink>,
    events: broadcast::Sender<PipelineEvent>,
) {
    while let Some(artifact) = artifacts.recv().await {
        let sink = Arc::clone(&sink);
        let result = tokio::task::spawn_blocking(move || sink.persist(&artifact)).await;

        let event = match result {
            Ok(Ok(saved)) => PipelineEvent::RecordingSaved {
                raw_path: saved.raw_path,
                features_path: saved.features_path,
                samples: saved.samples,
            },
            Ok(Err(e)) => {
                error!(error = %e, "failed to save recording");
                PipelineEvent::RecordingFailed { reason: e.to_string() }
            }
            Err(e) => {
                error!(error = %e, "persistence task failed");
                PipelineEvent::RecordingFailed { reason: e.to_string() }
            }
        };
        let _ = events.send(event);
    }

    debug!("persistence worker stopped");
}
