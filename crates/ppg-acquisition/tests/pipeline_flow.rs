//! End-to-end pipeline runs against scripted devices

use ppg_acquisition::{
    AcquisitionLoop, JsonFileSink, PipelineEvent, PipelineHandle, PipelineState, RawSignalFile,
    SampleSource, SkipReason,
};
use ppg_core::{ConditionId, MetricSet, PpgError, PpgResult};
use ppg_processing::PipelineConfig;
use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

/// 72 bpm sinusoidal pulse at 40 Hz; every `garble_every`-th read is unparsable
struct PulseDevice {
    index: u64,
    garble_every: Option<u64>,
}

impl PulseDevice {
    fn clean() -> Self {
        Self { index: 0, garble_every: None }
    }

    fn garbled(every: u64) -> Self {
        Self { index: 0, garble_every: Some(every) }
    }
}

impl SampleSource for PulseDevice {
    fn read_next(&mut self) -> PpgResult<f64> {
        let i = self.index;
        self.index += 1;
        if matches!(self.garble_every, Some(n) if i % n == n - 1) {
            return Err(PpgError::Parse { line: "51\u{fffd}".to_string() });
        }
        Ok(512.0 + 80.0 * (2.0 * PI * 1.2 * i as f64 / 40.0).sin())
    }
}

/// Constant reading: no beats to detect
struct FlatDevice;

impl SampleSource for FlatDevice {
    fn read_next(&mut self) -> PpgResult<f64> {
        Ok(512.0)
    }
}

fn config(data_dir: &std::path::Path) -> PipelineConfig {
    PipelineConfig {
        min_read_interval_ms: 0,
        experiment_name: "breathing".to_string(),
        data_dir: data_dir.to_path_buf(),
        ..PipelineConfig::default()
    }
}

fn spawn(config: PipelineConfig, source: impl SampleSource + 'static) -> PipelineHandle {
    let sink = Arc::new(JsonFileSink::new(config.data_dir.clone()));
    AcquisitionLoop::spawn(config, source, sink).unwrap()
}

async fn next_matching<T>(
    events: &mut broadcast::Receiver<PipelineEvent>,
    mut select: impl FnMut(PipelineEvent) -> Option<T>,
) -> T {
    timeout(Duration::from_secs(20), async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(found) = select(event) {
                        return found;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for pipeline event")
}

fn recorded(event: PipelineEvent) -> Option<(ConditionId, MetricSet)> {
    match event {
        PipelineEvent::WindowRecorded { condition, metrics, .. } => Some((condition, metrics)),
        _ => None,
    }
}

#[tokio::test]
async fn test_pulse_metrics_recorded_under_selected_condition() {
    let dir = tempfile::tempdir().unwrap();
    let handle = spawn(config(dir.path()), PulseDevice::clean());
    let mut events = handle.subscribe_events();

    handle.select_condition("task").await.unwrap();
    assert_eq!(handle.start().await.unwrap(), PipelineState::Acquiring);

    for _ in 0..3 {
        let (condition, metrics) = next_matching(&mut events, recorded).await;
        assert_eq!(condition, ConditionId::from("task"));
        assert!((metrics.bpm - 72.0).abs() < 2.0, "bpm {}", metrics.bpm);
    }
    handle.stop().await.unwrap();

    let summaries = handle.summary_all().await;
    assert!((summaries[&ConditionId::from("task")].bpm - 72.0).abs() < 2.0);
    assert_eq!(summaries[&ConditionId::from("baseline")], MetricSet::zero());
    assert!(handle.extraction_stats().recorded >= 3);

    let range = handle.display_range();
    assert!(range.min < 0.0 && range.max > 0.0);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_garbled_lines_do_not_stall_acquisition() {
    let dir = tempfile::tempdir().unwrap();
    let handle = spawn(config(dir.path()), PulseDevice::garbled(7));
    let mut events = handle.subscribe_events();

    handle.select_condition("baseline").await.unwrap();
    handle.start().await.unwrap();

    for _ in 0..2 {
        let (_, metrics) = next_matching(&mut events, recorded).await;
        assert!((metrics.bpm - 72.0).abs() < 2.0, "bpm {}", metrics.bpm);
    }
    assert_eq!(handle.state(), PipelineState::Acquiring);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_undetectable_beats_leave_metrics_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let handle = spawn(config(dir.path()), FlatDevice);
    let mut events = handle.subscribe_events();

    handle.select_condition("recovery").await.unwrap();
    handle.start().await.unwrap();

    for _ in 0..2 {
        let reason = next_matching(&mut events, |event| match event {
            PipelineEvent::WindowSkipped { reason, .. } => Some(reason),
            PipelineEvent::WindowRecorded { .. } => panic!("flat signal produced metrics"),
            _ => None,
        })
        .await;
        assert!(matches!(reason, SkipReason::Analysis(_) | SkipReason::QueueFull));
    }

    let history = handle.history().await;
    assert!(history[&ConditionId::from("recovery")].is_empty());
    assert_eq!(handle.summary(&"recovery".into()).await.unwrap(), MetricSet::zero());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_recording_written_to_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let handle = spawn(config(dir.path()), PulseDevice::clean());
    let mut events = handle.subscribe_events();

    handle.select_condition("task").await.unwrap();
    handle.start().await.unwrap();
    assert_eq!(handle.begin_recording().await.unwrap(), PipelineState::Recording);
    next_matching(&mut events, recorded).await;
    let began = handle.latest_sample().index;
    timeout(Duration::from_secs(5), async {
        while handle.latest_sample().index < began + 40 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(handle.end_recording().await.unwrap(), PipelineState::Acquiring);

    let (raw_path, features_path, samples) = next_matching(&mut events, |event| match event {
        PipelineEvent::RecordingSaved { raw_path, features_path, samples } => {
            Some((raw_path, features_path, samples))
        }
        PipelineEvent::RecordingFailed { reason } => panic!("recording failed: {}", reason),
        _ => None,
    })
    .await;

    let raw_name = raw_path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(raw_name.starts_with("breathing_task_raw_signal_"), "{}", raw_name);
    let features_name = features_path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(features_name.starts_with("breathing_featDict_"), "{}", features_name);
    assert_eq!(raw_path.parent(), Some(dir.path()));

    let raw: RawSignalFile =
        serde_json::from_str(&std::fs::read_to_string(&raw_path).unwrap()).unwrap();
    assert_eq!(raw.session.len(), samples);
    assert!(samples > 0);
    assert_eq!(raw.sample_rate, 40.0);

    let features: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&features_path).unwrap()).unwrap();
    assert!(!features["task"]["bpm"].as_array().unwrap().is_empty());
    assert!(features["baseline"]["rmssd"].as_array().unwrap().is_empty());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_extraction_gated_on_recording() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        extract_only_while_recording: true,
        ..config(dir.path())
    };
    let handle = spawn(config, PulseDevice::clean());
    let mut events = handle.subscribe_events();

    handle.select_condition("task").await.unwrap();
    handle.start().await.unwrap();

    let reason = next_matching(&mut events, |event| match event {
        PipelineEvent::WindowSkipped { reason, .. } => Some(reason),
        _ => None,
    })
    .await;
    assert_eq!(reason, SkipReason::NotRecording);
    assert!(handle.history().await[&ConditionId::from("task")].is_empty());

    handle.begin_recording().await.unwrap();
    next_matching(&mut events, recorded).await;

    handle.shutdown().await.unwrap();
}
