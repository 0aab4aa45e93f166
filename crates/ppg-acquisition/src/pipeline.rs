//! Acquisition loop service and its control handle

use crate::device::SampleSource;
use crate::events::{
    ExtractionSnapshot, ExtractionStats, LiveSample, PipelineEvent, PipelineState, SkipReason,
};
use crate::ingest::{AcquisitionCore, DisplayRange};
use crate::sink::{RecordingArtifact, RecordingSink};
use crate::workers::{run_feature_worker, run_persistence_worker, WindowJob};
use chrono::{DateTime, Utc};
use ppg_core::{ConditionId, MetricSet, PpgError, PpgResult};
use ppg_processing::{
    ConditionAggregator, ConditionMetrics, FeatureExtractor, PeakHrvAnalyzer, PipelineConfig,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Device reads buffered between the reader thread and the loop
const SAMPLE_CHANNEL_CAPACITY: usize = 64;
const COMMAND_CHANNEL_CAPACITY: usize = 32;
const EVENT_CHANNEL_CAPACITY: usize = 128;
const ARTIFACT_QUEUE_CAPACITY: usize = 16;

/// Commands for controlling acquisition
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineCommand {
    Start,
    Stop,
    BeginRecording,
    EndRecording,
    SelectCondition(ConditionId),
}

struct CommandEnvelope {
    command: PipelineCommand,
    reply: oneshot::Sender<PpgResult<PipelineState>>,
}

/// Flags shared with the device reader thread
#[derive(Debug, Clone, Default)]
struct ReaderControl {
    acquiring: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
}

/// Single owner of the filter, buffer and recording accumulator.
///
/// Device reads arrive from a dedicated reader thread over a bounded channel,
/// feature windows leave through a bounded queue, and a stop-recording hands
/// the session to the persistence worker. Nothing on the ingest path waits
/// for extraction or disk I/O.
pub struct AcquisitionLoop {
    config: PipelineConfig,
    core: AcquisitionCore,
    state: PipelineState,
    condition: Option<ConditionId>,
    started_at: DateTime<Utc>,

    samples: mpsc::Receiver<PpgResult<f64>>,
    reader_alive: bool,
    reader: ReaderControl,
    commands: mpsc::Receiver<CommandEnvelope>,

    windows: mpsc::Sender<WindowJob>,
    artifacts: mpsc::Sender<RecordingArtifact>,
    aggregator: Arc<RwLock<ConditionAggregator>>,

    events: broadcast::Sender<PipelineEvent>,
    state_tx: watch::Sender<PipelineState>,
    latest_tx: watch::Sender<LiveSample>,
    range_tx: watch::Sender<DisplayRange>,
    display_tx: mpsc::Sender<f64>,
    display_dropped: u64,

    stats: Arc<ExtractionStats>,
    sample_index: u64,
    window_sequence: u64,
}

impl AcquisitionLoop {
    /// Spawn the pipeline with the peak-based HRV analyzer.
    ///
    /// Must be called from within a tokio runtime. The pipeline starts `Idle`.
    pub fn spawn<S>(
        config: PipelineConfig,
        source: S,
        sink: Arc<dyn RecordingSink>,
    ) -> PpgResult<PipelineHandle>
    where
        S: SampleSource + 'static,
    {
        let extractor = FeatureExtractor::new(Arc::new(PeakHrvAnalyzer::with_config(config.hrv.clone())));
        Self::spawn_with_extractor(config, source, sink, extractor)
    }

    pub fn spawn_with_extractor<S>(
        config: PipelineConfig,
        source: S,
        sink: Arc<dyn RecordingSink>,
        extractor: FeatureExtractor,
    ) -> PpgResult<PipelineHandle>
    where
        S: SampleSource + 'static,
    {
        let core = AcquisitionCore::new(&config)?;

        let aggregator = Arc::new(RwLock::new(ConditionAggregator::with_conditions(
            config.conditions.iter().cloned(),
        )));
        let stats = Arc::new(ExtractionStats::default());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(PipelineState::Idle);
        let (latest_tx, latest_rx) = watch::channel(LiveSample::default());
        let (range_tx, range_rx) = watch::channel(core.display_range());
        let (display_tx, display_rx) = mpsc::channel(config.display_capacity);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (sample_tx, sample_rx) = mpsc::channel(SAMPLE_CHANNEL_CAPACITY);
        let (window_tx, window_rx) = mpsc::channel(config.window_queue_capacity);
        let (artifact_tx, artifact_rx) = mpsc::channel(ARTIFACT_QUEUE_CAPACITY);

        let reader = ReaderControl::default();
        spawn_reader(source, sample_tx, reader.clone(), config.min_read_interval())?;

        let features = tokio::spawn(run_feature_worker(
            window_rx,
            extractor,
            config.sample_rate,
            aggregator.clone(),
            events.clone(),
            stats.clone(),
        ));
        let persistence = tokio::spawn(run_persistence_worker(artifact_rx, sink, events.clone()));

        let service = AcquisitionLoop {
            config: config.clone(),
            core,
            state: PipelineState::Idle,
            condition: None,
            started_at: Utc::now(),
            samples: sample_rx,
            reader_alive: true,
            reader,
            commands: command_rx,
            windows: window_tx,
            artifacts: artifact_tx,
            aggregator: aggregator.clone(),
            events: events.clone(),
            state_tx,
            latest_tx,
            range_tx,
            display_tx,
            display_dropped: 0,
            stats: stats.clone(),
            sample_index: 0,
            window_sequence: 0,
        };
        let acquisition = tokio::spawn(service.run());

        Ok(PipelineHandle {
            config,
            commands: command_tx,
            aggregator,
            events,
            state: state_rx,
            latest: latest_rx,
            display_range: range_rx,
            display: Some(display_rx),
            stats,
            tasks: vec![acquisition, features, persistence],
        })
    }

    /// Main acquisition loop; returns once every command sender is gone
    pub async fn run(mut self) {
        info!(
            sample_rate = self.config.sample_rate,
            buffer = self.core.buffer().capacity(),
            experiment = %self.config.experiment_name,
            "acquisition loop started"
        );

        loop {
            tokio::select! {
                read = self.samples.recv(), if self.reader_alive => {
                    match read {
                        Some(read) => self.on_read(read),
                        None => {
                            warn!("device reader exited");
                            self.reader_alive = false;
                        }
                    }
                }

                envelope = self.commands.recv() => {
                    match envelope {
                        Some(CommandEnvelope { command, reply }) => {
                            let result = self.handle_command(command).await;
                            let _ = reply.send(result);
                        }
                        None => break,
                    }
                }
            }
        }

        self.finish().await;
    }

    async fn handle_command(&mut self, command: PipelineCommand) -> PpgResult<PipelineState> {
        match command {
            PipelineCommand::Start => {
                if self.state == PipelineState::Idle {
                    self.reader.acquiring.store(true, Ordering::Release);
                    self.set_state(PipelineState::Acquiring);
                }
            }
            PipelineCommand::Stop => {
                if self.state == PipelineState::Recording {
                    self.finish_recording().await;
                }
                self.reader.acquiring.store(false, Ordering::Release);
                self.set_state(PipelineState::Idle);
            }
            PipelineCommand::BeginRecording => match self.state {
                PipelineState::Acquiring => {
                    self.core.begin_recording();
                    info!(condition = ?self.condition, "recording started");
                    self.set_state(PipelineState::Recording);
                }
                PipelineState::Idle => warn!("begin recording ignored while idle"),
                PipelineState::Recording => debug!("already recording"),
            },
            PipelineCommand::EndRecording => {
                if self.state == PipelineState::Recording {
                    self.finish_recording().await;
                    self.set_state(PipelineState::Acquiring);
                } else {
                    debug!("end recording ignored, no active recording");
                }
            }
            PipelineCommand::SelectCondition(condition) => {
                if !self.aggregator.read().await.is_registered(&condition) {
                    return Err(PpgError::UnknownCondition {
                        condition: condition.to_string(),
                    });
                }
                info!(%condition, "condition selected");
                self.condition = Some(condition);
            }
        }
        Ok(self.state)
    }

    fn on_read(&mut self, read: PpgResult<f64>) {
        if !self.state.is_acquiring() {
            debug!("dropping device read while idle");
            return;
        }

        let ingested = self.core.ingest(read);
        self.sample_index += 1;
        self.latest_tx.send_replace(LiveSample {
            index: self.sample_index,
            raw: ingested.raw,
            filtered: ingested.filtered,
        });

        if let Err(TrySendError::Full(_)) = self.display_tx.try_send(ingested.filtered) {
            self.display_dropped += 1;
            if self.display_dropped % 1000 == 1 {
                debug!(dropped = self.display_dropped, "display channel full, dropping frames");
            }
        }

        if let Some(window) = ingested.window {
            self.range_tx.send_replace(self.core.display_range());
            self.dispatch_window(window);
        }
    }

    fn dispatch_window(&mut self, window: Vec<f64>) {
        self.window_sequence += 1;
        let sequence = self.window_sequence;

        if self.config.extract_only_while_recording && !self.core.is_recording() {
            self.skip_window(sequence, SkipReason::NotRecording);
            return;
        }
        let Some(condition) = self.condition.clone() else {
            self.skip_window(sequence, SkipReason::NoCondition);
            return;
        };

        match self.windows.try_send(WindowJob { sequence, condition, window }) {
            Ok(()) => self.stats.dispatched(),
            Err(TrySendError::Full(_)) => {
                self.stats.dropped();
                warn!(sequence, "feature worker busy, dropping window");
                let _ = self.events.send(PipelineEvent::WindowSkipped {
                    sequence,
                    reason: SkipReason::QueueFull,
                });
            }
            Err(TrySendError::Closed(_)) => error!(sequence, "feature worker is gone"),
        }
    }

    fn skip_window(&mut self, sequence: u64, reason: SkipReason) {
        debug!(sequence, ?reason, "window not analysed");
        self.stats.skipped();
        let _ = self.events.send(PipelineEvent::WindowSkipped { sequence, reason });
    }

    /// Hand the active recording and a history snapshot to persistence
    async fn finish_recording(&mut self) {
        let Some(session) = self.core.end_recording() else {
            return;
        };
        info!(
            samples = session.len(),
            seconds = session.duration_secs(self.config.sample_rate),
            "recording stopped"
        );

        let artifact = RecordingArtifact {
            experiment: self.config.experiment_name.clone(),
            condition: self.condition.clone(),
            sample_rate: self.config.sample_rate,
            session,
            history: self.aggregator.read().await.export(),
            pipeline_started_at: self.started_at,
        };

        if let Err(e) = self.artifacts.try_send(artifact) {
            let reason = match e {
                TrySendError::Full(_) => "persistence queue full",
                TrySendError::Closed(_) => "persistence worker is gone",
            };
            error!(reason, "recording discarded");
            let _ = self.events.send(PipelineEvent::RecordingFailed {
                reason: reason.to_string(),
            });
        }
    }

    fn set_state(&mut self, state: PipelineState) {
        if self.state == state {
            return;
        }
        info!(from = ?self.state, to = ?state, "pipeline state changed");
        self.state = state;
        self.state_tx.send_replace(state);
        let _ = self.events.send(PipelineEvent::StateChanged(state));
    }

    async fn finish(mut self) {
        self.reader.shutdown.store(true, Ordering::Release);
        self.reader.acquiring.store(false, Ordering::Release);
        if self.state == PipelineState::Recording {
            self.finish_recording().await;
        }
        self.set_state(PipelineState::Idle);
        info!(
            samples = self.sample_index,
            failed_reads = self.core.failed_reads(),
            display_dropped = self.display_dropped,
            "acquisition loop stopped"
        );
    }
}

/// Read the device on its own thread, pausing `interval` after every read.
///
/// The thread is detached: a device blocked in `read_next` cannot hold up
/// shutdown. It exits at the next read once the loop has gone.
fn spawn_reader<S>(
    mut source: S,
    samples: mpsc::Sender<PpgResult<f64>>,
    control: ReaderControl,
    interval: Duration,
) -> PpgResult<()>
where
    S: SampleSource + 'static,
{
    let idle_poll = interval.max(Duration::from_millis(5));
    let name = source.describe();

    std::thread::Builder::new()
        .name("ppg-reader".to_string())
        .spawn(move || {
            debug!(source = %name, "device reader started");
            while !control.shutdown.load(Ordering::Acquire) {
                if !control.acquiring.load(Ordering::Acquire) {
                    std::thread::sleep(idle_poll);
                    continue;
                }
                if samples.blocking_send(source.read_next()).is_err() {
                    break;
                }
                std::thread::sleep(interval);
            }
            debug!(source = %name, "device reader stopped");
        })?;

    Ok(())
}

/// Control surface of a running pipeline
pub struct PipelineHandle {
    config: PipelineConfig,
    commands: mpsc::Sender<CommandEnvelope>,
    aggregator: Arc<RwLock<ConditionAggregator>>,
    events: broadcast::Sender<PipelineEvent>,
    state: watch::Receiver<PipelineState>,
    latest: watch::Receiver<LiveSample>,
    display_range: watch::Receiver<DisplayRange>,
    display: Option<mpsc::Receiver<f64>>,
    stats: Arc<ExtractionStats>,
    tasks: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Send a command and wait for the loop to apply it
    pub async fn send(&self, command: PipelineCommand) -> PpgResult<PipelineState> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(CommandEnvelope { command, reply })
            .await
            .map_err(|_| PpgError::ChannelClosed { channel: "commands" })?;
        response
            .await
            .map_err(|_| PpgError::ChannelClosed { channel: "command reply" })?
    }

    pub async fn start(&self) -> PpgResult<PipelineState> {
        self.send(PipelineCommand::Start).await
    }

    /// Stop reading; filter and buffer state are kept for the next start
    pub async fn stop(&self) -> PpgResult<PipelineState> {
        self.send(PipelineCommand::Stop).await
    }

    pub async fn begin_recording(&self) -> PpgResult<PipelineState> {
        self.send(PipelineCommand::BeginRecording).await
    }

    pub async fn end_recording(&self) -> PpgResult<PipelineState> {
        self.send(PipelineCommand::EndRecording).await
    }

    /// Select the condition future windows are recorded under
    pub async fn select_condition(&self, condition: impl Into<ConditionId>) -> PpgResult<()> {
        self.send(PipelineCommand::SelectCondition(condition.into()))
            .await
            .map(|_| ())
    }

    pub async fn summary(&self, condition: &ConditionId) -> PpgResult<MetricSet> {
        self.aggregator.read().await.summary(condition)
    }

    pub async fn summary_all(&self) -> BTreeMap<ConditionId, MetricSet> {
        self.aggregator.read().await.summary_all()
    }

    /// Full metric history, condition -> metric -> values
    pub async fn history(&self) -> BTreeMap<ConditionId, ConditionMetrics> {
        self.aggregator.read().await.export()
    }

    /// Discard all recorded metrics, keeping registered conditions
    pub async fn reset_metrics(&self) {
        self.aggregator.write().await.reset();
        info!("condition metrics reset");
    }

    pub fn latest_sample(&self) -> LiveSample {
        *self.latest.borrow()
    }

    pub fn display_range(&self) -> DisplayRange {
        *self.display_range.borrow()
    }

    /// Receiver of every filtered sample for plotting; frames are dropped
    /// when it falls behind. Can be taken once.
    pub fn take_display(&mut self) -> Option<mpsc::Receiver<f64>> {
        self.display.take()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    pub fn extraction_stats(&self) -> ExtractionSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stop the loop, flush any active recording and wait for both workers
    pub async fn shutdown(self) -> PpgResult<()> {
        let PipelineHandle { commands, tasks, .. } = self;
        drop(commands);

        for task in tasks {
            task.await
                .map_err(|_| PpgError::ChannelClosed { channel: "pipeline task" })?;
        }
        info!("pipeline shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SavedRecording;
    use ppg_core::AnalysisError;
    use ppg_processing::HrvAnalyzer;
    use std::sync::Mutex;
    use tokio::time::timeout;

    /// Endless counter source: 1, 2, 3, ...
    struct Counter(f64);

    impl SampleSource for Counter {
        fn read_next(&mut self) -> PpgResult<f64> {
            self.0 += 1.0;
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct CaptureSink {
        saved: Mutex<Vec<RecordingArtifact>>,
    }

    impl RecordingSink for CaptureSink {
        fn persist(&self, artifact: &RecordingArtifact) -> PpgResult<SavedRecording> {
            self.saved.lock().unwrap().push(artifact.clone());
            Ok(SavedRecording {
                raw_path: "raw.json".into(),
                features_path: "features.json".into(),
                samples: artifact.session.len(),
            })
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            min_read_interval_ms: 1,
            max_time: 2.0,
            measure_time: 1.0,
            sample_rate: 20.0,
            ..PipelineConfig::default()
        }
    }

    async fn wait_for_samples(handle: &PipelineHandle, count: u64) {
        timeout(Duration::from_secs(5), async {
            while handle.latest_sample().index < count {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let sink = Arc::new(CaptureSink::default());
        let handle = AcquisitionLoop::spawn(config(), Counter(0.0), sink).unwrap();
        let mut events = handle.subscribe_events();

        assert_eq!(handle.state(), PipelineState::Idle);
        assert_eq!(handle.begin_recording().await.unwrap(), PipelineState::Idle);
        assert_eq!(handle.start().await.unwrap(), PipelineState::Acquiring);
        assert_eq!(handle.begin_recording().await.unwrap(), PipelineState::Recording);
        assert_eq!(handle.end_recording().await.unwrap(), PipelineState::Acquiring);
        assert_eq!(handle.stop().await.unwrap(), PipelineState::Idle);
        assert_eq!(handle.end_recording().await.unwrap(), PipelineState::Idle);

        let mut changes = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let PipelineEvent::StateChanged(state) = event {
                changes.push(state);
            }
        }
        assert_eq!(
            changes,
            vec![
                PipelineState::Acquiring,
                PipelineState::Recording,
                PipelineState::Acquiring,
                PipelineState::Idle
            ]
        );

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_condition_rejected() {
        let handle = AcquisitionLoop::spawn(config(), Counter(0.0), Arc::new(CaptureSink::default())).unwrap();

        let err = handle.select_condition("stress").await.unwrap_err();
        assert_eq!(err, PpgError::UnknownCondition { condition: "stress".into() });
        handle.select_condition("task").await.unwrap();

        assert!(matches!(
            handle.summary(&"stress".into()).await,
            Err(PpgError::UnknownCondition { .. })
        ));
        assert_eq!(handle.summary(&"task".into()).await.unwrap(), MetricSet::zero());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_idle_pipeline_reads_nothing() {
        let handle = AcquisitionLoop::spawn(config(), Counter(0.0), Arc::new(CaptureSink::default())).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.latest_sample().index, 0);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_recording_handed_to_sink_in_order() {
        let sink = Arc::new(CaptureSink::default());
        let handle = AcquisitionLoop::spawn(config(), Counter(0.0), sink.clone()).unwrap();
        let mut events = handle.subscribe_events();

        handle.select_condition("baseline").await.unwrap();
        handle.start().await.unwrap();
        wait_for_samples(&handle, 5).await;

        handle.begin_recording().await.unwrap();
        let first = handle.latest_sample().index;
        wait_for_samples(&handle, first + 10).await;
        handle.end_recording().await.unwrap();

        let saved = timeout(Duration::from_secs(5), async {
            loop {
                if let PipelineEvent::RecordingSaved { samples, .. } = events.recv().await.unwrap() {
                    return samples;
                }
            }
        })
        .await
        .unwrap();
        assert!(saved >= 10);

        let artifacts = sink.saved.lock().unwrap().clone();
        assert_eq!(artifacts.len(), 1);
        let artifact = &artifacts[0];
        assert_eq!(artifact.condition, Some(ConditionId::from("baseline")));
        assert_eq!(artifact.experiment, "experiment");
        assert_eq!(artifact.history.len(), 3);

        // Recorded values are the filtered counter ramp, so they replay exactly
        let mut filter = ppg_processing::StreamFilter::from_config(config().filter, 20.0).unwrap();
        let replay: Vec<f64> = (1..=handle.latest_sample().index)
            .map(|i| filter.apply(i as f64))
            .collect();
        let samples = artifact.session.samples();
        assert!(replay.windows(samples.len()).any(|w| w == samples));

        handle.shutdown().await.unwrap();
    }

    /// Records every window handed to it and reports zero metrics
    struct CaptureWindows(Arc<Mutex<Vec<Vec<f64>>>>);

    impl HrvAnalyzer for CaptureWindows {
        fn compute_metrics(&self, window: &[f64], _: f64) -> Result<MetricSet, AnalysisError> {
            self.0.lock().unwrap().push(window.to_vec());
            Ok(MetricSet::zero())
        }
    }

    async fn wait_for_windows(windows: &Mutex<Vec<Vec<f64>>>, count: usize) {
        timeout(Duration::from_secs(5), async {
            while windows.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_stop_keeps_filter_and_buffer_state() {
        let windows = Arc::new(Mutex::new(Vec::new()));
        let extractor = FeatureExtractor::new(Arc::new(CaptureWindows(windows.clone())));
        let config = PipelineConfig {
            window_queue_capacity: 64,
            ..config()
        };
        let handle = AcquisitionLoop::spawn_with_extractor(
            config,
            Counter(0.0),
            Arc::new(CaptureSink::default()),
            extractor,
        )
        .unwrap();

        handle.select_condition("baseline").await.unwrap();
        handle.start().await.unwrap();
        wait_for_windows(&windows, 3).await;
        handle.stop().await.unwrap();
        let before_stop = windows.lock().unwrap().len();

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.start().await.unwrap();
        wait_for_windows(&windows, before_stop + 3).await;
        handle.stop().await.unwrap();
        assert_eq!(handle.extraction_stats().dropped, 0);
        handle.shutdown().await.unwrap();

        // 40-sample windows every 20 samples: each window starts with the
        // newer half of the previous one, across the restart as well
        let windows = windows.lock().unwrap();
        for pair in windows.windows(2) {
            assert_eq!(pair[0].len(), 40);
            assert_eq!(pair[1][..20], pair[0][20..]);
        }
    }

    #[tokio::test]
    async fn test_windows_without_condition_are_skipped() {
        let handle = AcquisitionLoop::spawn(config(), Counter(0.0), Arc::new(CaptureSink::default())).unwrap();
        let mut events = handle.subscribe_events();
        handle.start().await.unwrap();

        let reason = timeout(Duration::from_secs(5), async {
            loop {
                if let PipelineEvent::WindowSkipped { reason, .. } = events.recv().await.unwrap() {
                    return reason;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(reason, SkipReason::NoCondition);
        assert_eq!(handle.extraction_stats().dispatched, 0);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_flushes_active_recording() {
        let sink = Arc::new(CaptureSink::default());
        let handle = AcquisitionLoop::spawn(config(), Counter(0.0), sink.clone()).unwrap();

        handle.start().await.unwrap();
        handle.begin_recording().await.unwrap();
        wait_for_samples(&handle, 3).await;
        handle.shutdown().await.unwrap();

        let saved = sink.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert!(!saved[0].session.is_empty());
        assert_eq!(saved[0].condition, None);
    }
}
