//! Synchronous per-sample ingestion: filter, buffer, recording capture

use ppg_core::{PpgError, PpgResult, RecordingSession};
use ppg_processing::{PipelineConfig, RollingBuffer, StreamFilter};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Min/max of the most recent measure window, for axis scaling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayRange {
    pub min: f64,
    pub max: f64,
}

/// Result of ingesting one device read
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    /// Raw value fed to the filter
    pub raw: f64,
    pub filtered: f64,
    /// Read failed and the previous raw value was substituted
    pub reused: bool,
    /// Window snapshot, present when this push completed a measure interval
    pub window: Option<Vec<f64>>,
}

/// Owns the filter, rolling buffer and recording accumulator.
///
/// Mutated only by the acquisition task. Feature windows and recordings
/// leave as owned copies.
#[derive(Debug)]
pub struct AcquisitionCore {
    filter: StreamFilter,
    buffer: RollingBuffer,
    sample_rate: f64,
    measure_time: f64,
    measure_samples: usize,
    last_raw: f64,
    consecutive_failures: u64,
    failed_reads: u64,
    recording: Option<RecordingSession>,
}

impl AcquisitionCore {
    pub fn new(config: &PipelineConfig) -> PpgResult<Self> {
        config.validate()?;
        let filter = StreamFilter::from_config(config.filter, config.sample_rate)?;
        let buffer = RollingBuffer::for_duration(config.max_time, config.sample_rate, config.fill_value)?;

        Ok(AcquisitionCore {
            filter,
            buffer,
            sample_rate: config.sample_rate,
            measure_time: config.measure_time,
            measure_samples: config.measure_samples(),
            last_raw: 0.0,
            consecutive_failures: 0,
            failed_reads: 0,
            recording: None,
        })
    }

    /// Push one read through the filter into the buffer.
    ///
    /// A failed read reuses the last valid raw value so a garbled line never
    /// stalls the stream.
    pub fn ingest(&mut self, read: PpgResult<f64>) -> Ingested {
        let (raw, reused) = match read {
            Ok(value) => {
                if self.consecutive_failures > 0 {
                    debug!(failures = self.consecutive_failures, "device reads recovered");
                }
                self.consecutive_failures = 0;
                self.last_raw = value;
                (value, false)
            }
            Err(e) => {
                self.failed_reads += 1;
                self.consecutive_failures += 1;
                if self.consecutive_failures == 1 {
                    match e {
                        PpgError::Parse { .. } => {
                            debug!(error = %e, "garbled device read, reusing last value")
                        }
                        _ => warn!(error = %e, "device read failed, reusing last value"),
                    }
                } else if self.consecutive_failures % 1000 == 0 {
                    warn!(failures = self.consecutive_failures, "device keeps failing, reusing last value");
                }
                (self.last_raw, true)
            }
        };

        let filtered = self.filter.apply(raw);
        self.buffer.push(filtered);
        if let Some(session) = self.recording.as_mut() {
            session.push(filtered);
        }

        let window = self
            .buffer
            .should_trigger_window(self.measure_time, self.sample_rate)
            .then(|| self.buffer.snapshot());

        Ingested {
            raw,
            filtered,
            reused,
            window,
        }
    }

    /// Start capturing filtered samples; false if a recording is already active
    pub fn begin_recording(&mut self) -> bool {
        if self.recording.is_some() {
            return false;
        }
        self.recording = Some(RecordingSession::start());
        true
    }

    /// Hand over the captured session, leaving the accumulator empty
    pub fn end_recording(&mut self) -> Option<RecordingSession> {
        self.recording.take()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn recorded_samples(&self) -> usize {
        self.recording.as_ref().map_or(0, RecordingSession::len)
    }

    pub fn display_range(&self) -> DisplayRange {
        let (min, max) = self.buffer.recent_bounds(self.measure_samples);
        DisplayRange { min, max }
    }

    pub fn buffer(&self) -> &RollingBuffer {
        &self.buffer
    }

    pub fn latest_filtered(&self) -> f64 {
        self.buffer.latest()
    }

    pub fn failed_reads(&self) -> u64 {
        self.failed_reads
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}
