//! PPG-Acquisition: Real-time acquisition pipeline
//!
//! Reads a device on a dedicated thread, filters and buffers every sample,
//! extracts HRV metrics per measure window in a background worker and hands
//! finished recordings to persistence.

pub mod device;
pub mod simulator;
pub mod ingest;
pub mod events;
pub mod sink;
pub mod workers;
pub mod pipeline;

pub use device::{parse_sample, LineSource, SampleSource};
pub use simulator::{PpgSimulator, SimulatorConfig};
pub use ingest::{AcquisitionCore, DisplayRange, Ingested};
pub use events::{
    ExtractionSnapshot, ExtractionStats, LiveSample, PipelineEvent, PipelineState, SkipReason,
};
pub use sink::{JsonFileSink, RawSignalFile, RecordingArtifact, RecordingSink, SavedRecording};
pub use workers::WindowJob;
pub use pipeline::{AcquisitionLoop, PipelineCommand, PipelineHandle};
