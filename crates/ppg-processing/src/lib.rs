//! PPG-Processing: Signal processing for the PPG pipeline
//!
//! Streaming band-pass filtering, the rolling sample window, HRV feature
//! extraction and per-condition aggregation.

pub mod filters;
pub mod buffer;
pub mod features;
pub mod aggregator;
pub mod config;

pub use filters::{FilterConfig, StreamFilter, MAX_FILTER_ORDER};
pub use buffer::{samples_for, RollingBuffer};
pub use features::{FeatureExtractor, HrvAnalyzer, HrvConfig, PeakHrvAnalyzer};
pub use aggregator::{Bounds, ConditionAggregator, ConditionMetrics, SummaryScale};
pub use config::PipelineConfig;
