//! Pipeline configuration
//!
//! Loaded from JSON; every field falls back to its default when absent.

use crate::buffer::samples_for;
use crate::features::HrvConfig;
use crate::filters::FilterConfig;
use ppg_core::{config_error, ConditionId, PpgError, PpgResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Complete configuration of one acquisition pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Device sample rate (Hz)
    pub sample_rate: f64,
    /// Rolling buffer span (s)
    pub max_time: f64,
    /// Interval between feature windows (s)
    pub measure_time: f64,
    /// Initial buffer contents
    pub fill_value: f64,
    pub filter: FilterConfig,
    pub hrv: HrvConfig,
    /// Pause after each device read (ms)
    pub min_read_interval_ms: u64,
    /// Bounded display channel capacity
    pub display_capacity: usize,
    /// Bounded feature-window queue capacity
    pub window_queue_capacity: usize,
    /// Only analyse windows while a recording is active
    pub extract_only_while_recording: bool,
    pub experiment_name: String,
    pub conditions: Vec<ConditionId>,
    /// Directory recordings and feature histories are written to
    pub data_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 40.0,
            max_time: 20.0,
            measure_time: 5.0,
            fill_value: 50.0,
            filter: FilterConfig::default(),
            hrv: HrvConfig::default(),
            min_read_interval_ms: 10,
            display_capacity: 256,
            window_queue_capacity: 4,
            extract_only_while_recording: false,
            experiment_name: "experiment".to_string(),
            conditions: ["baseline", "task", "recovery"]
                .into_iter()
                .map(ConditionId::from)
                .collect(),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl PipelineConfig {
    /// Validate entire configuration
    pub fn validate(&self) -> PpgResult<()> {
        positive("sample rate", self.sample_rate)?;
        positive("max time", self.max_time)?;
        positive("measure time", self.measure_time)?;
        if !self.fill_value.is_finite() {
            return Err(config_error!("fill value must be finite, got {}", self.fill_value));
        }

        if self.measure_samples() == 0 {
            return Err(config_error!(
                "measure time {}s is shorter than one sample at {}Hz",
                self.measure_time,
                self.sample_rate
            ));
        }
        if self.buffer_capacity() < self.measure_samples() {
            return Err(config_error!(
                "buffer of {} samples cannot hold a {} sample measure window",
                self.buffer_capacity(),
                self.measure_samples()
            ));
        }

        self.filter.validate(self.sample_rate)?;

        if self.display_capacity == 0 {
            return Err(config_error!("display capacity must be greater than 0"));
        }
        if self.window_queue_capacity == 0 {
            return Err(config_error!("window queue capacity must be greater than 0"));
        }

        if self.experiment_name.trim().is_empty() {
            return Err(config_error!("experiment name must not be empty"));
        }
        if self.conditions.is_empty() {
            return Err(config_error!("at least one experiment condition is required"));
        }
        let mut seen = BTreeSet::new();
        for condition in &self.conditions {
            if condition.as_str().trim().is_empty() {
                return Err(config_error!("condition names must not be empty"));
            }
            if !seen.insert(condition) {
                return Err(config_error!("duplicate condition '{}'", condition));
            }
        }

        Ok(())
    }

    /// Rolling buffer length in samples
    pub fn buffer_capacity(&self) -> usize {
        samples_for(self.max_time, self.sample_rate)
    }

    /// Pushes between feature windows
    pub fn measure_samples(&self) -> usize {
        samples_for(self.measure_time, self.sample_rate)
    }

    pub fn min_read_interval(&self) -> Duration {
        Duration::from_millis(self.min_read_interval_ms)
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> PpgResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| config_error!("failed to serialize configuration: {}", e))
    }

    /// Import configuration from JSON
    pub fn from_json(json: &str) -> PpgResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| config_error!("failed to deserialize configuration: {}", e))
    }

    /// Read, parse and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> PpgResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| PpgError::Configuration {
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        let config = Self::from_json(&json)?;
        config.validate()?;
        info!(path = %path.display(), experiment = %config.experiment_name, "loaded pipeline configuration");
        Ok(config)
    }
}

fn positive(what: &str, value: f64) -> PpgResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(config_error!("{} must be positive, got {}", what, value))
    }
}
