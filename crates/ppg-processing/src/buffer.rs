//! Fixed-length ring of the most recent filtered samples

use ppg_core::{config_error, PpgResult};

/// Rolling window feeding both the live plot and feature extraction.
///
/// Always full: pre-filled with `fill_value`, every push evicts the oldest
/// sample. A second counter tracks pushes since the last window trigger.
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    data: Vec<f64>,
    // Index of the oldest sample, i.e. the next slot to overwrite
    head: usize,
    since_trigger: usize,
    total_pushed: u64,
}

impl RollingBuffer {
    pub fn new(capacity: usize, fill_value: f64) -> PpgResult<Self> {
        if capacity == 0 {
            return Err(config_error!("rolling buffer capacity must be greater than 0"));
        }

        Ok(RollingBuffer {
            data: vec![fill_value; capacity],
            head: 0,
            since_trigger: 0,
            total_pushed: 0,
        })
    }

    /// Capacity for `max_time` seconds at `sample_rate`
    pub fn for_duration(max_time: f64, sample_rate: f64, fill_value: f64) -> PpgResult<Self> {
        Self::new(samples_for(max_time, sample_rate), fill_value)
    }

    /// Evict the oldest sample and append `value`
    pub fn push(&mut self, value: f64) {
        self.data[self.head] = value;
        self.head = (self.head + 1) % self.data.len();
        self.since_trigger += 1;
        self.total_pushed += 1;
    }

    /// True once every `measure_time * sample_rate` pushes; resets the counter when it fires
    pub fn should_trigger_window(&mut self, measure_time: f64, sample_rate: f64) -> bool {
        let threshold = samples_for(measure_time, sample_rate).max(1);
        if self.since_trigger >= threshold {
            self.since_trigger = 0;
            true
        } else {
            false
        }
    }

    /// Point-in-time copy, oldest first
    pub fn snapshot(&self) -> Vec<f64> {
        let mut window = Vec::with_capacity(self.data.len());
        window.extend_from_slice(&self.data[self.head..]);
        window.extend_from_slice(&self.data[..self.head]);
        window
    }

    /// Sample at `index`, 0 being the oldest
    pub fn get(&self, index: usize) -> Option<f64> {
        if index >= self.data.len() {
            return None;
        }
        Some(self.data[(self.head + index) % self.data.len()])
    }

    /// Most recent sample
    pub fn latest(&self) -> f64 {
        let len = self.data.len();
        self.data[(self.head + len - 1) % len]
    }

    /// Min and max over the newest `count` samples (clamped to capacity)
    pub fn recent_bounds(&self, count: usize) -> (f64, f64) {
        let len = self.data.len();
        let count = count.clamp(1, len);
        (len - count..len)
            .filter_map(|i| self.get(i))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn samples_since_trigger(&self) -> usize {
        self.since_trigger
    }

    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }
}

/// Whole number of samples spanning `seconds` at `sample_rate`
pub fn samples_for(seconds: f64, sample_rate: f64) -> usize {
    let n = (seconds * sample_rate).round();
    if n.is_finite() && n > 0.0 {
        n as usize
    } else {
        0
    }
}
