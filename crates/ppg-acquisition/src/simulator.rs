//! Synthetic PPG device for development and tests

use crate::device::SampleSource;
use ppg_core::{config_error, PpgError, PpgResult};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::time::{Duration, Instant};

/// Configuration for the simulated pulse sensor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Output rate in Hz
    pub sample_rate: f64,
    /// Mean heart rate (bpm)
    pub heart_rate_bpm: f64,
    /// Beat-to-beat heart-rate standard deviation (bpm)
    pub heart_rate_jitter_bpm: f64,
    /// ADC level with no pulse
    pub baseline: f64,
    /// Systolic peak height above baseline
    pub amplitude: f64,
    /// Gaussian noise standard deviation
    pub noise_std: f64,
    /// Respiratory baseline wander amplitude and frequency (Hz)
    pub wander_amplitude: f64,
    pub wander_freq: f64,
    /// Probability that a read yields a garbled line
    pub garble_probability: f64,
    /// Block each read until the next sample is due
    pub realtime: bool,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 40.0,
            heart_rate_bpm: 72.0,
            heart_rate_jitter_bpm: 2.0,
            baseline: 512.0,
            amplitude: 80.0,
            noise_std: 1.5,
            wander_amplitude: 12.0,
            wander_freq: 0.25,
            garble_probability: 0.0,
            realtime: true,
            seed: None,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> PpgResult<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(config_error!("simulator sample rate must be positive, got {}", self.sample_rate));
        }
        if !(20.0..=250.0).contains(&self.heart_rate_bpm) {
            return Err(config_error!("simulated heart rate {} bpm out of range", self.heart_rate_bpm));
        }
        if !self.heart_rate_jitter_bpm.is_finite() || self.heart_rate_jitter_bpm < 0.0 {
            return Err(config_error!("heart-rate jitter must be non-negative"));
        }
        if !self.noise_std.is_finite() || self.noise_std < 0.0 {
            return Err(config_error!("noise std must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.garble_probability) {
            return Err(config_error!(
                "garble probability must be within [0, 1], got {}",
                self.garble_probability
            ));
        }
        Ok(())
    }
}

/// Pulse-wave generator implementing [`SampleSource`]
pub struct PpgSimulator {
    config: SimulatorConfig,
    rng: rand::rngs::StdRng,
    noise: Normal<f64>,
    beat_rate: Normal<f64>,
    // Position within the current beat, 0..1
    phase: f64,
    current_bpm: f64,
    sample_index: u64,
    next_due: Option<Instant>,
}

impl PpgSimulator {
    pub fn new(config: SimulatorConfig) -> PpgResult<Self> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default()
        });

        let noise = Normal::new(0.0, config.noise_std)
            .map_err(|e| config_error!("invalid noise distribution: {}", e))?;
        let beat_rate = Normal::new(config.heart_rate_bpm, config.heart_rate_jitter_bpm)
            .map_err(|e| config_error!("invalid heart-rate distribution: {}", e))?;

        Ok(PpgSimulator {
            current_bpm: config.heart_rate_bpm,
            config,
            rng: rand::rngs::StdRng::seed_from_u64(seed),
            noise,
            beat_rate,
            phase: 0.0,
            sample_index: 0,
            next_due: None,
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Samples generated so far, garbled ones included
    pub fn samples_generated(&self) -> u64 {
        self.sample_index
    }

    /// Next waveform value, advancing the simulation by one sample period
    pub fn next_value(&mut self) -> f64 {
        let fs = self.config.sample_rate;
        let t = self.sample_index as f64 / fs;

        let mut value = self.config.baseline + self.config.amplitude * pulse_shape(self.phase);
        value += self.config.wander_amplitude * (2.0 * PI * self.config.wander_freq * t).sin();
        value += self.noise.sample(&mut self.rng);

        self.phase += self.current_bpm / 60.0 / fs;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
            self.current_bpm = self.beat_rate.sample(&mut self.rng).clamp(30.0, 200.0);
        }
        self.sample_index += 1;

        value
    }

    fn wait_until_due(&mut self) {
        let period = Duration::from_secs_f64(1.0 / self.config.sample_rate);
        let now = Instant::now();
        if let Some(due) = self.next_due {
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        self.next_due = Some(self.next_due.map_or(now, |due| due.max(now)) + period);
    }
}

impl SampleSource for PpgSimulator {
    fn read_next(&mut self) -> PpgResult<f64> {
        if self.config.realtime {
            self.wait_until_due();
        }

        let value = self.next_value();
        if self.config.garble_probability > 0.0 && self.rng.gen::<f64>() < self.config.garble_probability {
            return Err(PpgError::Parse {
                line: format!("{:.0}\u{fffd}", value),
            });
        }
        Ok(value.round())
    }

    fn describe(&self) -> String {
        format!("simulator ({} bpm @ {} Hz)", self.config.heart_rate_bpm, self.config.sample_rate)
    }
}

/// Systolic peak followed by a smaller dicrotic wave, one beat over phase 0..1
fn pulse_shape(phase: f64) -> f64 {
    let gauss = |center: f64, width: f64| (-0.5 * ((phase - center) / width).powi(2)).exp();
    gauss(0.15, 0.07) + 0.25 * gauss(0.45, 0.08)
}
