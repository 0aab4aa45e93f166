//! Causal band-pass filtering for live PPG samples

use num_complex::Complex64;
use ppg_core::{config_error, PpgResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

/// Highest supported Butterworth order
pub const MAX_FILTER_ORDER: usize = 8;

/// Band-pass filter parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Low cutoff (Hz)
    pub low_cutoff: f64,
    /// High cutoff (Hz)
    pub high_cutoff: f64,
    /// Butterworth order (number of biquad sections)
    pub order: usize,
}

impl FilterConfig {
    /// Create bandpass filter configuration
    pub fn bandpass(low_cutoff: f64, high_cutoff: f64, order: usize) -> Self {
        Self {
            low_cutoff,
            high_cutoff,
            order,
        }
    }

    /// Reject cutoffs and orders that cannot be realised at `sample_rate`
    pub fn validate(&self, sample_rate: f64) -> PpgResult<()> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(config_error!("sample rate must be positive, got {}", sample_rate));
        }
        if self.order == 0 || self.order > MAX_FILTER_ORDER {
            return Err(config_error!(
                "filter order must be in 1..={}, got {}",
                MAX_FILTER_ORDER,
                self.order
            ));
        }
        if !self.low_cutoff.is_finite() || self.low_cutoff <= 0.0 {
            return Err(config_error!("low cutoff must be positive, got {}", self.low_cutoff));
        }
        if !self.high_cutoff.is_finite() || self.low_cutoff >= self.high_cutoff {
            return Err(config_error!(
                "low cutoff {} must be below high cutoff {}",
                self.low_cutoff,
                self.high_cutoff
            ));
        }
        let nyquist = sample_rate / 2.0;
        if self.high_cutoff >= nyquist {
            return Err(config_error!(
                "high cutoff {} must be below Nyquist frequency {}",
                self.high_cutoff,
                nyquist
            ));
        }
        Ok(())
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::bandpass(0.5, 5.0, 2)
    }
}

/// Single biquad section (2nd order)
#[derive(Debug, Clone)]
struct BiquadSection {
    // y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
    b0: f64, b1: f64, b2: f64,
    a1: f64, a2: f64,
    x1: f64, x2: f64,
    y1: f64, y2: f64,
}

impl BiquadSection {
    /// Band-pass section with zeros at DC and Nyquist and the given pole pair,
    /// scaled to unity gain at `center` (rad/sample).
    fn from_pole_pair(p: Complex64, q: Complex64, center: f64) -> Self {
        let a1 = -(p + q).re;
        let a2 = (p * q).re;

        let z1 = Complex64::from_polar(1.0, -center);
        let z2 = z1 * z1;
        let numerator = Complex64::new(1.0, 0.0) - z2;
        let denominator = Complex64::new(1.0, 0.0) + z1 * a1 + z2 * a2;
        let gain = denominator.norm() / numerator.norm();

        Self {
            b0: gain, b1: 0.0, b2: -gain,
            a1, a2,
            x1: 0.0, x2: 0.0,
            y1: 0.0, y2: 0.0,
        }
    }

    #[inline]
    fn process_sample(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1 - self.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    fn response(&self, omega: f64) -> Complex64 {
        let z1 = Complex64::from_polar(1.0, -omega);
        let z2 = z1 * z1;
        (z1 * self.b1 + z2 * self.b2 + self.b0) / (z1 * self.a1 + z2 * self.a2 + 1.0)
    }
}

/// Stateful Butterworth band-pass filter, one output per input.
///
/// Coefficients are designed once at construction; the delay line persists
/// across calls and is never reset. Build a new filter to start over.
#[derive(Debug, Clone)]
pub struct StreamFilter {
    config: FilterConfig,
    sample_rate: f64,
    sections: Vec<BiquadSection>,
}

impl StreamFilter {
    pub fn new(low_cutoff: f64, high_cutoff: f64, sample_rate: f64, order: usize) -> PpgResult<Self> {
        Self::from_config(FilterConfig::bandpass(low_cutoff, high_cutoff, order), sample_rate)
    }

    pub fn from_config(config: FilterConfig, sample_rate: f64) -> PpgResult<Self> {
        config.validate(sample_rate)?;
        let sections = design_bandpass(&config, sample_rate);
        debug!(
            low = config.low_cutoff,
            high = config.high_cutoff,
            order = config.order,
            sample_rate,
            "designed band-pass filter"
        );

        Ok(StreamFilter {
            config,
            sample_rate,
            sections,
        })
    }

    /// Filter one sample through all sections in series
    #[inline]
    pub fn apply(&mut self, sample: f64) -> f64 {
        let mut value = sample;
        for section in &mut self.sections {
            value = section.process_sample(value);
        }
        value
    }

    /// Magnitude response at `freq` Hz
    pub fn gain_at(&self, freq: f64) -> f64 {
        let omega = 2.0 * PI * freq / self.sample_rate;
        self.sections
            .iter()
            .map(|s| s.response(omega).norm())
            .product()
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }
}

/// Order-N Butterworth band-pass as N biquads via the bilinear transform
fn design_bandpass(config: &FilterConfig, fs: f64) -> Vec<BiquadSection> {
    let order = config.order;
    let fs2 = 2.0 * fs;

    // Pre-warp band edges
    let w_low = fs2 * (PI * config.low_cutoff / fs).tan();
    let w_high = fs2 * (PI * config.high_cutoff / fs).tan();
    let w0 = (w_low * w_high).sqrt();
    let bandwidth = w_high - w_low;
    let center = 2.0 * (w0 / fs2).atan();

    let bilinear = |s: Complex64| (Complex64::new(fs2, 0.0) + s) / (Complex64::new(fs2, 0.0) - s);

    let mut sections = Vec::with_capacity(order);
    for k in 0..order {
        let theta = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
        let prototype = Complex64::from_polar(1.0, theta);

        // Lowpass-to-bandpass: each prototype pole splits into two
        let half = prototype * (bandwidth / 2.0);
        let root = (half * half - w0 * w0).sqrt();
        let upper = bilinear(half + root);
        let lower = bilinear(half - root);

        if prototype.im.abs() < 1e-9 {
            sections.push(BiquadSection::from_pole_pair(upper, lower, center));
        } else if prototype.im > 0.0 {
            // Conjugate prototype pole yields the conjugates of these two
            sections.push(BiquadSection::from_pole_pair(upper, upper.conj(), center));
            sections.push(BiquadSection::from_pole_pair(lower, lower.conj(), center));
        }
    }

    sections
}
