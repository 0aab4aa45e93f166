//! HRV feature extraction over rolling-buffer windows

use ppg_core::{AnalysisError, MetricSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Peak-detection and metric routine applied to one window
pub trait HrvAnalyzer: Send + Sync {
    /// Compute HRV metrics for `window` sampled at `sample_rate` Hz
    fn compute_metrics(&self, window: &[f64], sample_rate: f64) -> Result<MetricSet, AnalysisError>;

    /// Analyzer name for logging
    fn name(&self) -> &str {
        "hrv"
    }
}

/// Tuning for the peak-based analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrvConfig {
    /// Rolling-mean window used as the detection threshold (s)
    pub rolling_window_secs: f64,
    /// Threshold offset above the rolling mean, as a fraction of signal std
    pub threshold_std_fraction: f64,
    /// Shortest window worth analysing (s)
    pub min_window_secs: f64,
    /// Plausible heart-rate range (bpm)
    pub min_bpm: f64,
    pub max_bpm: f64,
    /// RR intervals further than this fraction from the median are rejected
    pub rr_tolerance: f64,
    /// Minimum peaks required
    pub min_peaks: usize,
    /// Minimum accepted RR intervals required
    pub min_intervals: usize,
}

impl Default for HrvConfig {
    fn default() -> Self {
        Self {
            rolling_window_secs: 0.75,
            threshold_std_fraction: 0.0,
            min_window_secs: 4.0,
            min_bpm: 40.0,
            max_bpm: 180.0,
            rr_tolerance: 0.3,
            min_peaks: 4,
            min_intervals: 3,
        }
    }
}

/// Rolling-mean threshold peak detector with RR outlier rejection
#[derive(Debug, Clone, Default)]
pub struct PeakHrvAnalyzer {
    config: HrvConfig,
}

impl PeakHrvAnalyzer {
    pub fn new() -> Self {
        Self::with_config(HrvConfig::default())
    }

    pub fn with_config(config: HrvConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HrvConfig {
        &self.config
    }

    /// Fractional sample positions of detected beats
    pub fn detect_peaks(&self, window: &[f64], sample_rate: f64) -> Vec<f64> {
        let n = window.len();
        if n < 3 {
            return Vec::new();
        }

        let spread = std_dev(window);
        if spread < 1e-12 {
            return Vec::new();
        }

        let half = ((self.config.rolling_window_secs * sample_rate).round() as usize / 2).max(1);
        let rolling = centered_mean(window, half);
        let offset = self.config.threshold_std_fraction * spread;

        // Maximum of each region above the threshold
        let mut candidates: Vec<(usize, f64)> = Vec::new();
        let mut start: Option<usize> = None;
        for i in 0..=n {
            let above = i < n && window[i] > rolling[i] + offset;
            match (above, start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    // Regions cut off by the window edges hold truncated beats
                    if s > 0 && i < n {
                        if let Some(peak) = argmax(&window[s..i]).map(|p| p + s) {
                            candidates.push((peak, window[peak]));
                        }
                    }
                    start = None;
                }
                _ => {}
            }
        }

        // Refractory period: keep the taller of two peaks closer than the max rate allows
        let min_distance = 60.0 / self.config.max_bpm * sample_rate;
        let mut peaks: Vec<(usize, f64)> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match peaks.last_mut() {
                Some(last) if ((candidate.0 - last.0) as f64) < min_distance => {
                    if candidate.1 > last.1 {
                        *last = candidate;
                    }
                }
                _ => peaks.push(candidate),
            }
        }

        peaks
            .into_iter()
            .map(|(i, _)| i as f64 + parabolic_offset(window, i))
            .collect()
    }
}

impl HrvAnalyzer for PeakHrvAnalyzer {
    fn compute_metrics(&self, window: &[f64], sample_rate: f64) -> Result<MetricSet, AnalysisError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(AnalysisError::InvalidSampleRate { rate: sample_rate });
        }

        let required = (self.config.min_window_secs * sample_rate).ceil() as usize;
        if window.len() < required.max(3) {
            return Err(AnalysisError::WindowTooShort {
                len: window.len(),
                required: required.max(3),
            });
        }

        let peaks = self.detect_peaks(window, sample_rate);
        if peaks.len() < self.config.min_peaks {
            return Err(AnalysisError::InsufficientPeaks {
                found: peaks.len(),
                required: self.config.min_peaks,
            });
        }

        let rr: Vec<f64> = peaks
            .windows(2)
            .map(|w| (w[1] - w[0]) / sample_rate * 1000.0)
            .collect();

        let min_rr = 60_000.0 / self.config.max_bpm;
        let max_rr = 60_000.0 / self.config.min_bpm;
        let center = median(&rr);
        let tolerance = self.config.rr_tolerance * center;
        let accepted: Vec<bool> = rr
            .iter()
            .map(|&x| x >= min_rr && x <= max_rr && (x - center).abs() <= tolerance)
            .collect();

        let kept: Vec<f64> = rr
            .iter()
            .zip(&accepted)
            .filter(|(_, ok)| **ok)
            .map(|(&x, _)| x)
            .collect();

        // Successive differences only between adjacent accepted intervals
        let diffs: Vec<f64> = rr
            .windows(2)
            .zip(accepted.windows(2))
            .filter(|(_, ok)| ok[0] && ok[1])
            .map(|(pair, _)| pair[1] - pair[0])
            .collect();

        if kept.len() < self.config.min_intervals || diffs.is_empty() {
            return Err(AnalysisError::InsufficientIntervals {
                found: kept.len(),
                required: self.config.min_intervals,
            });
        }

        let ibi = mean(&kept);
        let abs_diffs: Vec<f64> = diffs.iter().map(|d| d.abs()).collect();

        Ok(MetricSet {
            bpm: 60_000.0 / ibi,
            ibi,
            sdnn: std_dev(&kept),
            sdsd: std_dev(&abs_diffs),
            rmssd: (diffs.iter().map(|d| d * d).sum::<f64>() / diffs.len() as f64).sqrt(),
            pnn50: abs_diffs.iter().filter(|&&d| d > 50.0).count() as f64 / abs_diffs.len() as f64,
        })
    }

    fn name(&self) -> &str {
        "peak-hrv"
    }
}

/// Runs the HRV routine over window snapshots.
///
/// Cadence comes from the rolling buffer's trigger; failures are returned to
/// the caller, which skips the window.
#[derive(Clone)]
pub struct FeatureExtractor {
    analyzer: Arc<dyn HrvAnalyzer>,
}

impl FeatureExtractor {
    pub fn new(analyzer: Arc<dyn HrvAnalyzer>) -> Self {
        Self { analyzer }
    }

    pub fn extract(&self, window: &[f64], sample_rate: f64) -> Result<MetricSet, AnalysisError> {
        let metrics = self.analyzer.compute_metrics(window, sample_rate)?;
        if !metrics.is_finite() {
            return Err(AnalysisError::NonFiniteMetrics);
        }
        Ok(metrics)
    }

    pub fn analyzer_name(&self) -> &str {
        self.analyzer.name()
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(Arc::new(PeakHrvAnalyzer::new()))
    }
}

impl std::fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("analyzer", &self.analyzer.name())
            .finish()
    }
}

fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation
fn std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    (data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64).sqrt()
}

/// Median with the two middle values averaged on even lengths; 0.0 when empty
pub fn median(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn centered_mean(data: &[f64], half: usize) -> Vec<f64> {
    let mut prefix = Vec::with_capacity(data.len() + 1);
    prefix.push(0.0);
    for &x in data {
        prefix.push(prefix[prefix.len() - 1] + x);
    }

    (0..data.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(data.len());
            (prefix[hi] - prefix[lo]) / (hi - lo) as f64
        })
        .collect()
}

fn argmax(data: &[f64]) -> Option<usize> {
    data.iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

/// Sub-sample peak offset from a parabola through the three samples around `i`
fn parabolic_offset(data: &[f64], i: usize) -> f64 {
    if i == 0 || i + 1 >= data.len() {
        return 0.0;
    }
    let (left, mid, right) = (data[i - 1], data[i], data[i + 1]);
    let denom = left - 2.0 * mid + right;
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn pulse_train(bpm: f64, fs: f64, secs: f64) -> Vec<f64> {
        let n = (secs * fs) as usize;
        let freq = bpm / 60.0;
        (0..n).map(|i| (2.0 * PI * freq * i as f64 / fs).sin()).collect()
    }

    /// Beats at explicit times, each a narrow Gaussian bump
    fn beats_at(times: &[f64], fs: f64, secs: f64) -> Vec<f64> {
        let n = (secs * fs) as usize;
        (0..n)
            .map(|i| {
                let t = i as f64 / fs;
                times
                    .iter()
                    .map(|&b| (-((t - b) / 0.08).powi(2)).exp())
                    .sum()
            })
            .collect()
    }

    #[test]
    fn test_regular_pulse_metrics() {
        let analyzer = PeakHrvAnalyzer::new();
        let window = pulse_train(75.0, 40.0, 20.0);

        let metrics = analyzer.compute_metrics(&window, 40.0).unwrap();
        assert!((metrics.bpm - 75.0).abs() < 0.5, "bpm {}", metrics.bpm);
        assert!((metrics.ibi - 800.0).abs() < 5.0, "ibi {}", metrics.ibi);
        assert!(metrics.sdnn < 5.0);
        assert!(metrics.rmssd < 5.0);
        assert_eq!(metrics.pnn50, 0.0);
    }

    #[test]
    fn test_alternating_intervals() {
        // RR alternates 800ms / 900ms
        let mut times = Vec::new();
        let mut t = 0.5;
        for i in 0..24 {
            times.push(t);
            t += if i % 2 == 0 { 0.8 } else { 0.9 };
        }
        let window = beats_at(&times, 100.0, 20.0);

        let metrics = PeakHrvAnalyzer::new().compute_metrics(&window, 100.0).unwrap();
        assert!((metrics.ibi - 850.0).abs() < 10.0, "ibi {}", metrics.ibi);
        assert!((metrics.sdnn - 50.0).abs() < 5.0, "sdnn {}", metrics.sdnn);
        assert!((metrics.rmssd - 100.0).abs() < 10.0, "rmssd {}", metrics.rmssd);
        assert!(metrics.sdsd < 10.0, "sdsd {}", metrics.sdsd);
        assert_eq!(metrics.pnn50, 1.0);
    }

    #[test]
    fn test_flat_window_has_no_peaks() {
        let window = vec![50.0; 800];
        let result = PeakHrvAnalyzer::new().compute_metrics(&window, 40.0);
        assert!(matches!(result, Err(AnalysisError::InsufficientPeaks { found: 0, .. })));
    }

    #[test]
    fn test_short_window_rejected() {
        let window = pulse_train(60.0, 40.0, 2.0);
        let result = PeakHrvAnalyzer::new().compute_metrics(&window, 40.0);
        assert!(matches!(result, Err(AnalysisError::WindowTooShort { len: 80, required: 160 })));
    }

    #[test]
    fn test_invalid_sample_rate() {
        let window = pulse_train(60.0, 40.0, 10.0);
        let result = PeakHrvAnalyzer::new().compute_metrics(&window, 0.0);
        assert!(matches!(result, Err(AnalysisError::InvalidSampleRate { .. })));
    }

    #[test]
    fn test_refractory_merges_close_peaks() {
        let analyzer = PeakHrvAnalyzer::new();
        // Two bumps 250ms apart count as one beat
        let window = beats_at(&[1.0, 1.25, 2.0, 3.0], 100.0, 4.0);
        let peaks = analyzer.detect_peaks(&window, 100.0);
        assert_eq!(peaks.len(), 3);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[60.0, 80.0, 70.0]), 70.0);
        assert_eq!(median(&[1.0, 4.0, 2.0, 3.0]), 2.5);
    }

    struct BrokenAnalyzer;

    impl HrvAnalyzer for BrokenAnalyzer {
        fn compute_metrics(&self, _: &[f64], _: f64) -> Result<MetricSet, AnalysisError> {
            Ok(MetricSet { bpm: f64::NAN, ..MetricSet::zero() })
        }
    }

    #[test]
    fn test_extractor_rejects_non_finite_metrics() {
        let extractor = FeatureExtractor::new(Arc::new(BrokenAnalyzer));
        assert_eq!(
            extractor.extract(&[0.0; 10], 40.0),
            Err(AnalysisError::NonFiniteMetrics)
        );
        assert_eq!(extractor.analyzer_name(), "hrv");
    }

    #[test]
    fn test_default_extractor_delegates() {
        let extractor = FeatureExtractor::default();
        let window = pulse_train(60.0, 40.0, 20.0);
        let metrics = extractor.extract(&window, 40.0).unwrap();
        assert!((metrics.bpm - 60.0).abs() < 0.5);
        assert_eq!(extractor.analyzer_name(), "peak-hrv");
    }
}
