//! HRV metric schema

use serde::{Deserialize, Serialize};
use std::fmt;

/// Recognized HRV metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricName {
    /// Beats per minute
    Bpm,
    /// Standard deviation of RR intervals (ms)
    Sdnn,
    /// Standard deviation of successive RR differences (ms)
    Sdsd,
    /// Mean inter-beat interval (ms)
    Ibi,
    /// Root mean square of successive differences (ms)
    Rmssd,
    /// Fraction of successive differences above 50ms
    Pnn50,
}

impl MetricName {
    /// All metrics, in display order
    pub const ALL: [MetricName; 6] = [
        MetricName::Bpm,
        MetricName::Sdnn,
        MetricName::Sdsd,
        MetricName::Ibi,
        MetricName::Rmssd,
        MetricName::Pnn50,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::Bpm => "bpm",
            MetricName::Sdnn => "sdnn",
            MetricName::Sdsd => "sdsd",
            MetricName::Ibi => "ibi",
            MetricName::Rmssd => "rmssd",
            MetricName::Pnn50 => "pnn50",
        }
    }

    /// Axis label used by chart front-ends
    pub fn label(&self) -> &'static str {
        match self {
            MetricName::Bpm => "Pulse Rate",
            MetricName::Sdnn => "SDNN",
            MetricName::Sdsd => "SDSD",
            MetricName::Ibi => "IBI",
            MetricName::Rmssd => "RMSSD",
            MetricName::Pnn50 => "pNN50",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extraction result. Fixed schema, immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricSet {
    pub bpm: f64,
    pub sdnn: f64,
    pub sdsd: f64,
    pub ibi: f64,
    pub rmssd: f64,
    pub pnn50: f64,
}

impl MetricSet {
    /// Sentinel shown when a condition has no recordings yet
    pub const fn zero() -> Self {
        MetricSet {
            bpm: 0.0,
            sdnn: 0.0,
            sdsd: 0.0,
            ibi: 0.0,
            rmssd: 0.0,
            pnn50: 0.0,
        }
    }

    /// Build a set from a per-metric function
    pub fn from_fn(mut f: impl FnMut(MetricName) -> f64) -> Self {
        MetricSet {
            bpm: f(MetricName::Bpm),
            sdnn: f(MetricName::Sdnn),
            sdsd: f(MetricName::Sdsd),
            ibi: f(MetricName::Ibi),
            rmssd: f(MetricName::Rmssd),
            pnn50: f(MetricName::Pnn50),
        }
    }

    pub fn get(&self, name: MetricName) -> f64 {
        match name {
            MetricName::Bpm => self.bpm,
            MetricName::Sdnn => self.sdnn,
            MetricName::Sdsd => self.sdsd,
            MetricName::Ibi => self.ibi,
            MetricName::Rmssd => self.rmssd,
            MetricName::Pnn50 => self.pnn50,
        }
    }

    /// Iterate `(name, value)` pairs in display order
    pub fn iter(&self) -> impl Iterator<Item = (MetricName, f64)> + '_ {
        MetricName::ALL.iter().map(move |&name| (name, self.get(name)))
    }

    /// True when every value is finite
    pub fn is_finite(&self) -> bool {
        self.iter().all(|(_, v)| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_lookup() {
        let set = MetricSet {
            bpm: 72.0,
            sdnn: 40.0,
            sdsd: 20.0,
            ibi: 833.0,
            rmssd: 25.0,
            pnn50: 0.1,
        };
        assert_eq!(set.get(MetricName::Bpm), 72.0);
        assert_eq!(set.get(MetricName::Pnn50), 0.1);

        let names: Vec<MetricName> = set.iter().map(|(n, _)| n).collect();
        assert_eq!(names, MetricName::ALL.to_vec());
        assert!(set.is_finite());
    }

    #[test]
    fn test_from_fn_matches_get() {
        let set = MetricSet::from_fn(|name| name as u8 as f64);
        for name in MetricName::ALL {
            assert_eq!(set.get(name), name as u8 as f64);
        }
    }

    #[test]
    fn test_zero_sentinel() {
        assert_eq!(MetricSet::zero(), MetricSet::default());
        assert!(MetricSet::zero().iter().all(|(_, v)| v == 0.0));
    }

    #[test]
    fn test_metric_name_serialization() {
        let json = serde_json::to_string(&MetricName::Pnn50).unwrap();
        assert_eq!(json, "\"pnn50\"");
        let name: MetricName = serde_json::from_str("\"rmssd\"").unwrap();
        assert_eq!(name, MetricName::Rmssd);
    }
}
