//! Per-condition metric history and median summaries

use crate::features::median;
use ppg_core::{ConditionId, MetricName, MetricSet, PpgError, PpgResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Append-only history of every metric recorded under one condition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionMetrics {
    series: BTreeMap<MetricName, Vec<f64>>,
}

impl ConditionMetrics {
    pub fn new() -> Self {
        Self {
            series: MetricName::ALL.iter().map(|&name| (name, Vec::new())).collect(),
        }
    }

    fn append(&mut self, metrics: &MetricSet) {
        for (name, value) in metrics.iter() {
            self.series.entry(name).or_default().push(value);
        }
    }

    /// Recorded values of one metric, oldest first
    pub fn values(&self, name: MetricName) -> &[f64] {
        self.series.get(&name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of metric sets recorded
    pub fn len(&self) -> usize {
        self.values(MetricName::Bpm).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Median of each metric; the zero sentinel when nothing is recorded
    pub fn median(&self) -> MetricSet {
        MetricSet::from_fn(|name| median(self.values(name)))
    }
}

/// Metric history keyed by experiment condition.
///
/// Conditions must be registered before anything is recorded under them.
/// Summaries are recomputed from the full history on every call.
#[derive(Debug, Clone, Default)]
pub struct ConditionAggregator {
    conditions: BTreeMap<ConditionId, ConditionMetrics>,
}

impl ConditionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregator with every condition in `conditions` registered
    pub fn with_conditions<I, C>(conditions: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ConditionId>,
    {
        let mut aggregator = Self::new();
        for condition in conditions {
            aggregator.register(condition.into());
        }
        aggregator
    }

    /// Create empty storage for `condition`; no-op if it already exists
    pub fn register(&mut self, condition: ConditionId) {
        self.conditions.entry(condition).or_insert_with(ConditionMetrics::new);
    }

    pub fn is_registered(&self, condition: &ConditionId) -> bool {
        self.conditions.contains_key(condition)
    }

    /// Append every value of `metrics` under `condition`
    pub fn record(&mut self, condition: &ConditionId, metrics: MetricSet) -> PpgResult<()> {
        let history = self
            .conditions
            .get_mut(condition)
            .ok_or_else(|| unknown(condition))?;
        history.append(&metrics);
        Ok(())
    }

    /// Median of each metric recorded so far under `condition`
    pub fn summary(&self, condition: &ConditionId) -> PpgResult<MetricSet> {
        self.conditions
            .get(condition)
            .map(ConditionMetrics::median)
            .ok_or_else(|| unknown(condition))
    }

    pub fn summary_all(&self) -> BTreeMap<ConditionId, MetricSet> {
        self.conditions
            .iter()
            .map(|(id, history)| (id.clone(), history.median()))
            .collect()
    }

    pub fn history(&self, condition: &ConditionId) -> PpgResult<&ConditionMetrics> {
        self.conditions.get(condition).ok_or_else(|| unknown(condition))
    }

    /// Full history copy, condition -> metric -> values
    pub fn export(&self) -> BTreeMap<ConditionId, ConditionMetrics> {
        self.conditions.clone()
    }

    /// Registered conditions in sorted order
    pub fn conditions(&self) -> impl Iterator<Item = &ConditionId> {
        self.conditions.keys()
    }

    /// Drop all recorded values, keeping registrations
    pub fn reset(&mut self) {
        for history in self.conditions.values_mut() {
            *history = ConditionMetrics::new();
        }
    }
}

fn unknown(condition: &ConditionId) -> PpgError {
    PpgError::UnknownCondition {
        condition: condition.to_string(),
    }
}

/// Axis bounds for one metric's bar chart
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

/// Per-metric display bounds that widen with new summaries and never shrink
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryScale {
    bounds: BTreeMap<MetricName, Bounds>,
}

impl SummaryScale {
    pub fn new() -> Self {
        Self {
            bounds: MetricName::ALL
                .iter()
                .map(|&name| (name, Bounds { min: 0.0, max: 0.1 }))
                .collect(),
        }
    }

    /// Widen each metric's bounds to cover every summary value
    pub fn update<'a>(&mut self, summaries: impl IntoIterator<Item = &'a MetricSet>) {
        for summary in summaries {
            for (name, value) in summary.iter() {
                if !value.is_finite() {
                    continue;
                }
                let bounds = self.bounds.entry(name).or_insert(Bounds { min: 0.0, max: 0.1 });
                if value <= bounds.min {
                    bounds.min = value;
                }
                if value >= bounds.max {
                    bounds.max = value;
                }
            }
        }
    }

    pub fn bounds(&self, name: MetricName) -> Bounds {
        self.bounds
            .get(&name)
            .copied()
            .unwrap_or(Bounds { min: 0.0, max: 0.1 })
    }
}

impl Default for SummaryScale {
    fn default() -> Self {
        Self::new()
    }
}
