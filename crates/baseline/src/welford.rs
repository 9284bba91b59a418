//! Welford's online algorithm over monitor baseline fields
//!
//! Single-pass, numerically stable running mean and variance. State lives on
//! the Monitor record (`model::BaselineStats`); this module owns the update
//! and derived quantities.

use model::BaselineStats;

/// Minimum successful runs before the baseline is considered confident.
///
/// Below this, anomaly checks are skipped entirely to avoid false positives
/// on new monitors.
pub const MIN_SAMPLES: u64 = 10;

/// View over `BaselineStats` exposing the Welford update and derived values
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WelfordStats(pub BaselineStats);

impl WelfordStats {
    pub fn from_stats(stats: BaselineStats) -> Self {
        Self(stats)
    }

    pub fn into_stats(self) -> BaselineStats {
        self.0
    }

    /// Fold one successful run duration into the baseline.
    ///
    /// Callers must apply updates for the same monitor serially; see
    /// `BaselineBook`.
    pub fn update(&mut self, duration_ms: f64) {
        let s = &mut self.0;
        s.count += 1;
        let delta = duration_ms - s.mean;
        s.mean += delta / s.count as f64;
        let delta2 = duration_ms - s.mean;
        s.m2 += delta * delta2;

        s.min = Some(s.min.map_or(duration_ms, |m| m.min(duration_ms)));
        s.max = Some(s.max.map_or(duration_ms, |m| m.max(duration_ms)));
    }

    /// Population variance (`m2 / count`); requires at least two samples
    pub fn variance(&self) -> Option<f64> {
        if self.0.count >= 2 {
            Some(self.0.m2 / self.0.count as f64)
        } else {
            None
        }
    }

    pub fn stddev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }

    pub fn mean(&self) -> f64 {
        self.0.mean
    }

    pub fn count(&self) -> u64 {
        self.0.count
    }

    /// Whether enough samples have accumulated for anomaly checks
    pub fn is_confident(&self) -> bool {
        self.0.count >= MIN_SAMPLES
    }
}

/// Z-score of a value against a baseline; `None` when stddev is zero or NaN
pub fn z_score(value: f64, mean: f64, stddev: f64) -> Option<f64> {
    if stddev == 0.0 || stddev.is_nan() {
        return None;
    }
    Some((value - mean) / stddev)
}

/// Median of a set of values; `None` on empty input
pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// Linear-interpolated percentile (0-100) of a set of values
pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=100.0).contains(&pct) {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let index = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;
    let weight = index - lower as f64;

    if lower == upper {
        Some(sorted[lower])
    } else {
        Some(sorted[lower] * (1.0 - weight) + sorted[upper] * weight)
    }
}
