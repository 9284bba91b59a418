//! Duration anomaly classification
//!
//! Detects silent performance degradation: a run that succeeded but took far
//! longer than the monitor's baseline. Classification is skipped (not an
//! error) when the baseline is not yet confident or has zero variance.

use crate::welford::{z_score, WelfordStats};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Classifier tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Z-score magnitude above which a duration is anomalous
    pub z_threshold: f64,
    /// Minimum baseline samples before classification applies
    pub min_samples: u64,
    /// Multiplier over the median that upgrades an anomaly to critical
    pub median_multiplier: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            z_threshold: 3.0,
            min_samples: crate::welford::MIN_SAMPLES,
            median_multiplier: 1.5,
        }
    }
}

/// How bad an anomalous duration is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalySeverity {
    Warning,
    Critical,
}

/// Outcome of classifying one successful run duration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyVerdict {
    pub is_anomaly: bool,
    pub severity: Option<AnomalySeverity>,
    /// Baseline mean the duration was compared against, rounded
    pub expected_ms: Option<f64>,
    pub actual_ms: f64,
    pub z_score: Option<f64>,
    pub message: Option<String>,
}

impl AnomalyVerdict {
    fn normal(actual_ms: f64) -> Self {
        Self {
            is_anomaly: false,
            severity: None,
            expected_ms: None,
            actual_ms,
            z_score: None,
            message: None,
        }
    }
}

/// Classify a successful run duration against the monitor's baseline.
///
/// Rules, checked in order:
/// 1. Baseline not confident or zero variance: not applicable, skipped.
/// 2. `|z| > threshold` and duration above `median * multiplier`: critical.
/// 3. `|z| > threshold` alone: warning.
/// 4. Duration above `mean + threshold * stddev`: warning (slow degradation
///    that an absolute bound catches even when z stays within range).
pub fn classify_duration(
    stats: &WelfordStats,
    median_ms: Option<f64>,
    duration_ms: f64,
    config: &AnomalyConfig,
) -> AnomalyVerdict {
    if stats.count() < config.min_samples {
        debug!(
            count = stats.count(),
            min = config.min_samples,
            "baseline not confident yet, skipping anomaly check"
        );
        return AnomalyVerdict::normal(duration_ms);
    }

    let Some(stddev) = stats.stddev().filter(|s| *s > 0.0) else {
        return AnomalyVerdict::normal(duration_ms);
    };
    let mean = stats.mean();

    let z = z_score(duration_ms, mean, stddev);
    let z_outlier = z.map_or(false, |z| z.abs() > config.z_threshold);
    let median_outlier =
        median_ms.map_or(false, |median| duration_ms > median * config.median_multiplier);

    if z_outlier && median_outlier {
        let z = z.unwrap_or_default();
        return AnomalyVerdict {
            is_anomaly: true,
            severity: Some(AnomalySeverity::Critical),
            expected_ms: Some(mean.round()),
            actual_ms: duration_ms,
            z_score: Some(z),
            message: Some(format!(
                "Job took {duration_ms:.0}ms ({:.1} stddev from mean). Expected ~{:.0}ms.",
                z.abs(),
                mean
            )),
        };
    }

    if z_outlier {
        let z = z.unwrap_or_default();
        return AnomalyVerdict {
            is_anomaly: true,
            severity: Some(AnomalySeverity::Warning),
            expected_ms: Some(mean.round()),
            actual_ms: duration_ms,
            z_score: Some(z),
            message: Some(format!(
                "Job took {duration_ms:.0}ms, {:.1} standard deviations from mean ({:.0}ms).",
                z.abs(),
                mean
            )),
        };
    }

    let upper_bound = mean + config.z_threshold * stddev;
    if duration_ms > upper_bound {
        return AnomalyVerdict {
            is_anomaly: true,
            severity: Some(AnomalySeverity::Warning),
            expected_ms: Some(mean.round()),
            actual_ms: duration_ms,
            z_score: z,
            message: Some(format!(
                "Job took {duration_ms:.0}ms, above the expected range ({upper_bound:.0}ms threshold)."
            )),
        };
    }

    AnomalyVerdict::normal(duration_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confident_stats(durations: &[f64]) -> WelfordStats {
        let mut stats = WelfordStats::default();
        for &d in durations {
            stats.update(d);
        }
        stats
    }

    // 10 samples around 100ms, stddev ~5
    fn baseline() -> WelfordStats {
        confident_stats(&[95.0, 100.0, 105.0, 98.0, 102.0, 97.0, 103.0, 99.0, 101.0, 100.0])
    }

    #[test]
    fn test_skips_below_min_samples() {
        let stats = confident_stats(&[100.0, 500.0]);
        let verdict = classify_duration(&stats, None, 10_000.0, &AnomalyConfig::default());
        assert!(!verdict.is_anomaly);
    }

    #[test]
    fn test_skips_zero_variance() {
        let stats = confident_stats(&[100.0; 12]);
        let verdict = classify_duration(&stats, Some(100.0), 10_000.0, &AnomalyConfig::default());
        assert!(!verdict.is_anomaly);
    }

    #[test]
    fn test_normal_duration_passes() {
        let verdict = classify_duration(&baseline(), Some(100.0), 104.0, &AnomalyConfig::default());
        assert!(!verdict.is_anomaly);
    }

    #[test]
    fn test_critical_when_z_and_median_fire() {
        let verdict = classify_duration(&baseline(), Some(100.0), 400.0, &AnomalyConfig::default());
        assert!(verdict.is_anomaly);
        assert_eq!(verdict.severity, Some(AnomalySeverity::Critical));
        assert!(verdict.z_score.unwrap() > 3.0);
        assert!(verdict.message.is_some());
    }

    #[test]
    fn test_warning_when_only_z_fires() {
        // 115ms: far in stddev terms but under median * 1.5 = 150ms
        let verdict = classify_duration(&baseline(), Some(100.0), 115.0, &AnomalyConfig::default());
        assert!(verdict.is_anomaly);
        assert_eq!(verdict.severity, Some(AnomalySeverity::Warning));
    }

    #[test]
    fn test_no_median_still_warns() {
        let verdict = classify_duration(&baseline(), None, 400.0, &AnomalyConfig::default());
        assert!(verdict.is_anomaly);
        assert_eq!(verdict.severity, Some(AnomalySeverity::Warning));
    }
}
