//! Monitor health scoring
//!
//! Weighted score over a lookback window:
//! `0.4 * uptime + 0.3 * success rate + 0.3 * performance`, where uptime is
//! actual/expected runs, and performance penalizes duration inconsistency
//! (coefficient of variation). Clamped to [0, 100] and mapped to letter
//! grades by fixed breakpoints.

use crate::welford::MIN_SAMPLES;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Letter grade breakpoints: >=90 A, >=80 B, >=70 C, >=60 D, else F
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    fn from_score(score: u32) -> Self {
        match score {
            90.. => Grade::A,
            80..=89 => Grade::B,
            70..=79 => Grade::C,
            60..=69 => Grade::D,
            _ => Grade::F,
        }
    }
}

/// Inputs gathered over the lookback window
#[derive(Debug, Clone, Copy)]
pub struct HealthInput {
    /// Runs the schedule says should have happened (floored at 1 upstream)
    pub expected_runs: u64,
    /// Runs that actually happened
    pub actual_runs: u64,
    /// Runs that succeeded
    pub successful_runs: u64,
    /// Baseline duration statistics
    pub duration_count: u64,
    pub duration_mean: f64,
    pub duration_m2: f64,
}

/// Computed health score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    /// Weighted 0-100 score
    pub score: u32,
    pub uptime_pct: f64,
    pub success_rate_pct: f64,
    pub performance_pct: f64,
    pub grade: Grade,
}

pub fn calculate_health_score(input: &HealthInput) -> HealthScore {
    let uptime = if input.expected_runs > 0 {
        (input.actual_runs as f64 / input.expected_runs as f64) * 100.0
    } else {
        100.0
    };
    let uptime = uptime.clamp(0.0, 100.0);

    let success_rate = if input.actual_runs > 0 {
        (input.successful_runs as f64 / input.actual_runs as f64) * 100.0
    } else {
        100.0
    };

    // Performance: consistency of durations; only meaningful with a
    // confident baseline, otherwise assume perfect.
    let mut performance = 100.0;
    if input.duration_count >= MIN_SAMPLES && input.duration_mean > 0.0 {
        let variance = input.duration_m2 / input.duration_count as f64;
        let cv = variance.sqrt() / input.duration_mean;
        performance = (100.0 - cv * 100.0).clamp(0.0, 100.0);
    }

    let score = (0.4 * uptime + 0.3 * success_rate + 0.3 * performance)
        .round()
        .clamp(0.0, 100.0) as u32;

    HealthScore {
        score,
        uptime_pct: (uptime * 10.0).round() / 10.0,
        success_rate_pct: (success_rate * 10.0).round() / 10.0,
        performance_pct: (performance * 10.0).round() / 10.0,
        grade: Grade::from_score(score),
    }
}

/// Mean time between failures, in hours, over a monitor's lifetime
pub fn mtbf_hours(incident_openings: &[DateTime<Utc>], monitor_age_ms: i64) -> f64 {
    let age_hours = monitor_age_ms as f64 / 3_600_000.0;
    if incident_openings.is_empty() {
        return age_hours;
    }
    let mtbf = age_hours / incident_openings.len() as f64;
    (mtbf * 10.0).round() / 10.0
}

/// Mean time to resolution, in minutes, over resolved incidents
pub fn mttr_minutes(incidents: &[(DateTime<Utc>, Option<DateTime<Utc>>)]) -> f64 {
    let resolved: Vec<i64> = incidents
        .iter()
        .filter_map(|(opened, resolved)| resolved.map(|r| (r - *opened).num_milliseconds()))
        .collect();

    if resolved.is_empty() {
        return 0.0;
    }

    let avg_ms = resolved.iter().sum::<i64>() as f64 / resolved.len() as f64;
    (avg_ms / 60_000.0 * 10.0).round() / 10.0
}
