//! Monitor record and schedule description

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique monitor identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorId(pub Uuid);

impl MonitorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MonitorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MonitorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Schedule definition for a monitored job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Schedule {
    /// Runs every `interval_sec` seconds
    Interval { interval_sec: u64 },
    /// Cron-style cadence; the expression is opaque to the core
    Cron { expr: String },
}

impl Schedule {
    /// Number of runs expected between `created_at` and `now`, floored at 1.
    ///
    /// Interval schedules are exact. Cron schedules are estimated at one run
    /// per day; parsing the expression is left to the scheduling layer.
    pub fn expected_runs(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
        let age_sec = (now - created_at).num_seconds().max(0) as u64;

        let expected = match self {
            Schedule::Interval { interval_sec } if *interval_sec > 0 => age_sec / interval_sec,
            Schedule::Interval { .. } => 0,
            Schedule::Cron { .. } => age_sec / 86_400,
        };

        expected.max(1)
    }
}

/// Externally maintained duration percentiles (read-only to the core)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Welford accumulator state persisted on the monitor record.
///
/// The shape `{count, mean, m2}` plus observed bounds lives here because it
/// is part of the stored Monitor; the baseline crate owns the update
/// algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BaselineStats {
    /// Number of successful runs folded in
    pub count: u64,
    /// Running mean duration (ms)
    pub mean: f64,
    /// Sum of squared deltas from the mean
    pub m2: f64,
    /// Smallest observed duration (ms)
    pub min: Option<f64>,
    /// Largest observed duration (ms)
    pub max: Option<f64>,
}

/// A monitored scheduled job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    pub id: MonitorId,
    pub name: String,
    pub schedule: Schedule,
    pub created_at: DateTime<Utc>,
    /// Running duration statistics; updated only by the baseline tracker
    pub baseline: BaselineStats,
    /// Precomputed percentiles, when the analytics layer maintains them
    pub percentiles: Option<Percentiles>,
}

impl Monitor {
    pub fn new(name: impl Into<String>, schedule: Schedule) -> Self {
        Self {
            id: MonitorId::new(),
            name: name.into(),
            schedule,
            created_at: Utc::now(),
            baseline: BaselineStats::default(),
            percentiles: None,
        }
    }
}
