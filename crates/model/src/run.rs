//! Run record

use crate::MonitorId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique run identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Final outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    Success,
    Fail,
    Late,
    Missed,
    /// Run has started but not yet reported completion
    Started,
    Timeout,
}

impl RunOutcome {
    /// Whether this outcome represents a completed, successful execution
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }
}

/// A single execution of a monitored job.
///
/// Immutable once the outcome is finalized; `Started` is the only
/// non-terminal outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub monitor_id: MonitorId,
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds, when the job reported one
    pub duration_ms: Option<u64>,
    pub outcome: RunOutcome,
}

impl Run {
    pub fn new(monitor_id: MonitorId, outcome: RunOutcome, duration_ms: Option<u64>) -> Self {
        Self {
            id: RunId::new(),
            monitor_id,
            started_at: Utc::now(),
            duration_ms,
            outcome,
        }
    }
}
