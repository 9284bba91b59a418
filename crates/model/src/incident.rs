//! Incident record and lifecycle enums

use crate::MonitorId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique incident identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncidentId(pub Uuid);

impl IncidentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IncidentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IncidentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// What kind of failure the incident reports.
///
/// Closed enum: suppression and dispatch logic match on it exhaustively so a
/// new kind is a compile-time-checked addition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentKind {
    Fail,
    Missed,
    Late,
    Anomaly,
    Degraded,
}

impl IncidentKind {
    /// Kinds whose upstream occurrence suppresses downstream incidents
    pub fn cascades(&self) -> bool {
        match self {
            IncidentKind::Fail | IncidentKind::Missed | IncidentKind::Late => true,
            IncidentKind::Anomaly | IncidentKind::Degraded => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentKind::Fail => "FAIL",
            IncidentKind::Missed => "MISSED",
            IncidentKind::Late => "LATE",
            IncidentKind::Anomaly => "ANOMALY",
            IncidentKind::Degraded => "DEGRADED",
        }
    }
}

/// Incident lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    Open,
    Acked,
    Resolved,
}

impl IncidentStatus {
    /// Open and Acked incidents count for deduplication and cascades
    pub fn is_active(&self) -> bool {
        matches!(self, IncidentStatus::Open | IncidentStatus::Acked)
    }
}

/// Incident severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A user-visible (or suppressed) incident for one monitor.
///
/// Created by the lifecycle manager; transitioned to Acked/Resolved by user
/// action or by upstream resolution. Never deleted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    pub monitor_id: MonitorId,
    pub kind: IncidentKind,
    pub status: IncidentStatus,
    pub severity: Severity,
    pub summary: String,
    /// Typed causal link to the upstream incident that suppressed this one
    pub caused_by: Option<IncidentId>,
    /// Downstream monitors named by a composite root-cause incident
    pub affected_downstream: Vec<MonitorId>,
    /// Z-score that triggered an anomaly incident
    pub z_score: Option<f64>,
    pub opened_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// While set, alert dispatch for this incident is withheld
    pub suppress_until: Option<DateTime<Utc>>,
}

impl Incident {
    pub fn open(monitor_id: MonitorId, kind: IncidentKind, severity: Severity, summary: impl Into<String>) -> Self {
        Self {
            id: IncidentId::new(),
            monitor_id,
            kind,
            status: IncidentStatus::Open,
            severity,
            summary: summary.into(),
            caused_by: None,
            affected_downstream: Vec::new(),
            z_score: None,
            opened_at: Utc::now(),
            acknowledged_at: None,
            resolved_at: None,
            suppress_until: None,
        }
    }

    /// Whether the incident still counts as active for dedup/cascade checks
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}
