//! Monitor dependency edge

use crate::MonitorId;
use serde::{Deserialize, Serialize};

/// Directed dependency edge: `monitor_id` depends on `depends_on`.
///
/// The edge set over all monitors must remain acyclic; the graph engine
/// rejects inserts that would close a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitorDependency {
    pub monitor_id: MonitorId,
    pub depends_on: MonitorId,
    /// Only required dependencies participate in cascade suppression
    pub required: bool,
}

impl MonitorDependency {
    pub fn required(monitor_id: MonitorId, depends_on: MonitorId) -> Self {
        Self {
            monitor_id,
            depends_on,
            required: true,
        }
    }

    pub fn optional(monitor_id: MonitorId, depends_on: MonitorId) -> Self {
        Self {
            monitor_id,
            depends_on,
            required: false,
        }
    }
}
