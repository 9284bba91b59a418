//! Graph engine over the persistence seam
//!
//! Wraps the pure graph algorithms with the bulk loads they need and the
//! incident queries behind cascade suppression.

use crate::graph::{ChainNode, DependencyGraph, Downstream};
use chrono::{Duration, Utc};
use model::{IncidentId, MonitorDependency, MonitorId};
use std::collections::HashMap;
use std::sync::Arc;
use storage::{Repository, StorageError};
use thiserror::Error;
use tracing::{debug, info};

/// Default window for "is some required upstream currently failing?"
pub const DEFAULT_LOOKBACK_MINUTES: i64 = 60;

/// Graph engine errors
#[derive(Debug, Error)]
pub enum GraphError {
    /// Proposed edge would close a cycle; a validation failure, not a fault
    #[error("dependency {from} -> {to} would create a cycle")]
    CycleDetected { from: MonitorId, to: MonitorId },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Why a downstream incident is being suppressed
#[derive(Debug, Clone, PartialEq)]
pub struct SuppressionCause {
    pub upstream_monitor: MonitorId,
    pub upstream_name: String,
    pub incident_id: IncidentId,
    pub reason: String,
}

/// Async facade over the dependency graph
#[derive(Clone)]
pub struct GraphEngine {
    repo: Arc<dyn Repository>,
}

impl GraphEngine {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Bulk-load edges and names into an adjacency snapshot
    async fn snapshot(&self) -> Result<DependencyGraph, GraphError> {
        let edges = self.repo.list_dependencies().await?;
        let names: HashMap<MonitorId, String> = self
            .repo
            .list_monitors()
            .await?
            .into_iter()
            .map(|m| (m.id, m.name))
            .collect();
        Ok(DependencyGraph::new(&edges, names))
    }

    /// Check whether an incident for `monitor_id` is explained by a required
    /// upstream failure.
    ///
    /// Active (`Open`/`Acked`) upstream incidents of a cascading kind opened
    /// within the lookback window suppress; the first (most recent) match
    /// wins. Optional dependencies never suppress. "No suppression" is a
    /// normal `Ok(None)`.
    pub async fn check_cascade_suppression(
        &self,
        monitor_id: MonitorId,
        lookback_minutes: i64,
    ) -> Result<Option<SuppressionCause>, GraphError> {
        let graph = self.snapshot().await?;
        let required = graph.required_dependencies(monitor_id);
        if required.is_empty() {
            return Ok(None);
        }

        let lookback_start = Utc::now() - Duration::minutes(lookback_minutes);
        let upstream_incidents = self.repo.list_active_incidents_for(&required).await?;

        for incident in upstream_incidents {
            if incident.kind.cascades() && incident.opened_at >= lookback_start {
                let upstream_name = self
                    .repo
                    .get_monitor(incident.monitor_id)
                    .await
                    .map(|m| m.name)
                    .unwrap_or_else(|_| incident.monitor_id.to_string());

                debug!(
                    %monitor_id,
                    upstream = %incident.monitor_id,
                    incident = %incident.id,
                    "cascade suppression applies"
                );

                return Ok(Some(SuppressionCause {
                    upstream_monitor: incident.monitor_id,
                    upstream_name: upstream_name.clone(),
                    incident_id: incident.id,
                    reason: format!(
                        "upstream dependency failure: {} ({})",
                        upstream_name,
                        incident.kind.as_str()
                    ),
                }));
            }
        }

        Ok(None)
    }

    /// One-hop reverse lookup: monitors depending on `monitor_id`
    pub async fn find_affected_downstream(
        &self,
        monitor_id: MonitorId,
    ) -> Result<Vec<Downstream>, GraphError> {
        Ok(self.snapshot().await?.downstream(monitor_id))
    }

    /// BFS dependency chain from `monitor_id`, truncated at `max_depth`
    pub async fn get_dependency_chain(
        &self,
        monitor_id: MonitorId,
        max_depth: usize,
    ) -> Result<Vec<ChainNode>, GraphError> {
        Ok(self.snapshot().await?.dependency_chain(monitor_id, max_depth))
    }

    /// DFS cycle check from `monitor_id` over the current edge set
    pub async fn detect_circular_dependency(
        &self,
        monitor_id: MonitorId,
    ) -> Result<bool, GraphError> {
        Ok(self.snapshot().await?.has_cycle_from(monitor_id))
    }

    /// Persist a new dependency edge after the mandatory cycle check.
    ///
    /// This is the sole cycle-prevention mechanism: an edge that would close
    /// a cycle is rejected synchronously, before anything is written.
    pub async fn add_dependency(&self, edge: MonitorDependency) -> Result<(), GraphError> {
        let graph = self.snapshot().await?;
        if graph.would_create_cycle(edge.monitor_id, edge.depends_on) {
            return Err(GraphError::CycleDetected {
                from: edge.monitor_id,
                to: edge.depends_on,
            });
        }

        info!(from = %edge.monitor_id, to = %edge.depends_on, required = edge.required, "dependency added");
        self.repo.add_dependency(edge).await?;
        Ok(())
    }

    pub async fn remove_dependency(
        &self,
        monitor_id: MonitorId,
        depends_on: MonitorId,
    ) -> Result<(), GraphError> {
        self.repo.remove_dependency(monitor_id, depends_on).await?;
        Ok(())
    }
}
