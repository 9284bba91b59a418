//! Persistence seam and in-memory implementation

use crate::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{Incident, IncidentId, IncidentKind, Monitor, MonitorDependency, MonitorId, Run, BaselineStats};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

/// Narrow persistence contract the engine depends on.
///
/// All queries the graph walks need are bulk reads: edges and incident sets
/// come back in one call so traversals stay in memory.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn insert_monitor(&self, monitor: Monitor) -> Result<(), StorageError>;
    async fn get_monitor(&self, id: MonitorId) -> Result<Monitor, StorageError>;
    async fn list_monitors(&self) -> Result<Vec<Monitor>, StorageError>;
    /// Persist updated baseline statistics for one monitor
    async fn save_baseline(&self, id: MonitorId, stats: BaselineStats) -> Result<(), StorageError>;

    async fn append_run(&self, run: Run) -> Result<(), StorageError>;
    async fn list_runs_since(
        &self,
        monitor_id: MonitorId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Run>, StorageError>;

    async fn create_incident(&self, incident: Incident) -> Result<(), StorageError>;
    async fn get_incident(&self, id: IncidentId) -> Result<Incident, StorageError>;
    async fn update_incident(&self, incident: Incident) -> Result<(), StorageError>;
    /// Most recent Open/Acked incident of `kind` opened at or after `opened_after`
    async fn find_active_incident(
        &self,
        monitor_id: MonitorId,
        kind: IncidentKind,
        opened_after: DateTime<Utc>,
    ) -> Result<Option<Incident>, StorageError>;
    /// All Open/Acked incidents across a set of monitors, newest first
    async fn list_active_incidents_for(
        &self,
        monitor_ids: &[MonitorId],
    ) -> Result<Vec<Incident>, StorageError>;
    /// Active incidents whose `caused_by` references the given incident
    async fn list_caused_by(&self, upstream: IncidentId) -> Result<Vec<Incident>, StorageError>;

    async fn add_dependency(&self, edge: MonitorDependency) -> Result<(), StorageError>;
    async fn remove_dependency(
        &self,
        monitor_id: MonitorId,
        depends_on: MonitorId,
    ) -> Result<(), StorageError>;
    /// Full edge set, bulk-loaded for in-memory graph construction
    async fn list_dependencies(&self) -> Result<Vec<MonitorDependency>, StorageError>;
}

/// In-memory repository backing tests and single-process deployments
#[derive(Default)]
pub struct MemoryRepository {
    monitors: Mutex<HashMap<MonitorId, Monitor>>,
    runs: Mutex<Vec<Run>>,
    incidents: Mutex<HashMap<IncidentId, Incident>>,
    dependencies: Mutex<Vec<MonitorDependency>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn insert_monitor(&self, monitor: Monitor) -> Result<(), StorageError> {
        self.monitors.lock().insert(monitor.id, monitor);
        Ok(())
    }

    async fn get_monitor(&self, id: MonitorId) -> Result<Monitor, StorageError> {
        self.monitors
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("monitor {id}")))
    }

    async fn list_monitors(&self) -> Result<Vec<Monitor>, StorageError> {
        Ok(self.monitors.lock().values().cloned().collect())
    }

    async fn save_baseline(&self, id: MonitorId, stats: BaselineStats) -> Result<(), StorageError> {
        let mut monitors = self.monitors.lock();
        let monitor = monitors
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("monitor {id}")))?;
        monitor.baseline = stats;
        Ok(())
    }

    async fn append_run(&self, run: Run) -> Result<(), StorageError> {
        self.runs.lock().push(run);
        Ok(())
    }

    async fn list_runs_since(
        &self,
        monitor_id: MonitorId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Run>, StorageError> {
        Ok(self
            .runs
            .lock()
            .iter()
            .filter(|r| r.monitor_id == monitor_id && r.started_at >= since)
            .cloned()
            .collect())
    }

    async fn create_incident(&self, incident: Incident) -> Result<(), StorageError> {
        debug!(id = %incident.id, monitor = %incident.monitor_id, kind = incident.kind.as_str(), "incident created");
        self.incidents.lock().insert(incident.id, incident);
        Ok(())
    }

    async fn get_incident(&self, id: IncidentId) -> Result<Incident, StorageError> {
        self.incidents
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("incident {id}")))
    }

    async fn update_incident(&self, incident: Incident) -> Result<(), StorageError> {
        let mut incidents = self.incidents.lock();
        if !incidents.contains_key(&incident.id) {
            return Err(StorageError::NotFound(format!("incident {}", incident.id)));
        }
        incidents.insert(incident.id, incident);
        Ok(())
    }

    async fn find_active_incident(
        &self,
        monitor_id: MonitorId,
        kind: IncidentKind,
        opened_after: DateTime<Utc>,
    ) -> Result<Option<Incident>, StorageError> {
        Ok(self
            .incidents
            .lock()
            .values()
            .filter(|i| {
                i.monitor_id == monitor_id
                    && i.kind == kind
                    && i.is_active()
                    && i.opened_at >= opened_after
            })
            .max_by_key(|i| i.opened_at)
            .cloned())
    }

    async fn list_active_incidents_for(
        &self,
        monitor_ids: &[MonitorId],
    ) -> Result<Vec<Incident>, StorageError> {
        let mut active: Vec<Incident> = self
            .incidents
            .lock()
            .values()
            .filter(|i| i.is_active() && monitor_ids.contains(&i.monitor_id))
            .cloned()
            .collect();
        active.sort_by_key(|i| std::cmp::Reverse(i.opened_at));
        Ok(active)
    }

    async fn list_caused_by(&self, upstream: IncidentId) -> Result<Vec<Incident>, StorageError> {
        Ok(self
            .incidents
            .lock()
            .values()
            .filter(|i| i.is_active() && i.caused_by == Some(upstream))
            .cloned()
            .collect())
    }

    async fn add_dependency(&self, edge: MonitorDependency) -> Result<(), StorageError> {
        let mut deps = self.dependencies.lock();
        if deps
            .iter()
            .any(|d| d.monitor_id == edge.monitor_id && d.depends_on == edge.depends_on)
        {
            return Err(StorageError::Constraint(format!(
                "duplicate dependency {} -> {}",
                edge.monitor_id, edge.depends_on
            )));
        }
        deps.push(edge);
        Ok(())
    }

    async fn remove_dependency(
        &self,
        monitor_id: MonitorId,
        depends_on: MonitorId,
    ) -> Result<(), StorageError> {
        self.dependencies
            .lock()
            .retain(|d| !(d.monitor_id == monitor_id && d.depends_on == depends_on));
        Ok(())
    }

    async fn list_dependencies(&self) -> Result<Vec<MonitorDependency>, StorageError> {
        Ok(self.dependencies.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{IncidentStatus, RunOutcome, Schedule, Severity};

    fn monitor() -> Monitor {
        Monitor::new("backup-job", Schedule::Interval { interval_sec: 3600 })
    }

    #[tokio::test]
    async fn test_monitor_roundtrip() {
        let repo = MemoryRepository::new();
        let m = monitor();
        let id = m.id;
        repo.insert_monitor(m).await.unwrap();

        let loaded = repo.get_monitor(id).await.unwrap();
        assert_eq!(loaded.name, "backup-job");
        assert!(repo.get_monitor(MonitorId::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_save_baseline() {
        let repo = MemoryRepository::new();
        let m = monitor();
        let id = m.id;
        repo.insert_monitor(m).await.unwrap();

        let stats = BaselineStats {
            count: 3,
            mean: 120.0,
            m2: 50.0,
            min: Some(110.0),
            max: Some(130.0),
        };
        repo.save_baseline(id, stats).await.unwrap();
        assert_eq!(repo.get_monitor(id).await.unwrap().baseline.count, 3);
    }

    #[tokio::test]
    async fn test_find_active_incident_respects_window_and_status() {
        let repo = MemoryRepository::new();
        let monitor_id = MonitorId::new();

        let mut resolved = Incident::open(monitor_id, IncidentKind::Fail, Severity::Medium, "old");
        resolved.status = IncidentStatus::Resolved;
        repo.create_incident(resolved).await.unwrap();

        let open = Incident::open(monitor_id, IncidentKind::Fail, Severity::Medium, "fresh");
        let open_id = open.id;
        repo.create_incident(open).await.unwrap();

        let window_start = Utc::now() - chrono::Duration::minutes(10);
        let found = repo
            .find_active_incident(monitor_id, IncidentKind::Fail, window_start)
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, open_id);

        // Different kind does not match
        let found = repo
            .find_active_incident(monitor_id, IncidentKind::Missed, window_start)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_caused_by_lookup() {
        let repo = MemoryRepository::new();
        let upstream = IncidentId::new();

        let mut suppressed =
            Incident::open(MonitorId::new(), IncidentKind::Fail, Severity::Low, "downstream");
        suppressed.caused_by = Some(upstream);
        repo.create_incident(suppressed).await.unwrap();

        let other = Incident::open(MonitorId::new(), IncidentKind::Fail, Severity::Low, "unrelated");
        repo.create_incident(other).await.unwrap();

        let linked = repo.list_caused_by(upstream).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].caused_by, Some(upstream));
    }

    #[tokio::test]
    async fn test_duplicate_dependency_rejected() {
        let repo = MemoryRepository::new();
        let a = MonitorId::new();
        let b = MonitorId::new();

        repo.add_dependency(MonitorDependency::required(a, b)).await.unwrap();
        assert!(repo.add_dependency(MonitorDependency::required(a, b)).await.is_err());

        repo.remove_dependency(a, b).await.unwrap();
        assert!(repo.list_dependencies().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_runs_filtered_by_monitor_and_time() {
        let repo = MemoryRepository::new();
        let id = MonitorId::new();

        repo.append_run(Run::new(id, RunOutcome::Success, Some(100)))
            .await
            .unwrap();
        repo.append_run(Run::new(MonitorId::new(), RunOutcome::Fail, None))
            .await
            .unwrap();

        let since = Utc::now() - chrono::Duration::minutes(1);
        let runs = repo.list_runs_since(id, since).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].outcome, RunOutcome::Success);
    }
}
