//! End-to-end scenarios through the incident engine

use admission::RateLimitTier;
use async_trait::async_trait;
use chrono::Duration;
use engine::{
    AlertDispatcher, DispatchError, EngineConfig, EngineError, IncidentDecision, IncidentEngine,
    TriggerContext,
};
use model::{
    Incident, IncidentId, IncidentKind, IncidentStatus, Monitor, MonitorDependency, MonitorId,
    Run, RunOutcome, Schedule, Severity,
};
use parking_lot::Mutex;
use std::sync::Arc;
use storage::{MemoryRepository, MemoryStore, Repository};

/// Captures every dispatched incident for assertions
#[derive(Default)]
struct RecordingDispatcher {
    sent: Mutex<Vec<IncidentId>>,
}

impl RecordingDispatcher {
    fn sent(&self) -> Vec<IncidentId> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl AlertDispatcher for RecordingDispatcher {
    async fn dispatch(&self, incident: &Incident) -> Result<(), DispatchError> {
        self.sent.lock().push(incident.id);
        Ok(())
    }
}

struct Harness {
    repo: Arc<MemoryRepository>,
    dispatcher: Arc<RecordingDispatcher>,
    engine: IncidentEngine,
}

fn harness_with(config: EngineConfig) -> Harness {
    let repo = Arc::new(MemoryRepository::new());
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let engine = IncidentEngine::new(
        repo.clone(),
        store,
        dispatcher.clone(),
        config,
    );
    Harness {
        repo,
        dispatcher,
        engine,
    }
}

fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

async fn add_monitor(repo: &MemoryRepository, name: &str) -> MonitorId {
    let monitor = Monitor::new(name, Schedule::Interval { interval_sec: 60 });
    let id = monitor.id;
    repo.insert_monitor(monitor).await.unwrap();
    id
}

#[tokio::test]
async fn cascade_suppression_end_to_end() {
    let h = harness();
    let upstream = add_monitor(&h.repo, "database").await;
    let downstream = add_monitor(&h.repo, "etl-job").await;
    h.engine
        .graph()
        .add_dependency(MonitorDependency::required(downstream, upstream))
        .await
        .unwrap();

    // Upstream FAIL incident opened two minutes ago
    let mut upstream_incident =
        Incident::open(upstream, IncidentKind::Fail, Severity::Medium, "db down");
    upstream_incident.opened_at = chrono::Utc::now() - Duration::minutes(2);
    let upstream_id = upstream_incident.id;
    h.repo.create_incident(upstream_incident).await.unwrap();

    let decision = h
        .engine
        .evaluate_trigger(downstream, IncidentKind::Fail, TriggerContext::default())
        .await
        .unwrap();

    let IncidentDecision::Suppressed { incident } = decision else {
        panic!("expected suppression, got {decision:?}");
    };
    assert_eq!(incident.severity, Severity::Low);
    assert_eq!(incident.caused_by, Some(upstream_id));
    assert!(incident.summary.starts_with("[suppressed]"));

    // suppress_until roughly 24 hours out, strictly after opened_at
    let suppress_until = incident.suppress_until.unwrap();
    assert!(suppress_until > incident.opened_at);
    let delta = suppress_until - incident.opened_at;
    assert_eq!(delta.num_hours(), 24);

    // Alert Dispatch must not have been invoked
    assert!(h.dispatcher.sent().is_empty());
}

#[tokio::test]
async fn repeated_triggers_during_upstream_outage_dedup_to_one_suppressed_incident() {
    let h = harness();
    let upstream = add_monitor(&h.repo, "database").await;
    let downstream = add_monitor(&h.repo, "etl-job").await;
    h.engine
        .graph()
        .add_dependency(MonitorDependency::required(downstream, upstream))
        .await
        .unwrap();

    h.repo
        .create_incident(Incident::open(upstream, IncidentKind::Fail, Severity::Medium, "db down"))
        .await
        .unwrap();

    let IncidentDecision::Suppressed { incident } = h
        .engine
        .evaluate_trigger(downstream, IncidentKind::Fail, TriggerContext::default())
        .await
        .unwrap()
    else {
        panic!("expected suppression");
    };

    // The outage keeps firing; every later trigger collapses onto the
    // suppressed incident instead of opening another one
    for _ in 0..2 {
        let decision = h
            .engine
            .evaluate_trigger(downstream, IncidentKind::Fail, TriggerContext::default())
            .await
            .unwrap();
        let IncidentDecision::Deduplicated { existing } = decision else {
            panic!("expected dedup, got {decision:?}");
        };
        assert_eq!(existing, incident.id);
    }

    let active = h.repo.list_active_incidents_for(&[downstream]).await.unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn dedup_collapses_repeated_failures() {
    let h = harness();
    let monitor = add_monitor(&h.repo, "cron-job").await;

    let first = h
        .engine
        .evaluate_trigger(monitor, IncidentKind::Fail, TriggerContext::default())
        .await
        .unwrap();
    let IncidentDecision::Created { incident, alerted } = first else {
        panic!("expected creation");
    };
    assert!(alerted);

    for _ in 0..2 {
        let decision = h
            .engine
            .evaluate_trigger(monitor, IncidentKind::Fail, TriggerContext::default())
            .await
            .unwrap();
        let IncidentDecision::Deduplicated { existing } = decision else {
            panic!("expected dedup");
        };
        assert_eq!(existing, incident.id);
    }

    // Exactly one active incident, one alert
    let active = h.repo.list_active_incidents_for(&[monitor]).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(h.dispatcher.sent().len(), 1);
}

#[tokio::test]
async fn different_kinds_do_not_dedup_each_other() {
    let h = harness();
    let monitor = add_monitor(&h.repo, "cron-job").await;

    for kind in [IncidentKind::Fail, IncidentKind::Late] {
        let decision = h
            .engine
            .evaluate_trigger(monitor, kind, TriggerContext::default())
            .await
            .unwrap();
        assert!(matches!(decision, IncidentDecision::Created { .. }));
    }

    let active = h.repo.list_active_incidents_for(&[monitor]).await.unwrap();
    assert_eq!(active.len(), 2);
}

#[tokio::test]
async fn root_cause_failure_becomes_composite_alert() {
    let h = harness();
    let root = add_monitor(&h.repo, "database").await;
    let web = add_monitor(&h.repo, "web-sync").await;
    let etl = add_monitor(&h.repo, "etl-job").await;
    h.engine
        .graph()
        .add_dependency(MonitorDependency::required(web, root))
        .await
        .unwrap();
    h.engine
        .graph()
        .add_dependency(MonitorDependency::required(etl, root))
        .await
        .unwrap();

    let decision = h
        .engine
        .evaluate_trigger(root, IncidentKind::Fail, TriggerContext::default())
        .await
        .unwrap();

    let IncidentDecision::Created { incident, .. } = decision else {
        panic!("expected creation");
    };
    assert_eq!(incident.severity, Severity::High);
    assert_eq!(incident.affected_downstream.len(), 2);
    assert!(incident.summary.contains("database"));
    assert!(incident.summary.contains("2 downstream"));

    // One composite alert, not one per downstream effect
    assert_eq!(h.dispatcher.sent().len(), 1);
}

#[tokio::test]
async fn upstream_resolution_cascades_to_suppressed_downstream() {
    let h = harness();
    let upstream = add_monitor(&h.repo, "database").await;
    let downstream = add_monitor(&h.repo, "etl-job").await;
    h.engine
        .graph()
        .add_dependency(MonitorDependency::required(downstream, upstream))
        .await
        .unwrap();

    let IncidentDecision::Created { incident: root, .. } = h
        .engine
        .evaluate_trigger(upstream, IncidentKind::Fail, TriggerContext::default())
        .await
        .unwrap()
    else {
        panic!("expected creation");
    };

    let IncidentDecision::Suppressed { incident: suppressed } = h
        .engine
        .evaluate_trigger(downstream, IncidentKind::Fail, TriggerContext::default())
        .await
        .unwrap()
    else {
        panic!("expected suppression");
    };

    // Upstream recovers: a Success run auto-resolves the root incident and
    // the resolution cascades over the typed causal link
    h.engine
        .record_run(Run::new(upstream, RunOutcome::Success, Some(120)))
        .await
        .unwrap();

    let root_after = h.repo.get_incident(root.id).await.unwrap();
    assert_eq!(root_after.status, IncidentStatus::Resolved);
    assert!(root_after.resolved_at.is_some());

    let suppressed_after = h.repo.get_incident(suppressed.id).await.unwrap();
    assert_eq!(suppressed_after.status, IncidentStatus::Resolved);
}

#[tokio::test]
async fn anomalous_success_run_raises_anomaly_incident() {
    let h = harness();
    let monitor = add_monitor(&h.repo, "report-job").await;

    // Build a confident baseline around ~100ms
    for i in 0..12 {
        let duration = 95 + (i % 5) * 2;
        let decision = h
            .engine
            .record_run(Run::new(monitor, RunOutcome::Success, Some(duration)))
            .await
            .unwrap();
        assert!(decision.is_none());
    }

    // A wildly slow run that still "succeeded"
    let decision = h
        .engine
        .record_run(Run::new(monitor, RunOutcome::Success, Some(5_000)))
        .await
        .unwrap()
        .expect("anomaly expected");

    let IncidentDecision::Created { incident, .. } = decision else {
        panic!("expected anomaly incident");
    };
    assert_eq!(incident.kind, IncidentKind::Anomaly);
    assert_eq!(incident.severity, Severity::Low);
    assert!(incident.z_score.unwrap() > 3.0);

    // The anomaly incident survives its own success run
    let active = h.repo.list_active_incidents_for(&[monitor]).await.unwrap();
    assert_eq!(active.len(), 1);

    // Persisted baseline includes all 13 runs
    let stored = h.repo.get_monitor(monitor).await.unwrap();
    assert_eq!(stored.baseline.count, 13);
}

#[tokio::test]
async fn anomaly_incident_resolves_on_subsequent_healthy_runs() {
    let h = harness();
    let monitor = add_monitor(&h.repo, "report-job").await;

    for i in 0..12 {
        let duration = 95 + (i % 5) * 2;
        h.engine
            .record_run(Run::new(monitor, RunOutcome::Success, Some(duration)))
            .await
            .unwrap();
    }

    let decision = h
        .engine
        .record_run(Run::new(monitor, RunOutcome::Success, Some(5_000)))
        .await
        .unwrap()
        .expect("anomaly expected");
    let IncidentDecision::Created { incident, .. } = decision else {
        panic!("expected anomaly incident");
    };

    // The next healthy run clears the anomaly like any other incident
    h.engine
        .record_run(Run::new(monitor, RunOutcome::Success, Some(100)))
        .await
        .unwrap();

    let after = h.repo.get_incident(incident.id).await.unwrap();
    assert_eq!(after.status, IncidentStatus::Resolved);
    assert!(h
        .repo
        .list_active_incidents_for(&[monitor])
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn success_resolves_failure_incident() {
    let h = harness();
    let monitor = add_monitor(&h.repo, "cron-job").await;

    h.engine
        .record_run(Run::new(monitor, RunOutcome::Fail, None))
        .await
        .unwrap();
    assert_eq!(
        h.repo.list_active_incidents_for(&[monitor]).await.unwrap().len(),
        1
    );

    h.engine
        .record_run(Run::new(monitor, RunOutcome::Success, Some(100)))
        .await
        .unwrap();
    assert!(h
        .repo
        .list_active_incidents_for(&[monitor])
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn acknowledge_then_resolve() {
    let h = harness();
    let monitor = add_monitor(&h.repo, "cron-job").await;

    let IncidentDecision::Created { incident, .. } = h
        .engine
        .evaluate_trigger(monitor, IncidentKind::Missed, TriggerContext::default())
        .await
        .unwrap()
    else {
        panic!("expected creation");
    };

    let acked = h.engine.acknowledge(incident.id).await.unwrap();
    assert_eq!(acked.status, IncidentStatus::Acked);
    assert!(acked.acknowledged_at.is_some());

    // Acked incidents still dedup new triggers
    let decision = h
        .engine
        .evaluate_trigger(monitor, IncidentKind::Missed, TriggerContext::default())
        .await
        .unwrap();
    assert!(matches!(decision, IncidentDecision::Deduplicated { .. }));

    let resolved = h.engine.resolve(incident.id).await.unwrap();
    assert_eq!(resolved.status, IncidentStatus::Resolved);
}

#[tokio::test]
async fn rate_limited_dispatch_still_creates_incident() {
    let config = EngineConfig {
        alert_tier: RateLimitTier {
            key_prefix: "alerts".into(),
            window_ms: 60_000,
            max_requests: 1,
            block_duration_ms: None,
        },
        ..EngineConfig::default()
    };
    let h = harness_with(config);
    let monitor = add_monitor(&h.repo, "cron-job").await;

    let IncidentDecision::Created { alerted, .. } = h
        .engine
        .evaluate_trigger(monitor, IncidentKind::Fail, TriggerContext::default())
        .await
        .unwrap()
    else {
        panic!("expected creation");
    };
    assert!(alerted);

    // Second kind inside the same window: created, but the alert is withheld
    let IncidentDecision::Created { alerted, incident } = h
        .engine
        .evaluate_trigger(monitor, IncidentKind::Late, TriggerContext::default())
        .await
        .unwrap()
    else {
        panic!("expected creation");
    };
    assert!(!alerted);
    assert!(h.repo.get_incident(incident.id).await.is_ok());
    assert_eq!(h.dispatcher.sent().len(), 1);
}

#[tokio::test]
async fn degraded_health_raises_incident() {
    let h = harness();
    let mut monitor = Monitor::new("flaky-job", Schedule::Interval { interval_sec: 60 });
    monitor.created_at = chrono::Utc::now() - Duration::hours(1);
    let id = monitor.id;
    h.repo.insert_monitor(monitor).await.unwrap();

    // One failed run against ~60 expected: poor uptime, poor success rate
    h.repo
        .append_run(Run::new(id, RunOutcome::Fail, None))
        .await
        .unwrap();

    let (score, decision) = h.engine.assess_health(id, Duration::hours(1)).await.unwrap();
    assert!(score.score < 60);
    let decision = decision.expect("degraded trigger expected");
    let IncidentDecision::Created { incident, .. } = decision else {
        panic!("expected creation");
    };
    assert_eq!(incident.kind, IncidentKind::Degraded);
}
