//! Incident lifecycle orchestration

use crate::config::EngineConfig;
use crate::dispatch::AlertDispatcher;
use admission::{BreakerError, CircuitBreaker, CircuitBreakerConfig, DistributedLock, RateLimiter};
use baseline::{classify_duration, BaselineBook, HealthInput, HealthScore, WelfordStats};
use chrono::{DateTime, Duration, Utc};
use depgraph::{GraphEngine, GraphError};
use model::{
    Incident, IncidentId, IncidentKind, IncidentStatus, MonitorId, Run, RunOutcome, Severity,
};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use storage::{AtomicStore, Repository, StorageError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Engine-level failures
#[derive(Debug, Error)]
pub enum EngineError {
    /// Another worker holds the evaluation lock; caller decides retry policy
    #[error("evaluation lock unavailable for monitor {monitor} ({kind:?})")]
    LockUnavailable {
        monitor: MonitorId,
        kind: IncidentKind,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Extra context a trigger may carry
#[derive(Debug, Clone, Default)]
pub struct TriggerContext {
    /// Overrides the kind's default summary
    pub summary: Option<String>,
    /// Z-score for anomaly triggers
    pub z_score: Option<f64>,
}

/// What `evaluate_trigger` decided
#[derive(Debug, Clone)]
pub enum IncidentDecision {
    /// A new incident was opened; `alerted` is false when dispatch was
    /// rate-limited or the breaker was open
    Created { incident: Incident, alerted: bool },
    /// A required upstream is failing; tracking incident created, no alert
    Suppressed { incident: Incident },
    /// An active incident of the same kind already exists inside the dedup
    /// window; it remains the system of record
    Deduplicated { existing: IncidentId },
}

/// The incident lifecycle manager
pub struct IncidentEngine {
    repo: Arc<dyn Repository>,
    dispatcher: Arc<dyn AlertDispatcher>,
    graph: GraphEngine,
    baselines: BaselineBook,
    limiter: RateLimiter,
    lock: DistributedLock,
    breaker: CircuitBreaker,
    config: EngineConfig,
}

impl IncidentEngine {
    pub fn new(
        repo: Arc<dyn Repository>,
        store: Arc<dyn AtomicStore>,
        dispatcher: Arc<dyn AlertDispatcher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            graph: GraphEngine::new(Arc::clone(&repo)),
            baselines: BaselineBook::new(),
            limiter: RateLimiter::new(Arc::clone(&store)),
            lock: DistributedLock::new(store),
            breaker: CircuitBreaker::new("alert-dispatch", CircuitBreakerConfig::default()),
            repo,
            dispatcher,
            config,
        }
    }

    /// Graph queries, exposed for callers outside the trigger path
    pub fn graph(&self) -> &GraphEngine {
        &self.graph
    }

    /// Single entry point for the scheduler / ping-ingestion path.
    ///
    /// Serialized per `(monitor, kind)` through the distributed lock; the
    /// check-then-create dedup sequence must not race across workers.
    pub async fn evaluate_trigger(
        &self,
        monitor_id: MonitorId,
        kind: IncidentKind,
        ctx: TriggerContext,
    ) -> Result<IncidentDecision, EngineError> {
        let resource = format!("incident:{monitor_id}:{}", kind.as_str());
        let guard = self
            .lock
            .acquire(&resource, StdDuration::from_secs(self.config.lock_ttl_secs))
            .await
            .ok_or(EngineError::LockUnavailable {
                monitor: monitor_id,
                kind,
            })?;

        let result = self.evaluate_locked(monitor_id, kind, ctx).await;
        guard.release().await;
        result
    }

    async fn evaluate_locked(
        &self,
        monitor_id: MonitorId,
        kind: IncidentKind,
        ctx: TriggerContext,
    ) -> Result<IncidentDecision, EngineError> {
        // Dedup first: an active incident of this kind inside the window is
        // the system of record, suppressed or not
        let window_start = Utc::now() - Duration::minutes(self.config.dedupe_window_minutes);
        if let Some(existing) = self
            .repo
            .find_active_incident(monitor_id, kind, window_start)
            .await?
        {
            debug!(
                monitor = %monitor_id,
                kind = kind.as_str(),
                existing = %existing.id,
                "trigger deduplicated against existing incident"
            );
            return Ok(IncidentDecision::Deduplicated { existing: existing.id });
        }

        // Upstream failure explains this trigger: track it quietly
        if let Some(cause) = self
            .graph
            .check_cascade_suppression(monitor_id, self.config.cascade_lookback_minutes)
            .await?
        {
            let mut incident = Incident::open(
                monitor_id,
                kind,
                Severity::Low,
                format!("[suppressed] {}", cause.reason),
            );
            incident.caused_by = Some(cause.incident_id);
            incident.z_score = ctx.z_score;
            incident.suppress_until = Some(incident.opened_at + Duration::hours(self.config.suppress_hours));

            info!(
                monitor = %monitor_id,
                kind = kind.as_str(),
                upstream = %cause.upstream_monitor,
                "incident suppressed by upstream failure"
            );
            self.repo.create_incident(incident.clone()).await?;
            return Ok(IncidentDecision::Suppressed { incident });
        }

        let mut incident = Incident::open(
            monitor_id,
            kind,
            default_severity(kind),
            ctx.summary.unwrap_or_else(|| default_summary(kind).to_string()),
        );
        incident.z_score = ctx.z_score;

        // A failing root with declared dependents becomes one composite
        // alert instead of an incident per downstream effect
        if kind.cascades() {
            let downstream = self.graph.find_affected_downstream(monitor_id).await?;
            if !downstream.is_empty() {
                let monitor_name = self
                    .repo
                    .get_monitor(monitor_id)
                    .await
                    .map(|m| m.name)
                    .unwrap_or_else(|_| monitor_id.to_string());
                let names: Vec<&str> = downstream.iter().map(|d| d.name.as_str()).collect();

                incident.severity = Severity::High;
                incident.summary = format!(
                    "Cascading failure: {} affected {} downstream monitor(s): {}",
                    monitor_name,
                    downstream.len(),
                    names.join(", ")
                );
                incident.affected_downstream = downstream.iter().map(|d| d.id).collect();
            }
        }

        self.repo.create_incident(incident.clone()).await?;
        info!(
            incident = %incident.id,
            monitor = %monitor_id,
            kind = kind.as_str(),
            severity = ?incident.severity,
            "incident opened"
        );

        let alerted = self.dispatch_gated(&incident).await;
        Ok(IncidentDecision::Created { incident, alerted })
    }

    /// Dispatch behind the rate limiter and circuit breaker.
    ///
    /// A withheld alert never fails the trigger; the incident record stands
    /// either way.
    async fn dispatch_gated(&self, incident: &Incident) -> bool {
        let gate = self
            .limiter
            .check(&incident.monitor_id.to_string(), &self.config.alert_tier)
            .await;
        if !gate.allowed {
            warn!(incident = %incident.id, "alert withheld: rate limit exceeded");
            return false;
        }

        match self.breaker.execute(|| self.dispatcher.dispatch(incident)).await {
            Ok(()) => true,
            Err(BreakerError::Open { name }) => {
                warn!(incident = %incident.id, breaker = %name, "alert withheld: circuit open");
                false
            }
            Err(BreakerError::Inner(err)) => {
                warn!(incident = %incident.id, error = %err, "alert dispatch failed");
                false
            }
        }
    }

    /// Fold a finalized run into the engine.
    ///
    /// Success auto-resolves the monitor's active incidents, then updates
    /// the baseline (serialized per monitor) and may raise an anomaly
    /// trigger. Failure outcomes map onto their triggers.
    pub async fn record_run(&self, run: Run) -> Result<Option<IncidentDecision>, EngineError> {
        let monitor_id = run.monitor_id;
        let outcome = run.outcome;
        let duration_ms = run.duration_ms;
        self.repo.append_run(run).await?;

        match outcome {
            RunOutcome::Success => {
                // Resolve before classifying, so a healthy run clears an
                // earlier anomaly incident while a freshly raised one stands
                self.auto_resolve(monitor_id).await?;
                match duration_ms {
                    Some(d) => self.record_success(monitor_id, d as f64).await,
                    None => Ok(None),
                }
            }
            RunOutcome::Fail => Ok(Some(
                self.evaluate_trigger(monitor_id, IncidentKind::Fail, TriggerContext::default())
                    .await?,
            )),
            RunOutcome::Timeout => Ok(Some(
                self.evaluate_trigger(
                    monitor_id,
                    IncidentKind::Fail,
                    TriggerContext {
                        summary: Some("Job timed out".to_string()),
                        ..Default::default()
                    },
                )
                .await?,
            )),
            RunOutcome::Late => Ok(Some(
                self.evaluate_trigger(monitor_id, IncidentKind::Late, TriggerContext::default())
                    .await?,
            )),
            RunOutcome::Missed => Ok(Some(
                self.evaluate_trigger(monitor_id, IncidentKind::Missed, TriggerContext::default())
                    .await?,
            )),
            RunOutcome::Started => Ok(None),
        }
    }

    async fn record_success(
        &self,
        monitor_id: MonitorId,
        duration_ms: f64,
    ) -> Result<Option<IncidentDecision>, EngineError> {
        let monitor = self.repo.get_monitor(monitor_id).await?;

        // Seed in-memory state from the persisted record on first sight
        let snapshot = match self.baselines.get(monitor_id) {
            Some(stats) => stats,
            None => {
                self.baselines.load(monitor_id, monitor.baseline);
                WelfordStats::from_stats(monitor.baseline)
            }
        };

        // Classify against the baseline before folding this run in
        let median = monitor.percentiles.map(|p| p.p50);
        let verdict = classify_duration(&snapshot, median, duration_ms, &self.config.anomaly);

        let updated = self.baselines.record_success(monitor_id, duration_ms);
        self.repo.save_baseline(monitor_id, updated).await?;

        if verdict.is_anomaly {
            let decision = self
                .evaluate_trigger(
                    monitor_id,
                    IncidentKind::Anomaly,
                    TriggerContext {
                        summary: verdict.message,
                        z_score: verdict.z_score,
                    },
                )
                .await?;
            return Ok(Some(decision));
        }

        Ok(None)
    }

    /// Resolve all active incidents for a recovered monitor
    async fn auto_resolve(&self, monitor_id: MonitorId) -> Result<(), EngineError> {
        for incident in self.repo.list_active_incidents_for(&[monitor_id]).await? {
            self.resolve(incident.id).await?;
        }
        Ok(())
    }

    /// Explicit user acknowledgement
    pub async fn acknowledge(&self, incident_id: IncidentId) -> Result<Incident, EngineError> {
        let mut incident = self.repo.get_incident(incident_id).await?;
        if incident.status == IncidentStatus::Open {
            incident.status = IncidentStatus::Acked;
            incident.acknowledged_at = Some(Utc::now());
            self.repo.update_incident(incident.clone()).await?;
            info!(incident = %incident_id, "incident acknowledged");
        }
        Ok(incident)
    }

    /// Resolve an incident and cascade to the suppressed incidents it caused
    pub async fn resolve(&self, incident_id: IncidentId) -> Result<Incident, EngineError> {
        let incident = self.resolve_one(incident_id).await?;

        // Best-effort downstream sweep over the typed causal link
        for suppressed in self.repo.list_caused_by(incident_id).await? {
            if let Err(err) = self.resolve_one(suppressed.id).await {
                warn!(incident = %suppressed.id, error = %err, "cascade resolution failed");
            }
        }
        Ok(incident)
    }

    async fn resolve_one(&self, incident_id: IncidentId) -> Result<Incident, EngineError> {
        let mut incident = self.repo.get_incident(incident_id).await?;
        if incident.status.is_active() {
            incident.status = IncidentStatus::Resolved;
            incident.resolved_at = Some(Utc::now());
            self.repo.update_incident(incident.clone()).await?;
            info!(incident = %incident_id, "incident resolved");
        }
        Ok(incident)
    }

    /// Score a monitor's health over a lookback window.
    ///
    /// Fires a Degraded trigger when the weighted score falls below the
    /// configured threshold.
    pub async fn assess_health(
        &self,
        monitor_id: MonitorId,
        lookback: Duration,
    ) -> Result<(HealthScore, Option<IncidentDecision>), EngineError> {
        let monitor = self.repo.get_monitor(monitor_id).await?;
        let now = Utc::now();
        let window_start: DateTime<Utc> = std::cmp::max(monitor.created_at, now - lookback);

        let runs = self.repo.list_runs_since(monitor_id, window_start).await?;
        let actual_runs = runs
            .iter()
            .filter(|r| r.outcome != RunOutcome::Started)
            .count() as u64;
        let successful_runs = runs.iter().filter(|r| r.outcome.is_success()).count() as u64;

        let score = baseline::calculate_health_score(&HealthInput {
            expected_runs: monitor.schedule.expected_runs(window_start, now),
            actual_runs,
            successful_runs,
            duration_count: monitor.baseline.count,
            duration_mean: monitor.baseline.mean,
            duration_m2: monitor.baseline.m2,
        });

        if score.score < self.config.degraded_threshold {
            let decision = self
                .evaluate_trigger(
                    monitor_id,
                    IncidentKind::Degraded,
                    TriggerContext {
                        summary: Some(format!(
                            "Monitor health degraded: score {} (grade {:?})",
                            score.score, score.grade
                        )),
                        ..Default::default()
                    },
                )
                .await?;
            return Ok((score, Some(decision)));
        }

        Ok((score, None))
    }
}

fn default_severity(kind: IncidentKind) -> Severity {
    match kind {
        IncidentKind::Fail | IncidentKind::Missed | IncidentKind::Late => Severity::Medium,
        IncidentKind::Anomaly | IncidentKind::Degraded => Severity::Low,
    }
}

fn default_summary(kind: IncidentKind) -> &'static str {
    match kind {
        IncidentKind::Fail => "Job failed",
        IncidentKind::Missed => "Job missed its schedule",
        IncidentKind::Late => "Job completed late",
        IncidentKind::Anomaly => "Performance anomaly detected",
        IncidentKind::Degraded => "Monitor health degraded",
    }
}
