//! Incident Lifecycle Manager
//!
//! The orchestrator behind `evaluate_trigger`: given a fail/missed/late/
//! anomaly trigger it consults cascade suppression and dedup rules, persists
//! the resulting incident, and forwards eligible incidents to alert dispatch
//! gated by the rate limiter and a circuit breaker.

mod config;
mod dispatch;
mod lifecycle;
mod telemetry;

pub use config::EngineConfig;
pub use dispatch::{AlertDispatcher, DispatchError, LogDispatcher};
pub use lifecycle::{EngineError, IncidentDecision, IncidentEngine, TriggerContext};
pub use telemetry::init_logging;
