//! Core Domain Types
//!
//! Shared types for monitors, runs, incidents, and dependency edges.
//! These mirror the persistence layer's records; the engine crates only
//! read and update the fields they own (e.g. baseline statistics).

mod dependency;
mod incident;
mod monitor;
mod run;

pub use dependency::MonitorDependency;
pub use incident::{Incident, IncidentId, IncidentKind, IncidentStatus, Severity};
pub use monitor::{BaselineStats, Monitor, MonitorId, Percentiles, Schedule};
pub use run::{Run, RunId, RunOutcome};
