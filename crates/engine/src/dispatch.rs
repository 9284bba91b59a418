//! Alert dispatch seam
//!
//! Rendering and delivery of notifications live outside the core; the engine
//! hands over a structured incident and only cares whether delivery worked.

use async_trait::async_trait;
use model::Incident;
use thiserror::Error;
use tracing::info;

/// Delivery failure from the dispatch layer
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("alert delivery failed: {0}")]
    Delivery(String),
}

/// Contract the engine dispatches through
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn dispatch(&self, incident: &Incident) -> Result<(), DispatchError>;
}

/// Dispatcher that only logs; default for single-process and test setups
#[derive(Debug, Default)]
pub struct LogDispatcher;

#[async_trait]
impl AlertDispatcher for LogDispatcher {
    async fn dispatch(&self, incident: &Incident) -> Result<(), DispatchError> {
        info!(
            incident = %incident.id,
            monitor = %incident.monitor_id,
            kind = incident.kind.as_str(),
            severity = ?incident.severity,
            "alert dispatched: {}",
            incident.summary
        );
        Ok(())
    }
}
