//! Distributed lock over the atomic store
//!
//! Set-if-absent with a TTL serializes one concurrent operation per named
//! resource across workers. Release is an explicit delete; an unreleased
//! lock expires with its TTL, which bounds worst-case staleness.

use std::sync::Arc;
use std::time::Duration;
use storage::AtomicStore;
use tracing::{debug, warn};

/// Acquired lock; call `release` when the guarded section is done
pub struct LockGuard {
    store: Arc<dyn AtomicStore>,
    key: String,
}

impl LockGuard {
    pub async fn release(self) {
        if let Err(err) = self.store.delete(&self.key).await {
            // TTL will reap it; nothing more to do
            warn!(key = %self.key, error = %err, "lock release failed, relying on TTL expiry");
        }
    }
}

/// Lock factory bound to a store
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn AtomicStore>,
}

impl DistributedLock {
    pub fn new(store: Arc<dyn AtomicStore>) -> Self {
        Self { store }
    }

    /// Try to acquire the lock for `resource`.
    ///
    /// Returns `None` when the lock is held elsewhere or the store errored;
    /// the caller owns any retry policy.
    pub async fn acquire(&self, resource: &str, ttl: Duration) -> Option<LockGuard> {
        let key = format!("lock:{resource}");
        let token = format!("{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default());

        match self.store.set_if_absent(&key, &token, ttl).await {
            Ok(true) => {
                debug!(resource, "lock acquired");
                Some(LockGuard {
                    store: Arc::clone(&self.store),
                    key,
                })
            }
            Ok(false) => None,
            Err(err) => {
                warn!(resource, error = %err, "lock acquisition failed");
                None
            }
        }
    }
}
