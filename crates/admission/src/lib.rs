//! Admission Control
//!
//! Shared gatekeeping for ping ingestion, alert dispatch, and engine-internal
//! serialization: a sliding-window rate limiter over the atomic store, a
//! TTL-bounded distributed lock, and a process-local circuit breaker.

mod breaker;
mod limiter;
mod lock;

pub use breaker::{BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use limiter::{RateLimitResult, RateLimitTier, RateLimiter};
pub use lock::{DistributedLock, LockGuard};
