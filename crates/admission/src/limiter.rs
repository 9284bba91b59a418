//! Sliding-window rate limiter over the atomic store
//!
//! Per identifier: prune entries older than the window, count the remainder,
//! reject at the limit (optionally setting a TTL'd block key that
//! short-circuits later checks), otherwise record the request and allow.
//! Any store error fails open: availability beats strict enforcement.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use storage::AtomicStore;
use tracing::{debug, warn};

/// One named `(window, max_requests, block_duration)` tuple
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitTier {
    pub key_prefix: String,
    pub window_ms: u64,
    pub max_requests: u64,
    /// When set, exceeding the limit blocks the identifier for this long
    pub block_duration_ms: Option<u64>,
}

impl RateLimitTier {
    /// General API traffic, per IP: 60/min
    pub fn api_default() -> Self {
        Self {
            key_prefix: "api".into(),
            window_ms: 60_000,
            max_requests: 60,
            block_duration_ms: None,
        }
    }

    /// Authentication attempts: 5 per 15 min, then a 15 min block
    pub fn auth() -> Self {
        Self {
            key_prefix: "auth".into(),
            window_ms: 15 * 60_000,
            max_requests: 5,
            block_duration_ms: Some(15 * 60_000),
        }
    }

    /// Ping ingestion, per monitor token: 120/min
    pub fn ping() -> Self {
        Self {
            key_prefix: "ping".into(),
            window_ms: 60_000,
            max_requests: 120,
            block_duration_ms: None,
        }
    }

    /// Public status pages, per IP: 30/min
    pub fn status_page() -> Self {
        Self {
            key_prefix: "status".into(),
            window_ms: 60_000,
            max_requests: 30,
            block_duration_ms: None,
        }
    }

    /// Webhook delivery, per integration: 100/min
    pub fn webhook() -> Self {
        Self {
            key_prefix: "webhook".into(),
            window_ms: 60_000,
            max_requests: 100,
            block_duration_ms: None,
        }
    }

    /// Email sending, per organization: 100/h
    pub fn email() -> Self {
        Self {
            key_prefix: "email".into(),
            window_ms: 60 * 60_000,
            max_requests: 100,
            block_duration_ms: None,
        }
    }
}

/// Admission decision for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Epoch millis when the window (or block) resets
    pub reset_at_ms: i64,
    /// Seconds to wait before retrying, on rejection
    pub retry_after_sec: Option<u64>,
}

/// Sliding-window limiter; cheap to clone, state lives in the store
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn AtomicStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn AtomicStore>) -> Self {
        Self { store }
    }

    pub async fn check(&self, identifier: &str, tier: &RateLimitTier) -> RateLimitResult {
        let now_ms = chrono::Utc::now().timestamp_millis();
        match self.check_inner(identifier, tier, now_ms).await {
            Ok(result) => result,
            Err(err) => {
                // Fail open: a degraded store must not take down ingestion
                warn!(identifier, error = %err, "rate limit store error, failing open");
                RateLimitResult {
                    allowed: true,
                    limit: tier.max_requests,
                    remaining: tier.max_requests,
                    reset_at_ms: now_ms + tier.window_ms as i64,
                    retry_after_sec: None,
                }
            }
        }
    }

    async fn check_inner(
        &self,
        identifier: &str,
        tier: &RateLimitTier,
        now_ms: i64,
    ) -> Result<RateLimitResult, storage::StorageError> {
        let key = format!("{}:{}", tier.key_prefix, identifier);
        let window_start = now_ms - tier.window_ms as i64;

        self.store.window_prune(&key, window_start).await?;
        let count = self.store.window_count(&key).await?;

        let block_key = format!("{key}:blocked");
        if let Some(blocked) = self.store.get(&block_key).await? {
            if let Ok(blocked_until) = blocked.parse::<i64>() {
                if now_ms < blocked_until {
                    return Ok(RateLimitResult {
                        allowed: false,
                        limit: tier.max_requests,
                        remaining: 0,
                        reset_at_ms: blocked_until,
                        retry_after_sec: Some(((blocked_until - now_ms) as u64).div_ceil(1000)),
                    });
                }
            }
            self.store.delete(&block_key).await?;
        }

        if count >= tier.max_requests {
            if let Some(block_ms) = tier.block_duration_ms {
                let blocked_until = now_ms + block_ms as i64;
                self.store
                    .set_with_ttl(
                        &block_key,
                        &blocked_until.to_string(),
                        Duration::from_millis(block_ms),
                    )
                    .await?;
                debug!(identifier, blocked_until, "rate limit exceeded, identifier blocked");
            }

            return Ok(RateLimitResult {
                allowed: false,
                limit: tier.max_requests,
                remaining: 0,
                reset_at_ms: now_ms + tier.window_ms as i64,
                retry_after_sec: Some(tier.window_ms.div_ceil(1000)),
            });
        }

        self.store
            .window_add(&key, now_ms, Duration::from_millis(tier.window_ms))
            .await?;

        Ok(RateLimitResult {
            allowed: true,
            limit: tier.max_requests,
            remaining: tier.max_requests - count - 1,
            reset_at_ms: now_ms + tier.window_ms as i64,
            retry_after_sec: None,
        })
    }
}
