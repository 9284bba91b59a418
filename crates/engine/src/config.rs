//! Engine configuration
//!
//! Defaults cover a single-process deployment; a `pulsewatch.toml` file or
//! `PULSEWATCH__*` environment variables override individual fields.

use admission::RateLimitTier;
use baseline::AnomalyConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window within which repeated triggers of the same kind collapse
    pub dedupe_window_minutes: i64,
    /// How far back to look for active upstream incidents
    pub cascade_lookback_minutes: i64,
    /// How long a suppressed incident stays muted
    pub suppress_hours: i64,
    /// TTL on the per-(monitor, kind) evaluation lock
    pub lock_ttl_secs: u64,
    /// Health score below which a Degraded trigger fires
    pub degraded_threshold: u32,
    /// Anomaly classifier tuning
    pub anomaly: AnomalyConfig,
    /// Admission tier applied to alert dispatch, keyed by monitor
    pub alert_tier: RateLimitTier,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dedupe_window_minutes: 60,
            cascade_lookback_minutes: depgraph::DEFAULT_LOOKBACK_MINUTES,
            suppress_hours: 24,
            lock_ttl_secs: 30,
            degraded_threshold: 60,
            anomaly: AnomalyConfig::default(),
            alert_tier: RateLimitTier {
                key_prefix: "alerts".into(),
                window_ms: 60_000,
                max_requests: 30,
                block_duration_ms: None,
            },
        }
    }
}

impl EngineConfig {
    /// Layer defaults < `pulsewatch.toml` < `PULSEWATCH__*` env vars
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name("pulsewatch").required(false))
            .add_source(::config::Environment::with_prefix("PULSEWATCH").separator("__"))
            .build()?;
        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.dedupe_window_minutes, 60);
        assert_eq!(cfg.suppress_hours, 24);
        assert_eq!(cfg.anomaly.z_threshold, 3.0);
        assert_eq!(cfg.alert_tier.key_prefix, "alerts");
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let cfg = EngineConfig::load().unwrap();
        assert_eq!(cfg.cascade_lookback_minutes, 60);
    }
}
