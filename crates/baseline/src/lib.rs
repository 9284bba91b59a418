//! Statistical Baseline Tracking and Classification
//!
//! Maintains a running mean/variance of each monitor's successful run
//! duration (Welford's algorithm), classifies new durations against that
//! baseline (z-score), and scores overall monitor health.

mod anomaly;
mod health;
mod tracker;
mod welford;

pub use anomaly::{AnomalyConfig, AnomalySeverity, AnomalyVerdict, classify_duration};
pub use health::{Grade, HealthScore, HealthInput, calculate_health_score, mtbf_hours, mttr_minutes};
pub use tracker::BaselineBook;
pub use welford::{WelfordStats, median, percentile, z_score, MIN_SAMPLES};
