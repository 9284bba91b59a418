//! Per-monitor baseline book
//!
//! Concurrent Success runs for the same monitor must not race on the Welford
//! fields (a lost update corrupts the baseline permanently). The book keys
//! statistics by monitor id and applies updates under the map's entry lock,
//! so updates for one monitor serialize while different monitors stay
//! parallel.

use crate::welford::WelfordStats;
use dashmap::DashMap;
use model::{BaselineStats, MonitorId};
use tracing::debug;

/// Concurrent map of per-monitor Welford state
#[derive(Debug, Default)]
pub struct BaselineBook {
    stats: DashMap<MonitorId, WelfordStats>,
}

impl BaselineBook {
    pub fn new() -> Self {
        Self {
            stats: DashMap::new(),
        }
    }

    /// Seed a monitor's baseline from its persisted record
    pub fn load(&self, monitor_id: MonitorId, stats: BaselineStats) {
        self.stats.insert(monitor_id, WelfordStats::from_stats(stats));
    }

    /// Fold one successful duration in and return the updated snapshot.
    ///
    /// The dashmap entry lock makes the read-modify-write atomic per monitor.
    pub fn record_success(&self, monitor_id: MonitorId, duration_ms: f64) -> BaselineStats {
        let mut entry = self.stats.entry(monitor_id).or_default();
        entry.update(duration_ms);
        debug!(%monitor_id, duration_ms, count = entry.count(), "baseline updated");
        entry.into_stats()
    }

    /// Current snapshot for a monitor, if any updates have been recorded
    pub fn get(&self, monitor_id: MonitorId) -> Option<WelfordStats> {
        self.stats.get(&monitor_id).map(|s| *s)
    }

    /// Drop a monitor's in-memory state (e.g. on monitor deletion)
    pub fn evict(&self, monitor_id: MonitorId) {
        self.stats.remove(&monitor_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_record_and_get() {
        let book = BaselineBook::new();
        let id = MonitorId::new();

        book.record_success(id, 100.0);
        book.record_success(id, 120.0);

        let stats = book.get(id).unwrap();
        assert_eq!(stats.count(), 2);
        assert!((stats.mean() - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_load_seeds_existing_state() {
        let book = BaselineBook::new();
        let id = MonitorId::new();

        let persisted = BaselineStats {
            count: 5,
            mean: 200.0,
            m2: 100.0,
            min: Some(180.0),
            max: Some(220.0),
        };
        book.load(id, persisted);
        book.record_success(id, 200.0);

        assert_eq!(book.get(id).unwrap().count(), 6);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let book = Arc::new(BaselineBook::new());
        let id = MonitorId::new();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let book = Arc::clone(&book);
                thread::spawn(move || {
                    for _ in 0..100 {
                        book.record_success(id, 100.0);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(book.get(id).unwrap().count(), 800);
    }

    #[test]
    fn test_evict() {
        let book = BaselineBook::new();
        let id = MonitorId::new();
        book.record_success(id, 50.0);
        book.evict(id);
        assert!(book.get(id).is_none());
    }
}
