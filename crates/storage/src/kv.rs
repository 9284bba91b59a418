//! Atomic key-value store seam and in-memory implementation
//!
//! Models the primitives the rate limiter and distributed lock need from a
//! shared store (Redis in a fleet deployment): a per-key timestamp window
//! with expiry, plain TTL'd values, and set-if-absent.

use crate::StorageError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Atomic shared-store contract.
///
/// Every operation is a single short round trip; callers treat errors as
/// store unavailability (the limiter fails open, locks report not-acquired).
#[async_trait]
pub trait AtomicStore: Send + Sync {
    /// Drop window entries with timestamps at or below `cutoff_ms`
    async fn window_prune(&self, key: &str, cutoff_ms: i64) -> Result<(), StorageError>;
    /// Count remaining entries in the window
    async fn window_count(&self, key: &str) -> Result<u64, StorageError>;
    /// Record an entry at `timestamp_ms` and refresh the window's TTL
    async fn window_add(
        &self,
        key: &str,
        timestamp_ms: i64,
        ttl: Duration,
    ) -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
    /// `SET key value EX ttl NX`; returns true if the key was absent and is now set
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StorageError>;
}

struct ValueEntry {
    value: String,
    expires_at: Instant,
}

struct WindowEntry {
    timestamps: Vec<i64>,
    expires_at: Instant,
}

/// In-memory store with TTL handling, for tests and single-process use
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, ValueEntry>>,
    windows: Mutex<HashMap<String, WindowEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_value(values: &mut HashMap<String, ValueEntry>, key: &str) -> Option<String> {
        match values.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                values.remove(key);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl AtomicStore for MemoryStore {
    async fn window_prune(&self, key: &str, cutoff_ms: i64) -> Result<(), StorageError> {
        let mut windows = self.windows.lock();
        if let Some(entry) = windows.get_mut(key) {
            if entry.expires_at <= Instant::now() {
                windows.remove(key);
            } else {
                entry.timestamps.retain(|&t| t > cutoff_ms);
            }
        }
        Ok(())
    }

    async fn window_count(&self, key: &str) -> Result<u64, StorageError> {
        let windows = self.windows.lock();
        Ok(windows
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map_or(0, |e| e.timestamps.len() as u64))
    }

    async fn window_add(
        &self,
        key: &str,
        timestamp_ms: i64,
        ttl: Duration,
    ) -> Result<(), StorageError> {
        let mut windows = self.windows.lock();
        let expires_at = Instant::now() + ttl;
        let entry = windows.entry(key.to_string()).or_insert_with(|| WindowEntry {
            timestamps: Vec::new(),
            expires_at,
        });
        entry.timestamps.push(timestamp_ms);
        entry.expires_at = expires_at;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut values = self.values.lock();
        Ok(Self::live_value(&mut values, key))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError> {
        self.values.lock().insert(
            key.to_string(),
            ValueEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.values.lock().remove(key);
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StorageError> {
        let mut values = self.values.lock();
        if Self::live_value(&mut values, key).is_some() {
            return Ok(false);
        }
        values.insert(
            key.to_string(),
            ValueEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(true)
    }
}
