//! Storage Seams
//!
//! The engine talks to two external stores through narrow async traits:
//! a persistence layer holding monitor/run/incident/dependency records
//! (`Repository`) and an atomic shared key-value store providing windowed
//! counters, TTL'd keys, and lock primitives (`AtomicStore`).
//!
//! In-memory implementations back every test; a database- or Redis-backed
//! implementation slots in behind the same traits.

mod error;
mod kv;
mod repository;

pub use error::StorageError;
pub use kv::{AtomicStore, MemoryStore};
pub use repository::{MemoryRepository, Repository};
