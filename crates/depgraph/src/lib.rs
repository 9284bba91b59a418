//! Dependency Graph Engine
//!
//! Maintains the directed (acyclic) dependency graph over monitors and
//! answers the questions the incident lifecycle needs: "is this monitor's
//! failure explained by a required upstream?", "who is downstream of this
//! root cause?", and "would this new edge close a cycle?".
//!
//! Edges are bulk-loaded into an in-memory adjacency snapshot before any
//! traversal; BFS/DFS then run without further round trips.

mod engine;
mod graph;

pub use engine::{GraphEngine, GraphError, SuppressionCause, DEFAULT_LOOKBACK_MINUTES};
pub use graph::{ChainNode, DependencyGraph, Downstream, DEFAULT_MAX_DEPTH};
