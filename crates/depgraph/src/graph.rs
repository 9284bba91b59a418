//! In-memory adjacency snapshot and pure graph algorithms

use model::{MonitorDependency, MonitorId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Default BFS truncation depth for dependency chains
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// One node in a dependency chain traversal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainNode {
    pub id: MonitorId,
    pub name: String,
    pub depth: usize,
    /// Monitor ids from the traversal start to this node, inclusive
    pub path: Vec<MonitorId>,
}

/// One-hop reverse lookup entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Downstream {
    pub id: MonitorId,
    pub name: String,
    pub required: bool,
}

/// Adjacency-list snapshot of the dependency graph.
///
/// Built from one bulk edge read plus monitor names, then discarded after
/// the traversal; it never mutates shared state.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    forward: HashMap<MonitorId, Vec<(MonitorId, bool)>>,
    reverse: HashMap<MonitorId, Vec<(MonitorId, bool)>>,
    names: HashMap<MonitorId, String>,
}

impl DependencyGraph {
    pub fn new(edges: &[MonitorDependency], names: HashMap<MonitorId, String>) -> Self {
        let mut graph = Self {
            names,
            ..Self::default()
        };
        for edge in edges {
            graph.insert_edge(edge);
        }
        graph
    }

    fn insert_edge(&mut self, edge: &MonitorDependency) {
        self.forward
            .entry(edge.monitor_id)
            .or_default()
            .push((edge.depends_on, edge.required));
        self.reverse
            .entry(edge.depends_on)
            .or_default()
            .push((edge.monitor_id, edge.required));
    }

    fn name_of(&self, id: MonitorId) -> String {
        self.names.get(&id).cloned().unwrap_or_else(|| id.to_string())
    }

    /// Required upstream dependencies of `monitor_id`
    pub fn required_dependencies(&self, monitor_id: MonitorId) -> Vec<MonitorId> {
        self.forward
            .get(&monitor_id)
            .map(|deps| {
                deps.iter()
                    .filter(|(_, required)| *required)
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All monitors that declare a dependency on `monitor_id` (one hop)
    pub fn downstream(&self, monitor_id: MonitorId) -> Vec<Downstream> {
        self.reverse
            .get(&monitor_id)
            .map(|deps| {
                deps.iter()
                    .map(|(id, required)| Downstream {
                        id: *id,
                        name: self.name_of(*id),
                        required: *required,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Breadth-first walk over forward edges starting at `start`.
    ///
    /// Each node is visited at most once; traversal is truncated below
    /// `max_depth`. The start node itself is the depth-0 entry.
    pub fn dependency_chain(&self, start: MonitorId, max_depth: usize) -> Vec<ChainNode> {
        let mut visited: HashSet<MonitorId> = HashSet::new();
        let mut result = Vec::new();
        let mut queue: VecDeque<(MonitorId, usize, Vec<MonitorId>)> = VecDeque::new();
        queue.push_back((start, 0, vec![start]));

        while let Some((id, depth, path)) = queue.pop_front() {
            if !visited.insert(id) || depth > max_depth {
                continue;
            }

            result.push(ChainNode {
                id,
                name: self.name_of(id),
                depth,
                path: path.clone(),
            });

            if let Some(deps) = self.forward.get(&id) {
                for (dep, _) in deps {
                    if !visited.contains(dep) {
                        let mut next_path = path.clone();
                        next_path.push(*dep);
                        queue.push_back((*dep, depth + 1, next_path));
                    }
                }
            }
        }

        result
    }

    /// Depth-first cycle check from `start`, using a recursion stack.
    ///
    /// Returns true the moment a node already on the stack is reached again.
    pub fn has_cycle_from(&self, start: MonitorId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = HashSet::new();
        self.dfs_cycle(start, &mut visited, &mut stack)
    }

    /// Whether adding `from -> to` would close a cycle in this graph
    pub fn would_create_cycle(&self, from: MonitorId, to: MonitorId) -> bool {
        if from == to {
            return true;
        }
        // A cycle appears exactly when `from` is already reachable from `to`
        let mut visited = HashSet::new();
        self.reaches(to, from, &mut visited)
    }

    fn dfs_cycle(
        &self,
        node: MonitorId,
        visited: &mut HashSet<MonitorId>,
        stack: &mut HashSet<MonitorId>,
    ) -> bool {
        visited.insert(node);
        stack.insert(node);

        if let Some(deps) = self.forward.get(&node) {
            for (dep, _) in deps {
                if !visited.contains(dep) {
                    if self.dfs_cycle(*dep, visited, stack) {
                        return true;
                    }
                } else if stack.contains(dep) {
                    return true;
                }
            }
        }

        stack.remove(&node);
        false
    }

    fn reaches(&self, from: MonitorId, target: MonitorId, visited: &mut HashSet<MonitorId>) -> bool {
        if from == target {
            return true;
        }
        if !visited.insert(from) {
            return false;
        }
        self.forward
            .get(&from)
            .map(|deps| deps.iter().any(|(dep, _)| self.reaches(*dep, target, visited)))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<MonitorId> {
        (0..n).map(|_| MonitorId::new()).collect()
    }

    fn graph(edges: &[(MonitorId, MonitorId, bool)]) -> DependencyGraph {
        let edges: Vec<MonitorDependency> = edges
            .iter()
            .map(|(m, d, required)| MonitorDependency {
                monitor_id: *m,
                depends_on: *d,
                required: *required,
            })
            .collect();
        DependencyGraph::new(&edges, HashMap::new())
    }

    #[test]
    fn test_required_dependencies_filter() {
        let m = ids(3);
        let g = graph(&[(m[0], m[1], true), (m[0], m[2], false)]);

        let required = g.required_dependencies(m[0]);
        assert_eq!(required, vec![m[1]]);
    }

    #[test]
    fn test_downstream_reverse_lookup() {
        let m = ids(3);
        let g = graph(&[(m[1], m[0], true), (m[2], m[0], false)]);

        let down = g.downstream(m[0]);
        assert_eq!(down.len(), 2);
        assert!(down.iter().any(|d| d.id == m[1] && d.required));
        assert!(down.iter().any(|d| d.id == m[2] && !d.required));
        assert!(g.downstream(m[1]).is_empty());
    }

    #[test]
    fn test_chain_visits_each_node_once() {
        // Diamond: a -> b, a -> c, b -> d, c -> d
        let m = ids(4);
        let g = graph(&[
            (m[0], m[1], true),
            (m[0], m[2], true),
            (m[1], m[3], true),
            (m[2], m[3], true),
        ]);

        let chain = g.dependency_chain(m[0], DEFAULT_MAX_DEPTH);
        assert_eq!(chain.len(), 4);
        let d_node = chain.iter().find(|n| n.id == m[3]).unwrap();
        assert_eq!(d_node.depth, 2);
        assert_eq!(d_node.path.len(), 3);
    }

    #[test]
    fn test_chain_truncates_at_max_depth() {
        // Linear chain of 6 nodes
        let m = ids(6);
        let edges: Vec<_> = (0..5).map(|i| (m[i], m[i + 1], true)).collect();
        let g = graph(&edges);

        let chain = g.dependency_chain(m[0], 2);
        assert_eq!(chain.len(), 3);
        assert!(chain.iter().all(|n| n.depth <= 2));
    }

    #[test]
    fn test_cycle_detection_positive() {
        // a -> b -> c -> a
        let m = ids(3);
        let g = graph(&[(m[0], m[1], true), (m[1], m[2], true), (m[2], m[0], true)]);
        assert!(g.has_cycle_from(m[0]));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        // a -> b, b -> c, a -> c
        let m = ids(3);
        let g = graph(&[(m[0], m[1], true), (m[1], m[2], true), (m[0], m[2], true)]);
        assert!(!g.has_cycle_from(m[0]));
    }

    #[test]
    fn test_would_create_cycle() {
        let m = ids(3);
        let g = graph(&[(m[0], m[1], true), (m[1], m[2], true)]);

        assert!(g.would_create_cycle(m[2], m[0]));
        assert!(g.would_create_cycle(m[1], m[0]));
        assert!(g.would_create_cycle(m[0], m[0]));
        assert!(!g.would_create_cycle(m[0], m[2]));
    }
}
