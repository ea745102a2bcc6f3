//! Dependency graph over task instances.
//!
//! Nodes are instance indices in declaration order. Edges point from a
//! producer to a consumer. Sibling ordering is always broken by the lower
//! index, so every traversal is reproducible.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashSet};

/// Directed graph of producer → consumer edges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    /// Direct prerequisites of each node.
    dependencies: Vec<BTreeSet<usize>>,
    /// Direct consumers of each node.
    dependents: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    /// Create a graph with `len` unconnected nodes.
    pub fn with_nodes(len: usize) -> Self {
        Self {
            dependencies: vec![BTreeSet::new(); len],
            dependents: vec![BTreeSet::new(); len],
        }
    }

    /// Record that `consumer` depends on `producer`.
    ///
    /// Returns false if the edge already existed.
    pub fn add_edge(&mut self, producer: usize, consumer: usize) -> bool {
        self.dependents[producer].insert(consumer);
        self.dependencies[consumer].insert(producer)
    }

    /// Direct prerequisites of a node.
    pub fn dependencies_of(&self, node: usize) -> &BTreeSet<usize> {
        &self.dependencies[node]
    }

    /// Direct consumers of a node.
    pub fn dependents_of(&self, node: usize) -> &BTreeSet<usize> {
        &self.dependents[node]
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.dependencies.iter().map(BTreeSet::len).sum()
    }

    /// Nodes in topological order (prerequisites before consumers).
    ///
    /// Among nodes that are ready at the same time the lowest index comes
    /// first. Returns `None` if the graph has a cycle.
    pub fn topological_order(&self) -> Option<Vec<usize>> {
        let mut in_degree: Vec<usize> = self.dependencies.iter().map(BTreeSet::len).collect();

        let mut queue: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &degree)| degree == 0)
            .map(|(node, _)| Reverse(node))
            .collect();

        let mut result = Vec::with_capacity(self.len());

        while let Some(Reverse(node)) = queue.pop() {
            result.push(node);

            for &dependent in &self.dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push(Reverse(dependent));
                }
            }
        }

        (result.len() == self.len()).then_some(result)
    }

    /// Find a cycle, returning its path with the first node repeated at the end.
    pub fn find_cycle(&self) -> Option<Vec<usize>> {
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            Unvisited,
            Visiting,
            Visited,
        }

        fn dfs(
            node: usize,
            graph: &DependencyGraph,
            state: &mut [State],
            path: &mut Vec<usize>,
        ) -> Option<Vec<usize>> {
            state[node] = State::Visiting;
            path.push(node);

            for &dep in &graph.dependencies[node] {
                match state[dep] {
                    State::Visiting => {
                        let start = path.iter().position(|&n| n == dep).unwrap_or(0);
                        let mut cycle = path[start..].to_vec();
                        cycle.push(dep);
                        return Some(cycle);
                    }
                    State::Unvisited => {
                        if let Some(cycle) = dfs(dep, graph, state, path) {
                            return Some(cycle);
                        }
                    }
                    State::Visited => {}
                }
            }

            path.pop();
            state[node] = State::Visited;
            None
        }

        let mut state = vec![State::Unvisited; self.len()];
        let mut path = Vec::new();

        for node in 0..self.len() {
            if state[node] == State::Unvisited {
                if let Some(cycle) = dfs(node, self, &mut state, &mut path) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    /// Groups of nodes that can execute in parallel.
    ///
    /// Each group contains nodes whose prerequisites are all in earlier
    /// groups. Returns `None` if the graph has a cycle.
    pub fn parallel_groups(&self) -> Option<Vec<Vec<usize>>> {
        if self.find_cycle().is_some() {
            return None;
        }

        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut completed: HashSet<usize> = HashSet::new();

        while completed.len() < self.len() {
            let ready: Vec<usize> = (0..self.len())
                .filter(|n| !completed.contains(n))
                .filter(|&n| self.is_ready(n, &completed))
                .collect();

            if ready.is_empty() {
                break;
            }

            completed.extend(ready.iter().copied());
            groups.push(ready);
        }

        Some(groups)
    }

    /// Check if a node is ready given the set of finished nodes.
    pub fn is_ready(&self, node: usize, finished: &HashSet<usize>) -> bool {
        self.dependencies[node].iter().all(|d| finished.contains(d))
    }

    /// All nodes that depend on `node`, directly or indirectly.
    pub fn transitive_dependents(&self, node: usize) -> BTreeSet<usize> {
        Self::closure(node, &self.dependents)
    }

    /// All nodes `node` depends on, directly or indirectly.
    pub fn transitive_dependencies(&self, node: usize) -> BTreeSet<usize> {
        Self::closure(node, &self.dependencies)
    }

    fn closure(start: usize, edges: &[BTreeSet<usize>]) -> BTreeSet<usize> {
        let mut result = BTreeSet::new();
        let mut to_visit = vec![start];

        while let Some(current) = to_visit.pop() {
            for &next in &edges[current] {
                if result.insert(next) {
                    to_visit.push(next);
                }
            }
        }

        result
    }

    /// The subgraph induced by `keep`, re-indexed in ascending order.
    ///
    /// Returns the subgraph and the original index of each new node.
    pub fn induced(&self, keep: &BTreeSet<usize>) -> (DependencyGraph, Vec<usize>) {
        let mapping: Vec<usize> = keep.iter().copied().collect();
        let mut new_index = vec![usize::MAX; self.len()];
        for (new, &old) in mapping.iter().enumerate() {
            new_index[old] = new;
        }

        let mut graph = DependencyGraph::with_nodes(mapping.len());
        for (new, &old) in mapping.iter().enumerate() {
            for &dep in &self.dependencies[old] {
                if keep.contains(&dep) {
                    graph.add_edge(new_index[dep], new);
                }
            }
        }

        (graph, mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(len: usize, edges: &[(usize, usize)]) -> DependencyGraph {
        let mut g = DependencyGraph::with_nodes(len);
        for &(producer, consumer) in edges {
            g.add_edge(producer, consumer);
        }
        g
    }

    #[test]
    fn empty_graph() {
        let g = DependencyGraph::with_nodes(0);
        assert!(g.is_empty());
        assert_eq!(g.topological_order(), Some(vec![]));
    }

    #[test]
    fn add_edge_tracks_both_directions() {
        let mut g = DependencyGraph::with_nodes(2);
        assert!(g.add_edge(0, 1));
        assert!(!g.add_edge(0, 1));
        assert!(g.dependencies_of(1).contains(&0));
        assert!(g.dependents_of(0).contains(&1));
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn topo_sort_linear_chain() {
        let g = graph(3, &[(2, 1), (1, 0)]);
        assert_eq!(g.topological_order(), Some(vec![2, 1, 0]));
    }

    #[test]
    fn topo_sort_breaks_ties_by_index() {
        let g = graph(4, &[(0, 3), (1, 3), (2, 3)]);
        assert_eq!(g.topological_order(), Some(vec![0, 1, 2, 3]));
    }

    #[test]
    fn topo_sort_diamond() {
        let g = graph(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        assert_eq!(g.topological_order(), Some(vec![0, 1, 2, 3]));
    }

    #[test]
    fn topo_sort_detects_cycle() {
        let g = graph(2, &[(0, 1), (1, 0)]);
        assert!(g.topological_order().is_none());
    }

    #[test]
    fn no_cycle_returns_none() {
        let g = graph(2, &[(0, 1)]);
        assert!(g.find_cycle().is_none());
    }

    #[test]
    fn simple_cycle_returns_closed_path() {
        let g = graph(2, &[(0, 1), (1, 0)]);
        let cycle = g.find_cycle().unwrap();
        assert!(cycle.len() >= 3);
        assert_eq!(cycle.first(), cycle.last());
    }

    #[test]
    fn longer_cycle_contains_all_members() {
        let g = graph(4, &[(0, 1), (1, 2), (2, 0), (2, 3)]);
        let cycle = g.find_cycle().unwrap();
        for node in [0, 1, 2] {
            assert!(cycle.contains(&node));
        }
        assert!(!cycle.contains(&3));
    }

    #[test]
    fn self_cycle_detected() {
        let g = graph(1, &[(0, 0)]);
        assert_eq!(g.find_cycle(), Some(vec![0, 0]));
    }

    #[test]
    fn parallel_groups_diamond() {
        let g = graph(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let groups = g.parallel_groups().unwrap();
        assert_eq!(groups, vec![vec![0], vec![1, 2], vec![3]]);
    }

    #[test]
    fn parallel_groups_cycle_is_none() {
        let g = graph(2, &[(0, 1), (1, 0)]);
        assert!(g.parallel_groups().is_none());
    }

    #[test]
    fn is_ready_checks_prerequisites() {
        let g = graph(2, &[(0, 1)]);
        assert!(g.is_ready(0, &HashSet::new()));
        assert!(!g.is_ready(1, &HashSet::new()));
        assert!(g.is_ready(1, &HashSet::from([0])));
    }

    #[test]
    fn transitive_closures() {
        let g = graph(4, &[(0, 1), (1, 2), (3, 2)]);
        assert_eq!(g.transitive_dependents(0), BTreeSet::from([1, 2]));
        assert_eq!(g.transitive_dependencies(2), BTreeSet::from([0, 1, 3]));
        assert!(g.transitive_dependents(2).is_empty());
    }

    #[test]
    fn induced_subgraph_reindexes() {
        let g = graph(4, &[(0, 1), (1, 2), (3, 2)]);
        let (sub, mapping) = g.induced(&BTreeSet::from([1, 2, 3]));
        assert_eq!(mapping, vec![1, 2, 3]);
        assert_eq!(sub.len(), 3);
        assert!(sub.dependencies_of(1).contains(&0));
        assert!(sub.dependencies_of(1).contains(&2));
        assert!(sub.dependencies_of(0).is_empty());
    }
}
