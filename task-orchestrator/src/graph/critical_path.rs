//! Critical path analysis on the acyclic residual graph.
//!
//! Computes, per task, the length of the longest blocking chain starting at
//! it, the number of distinct tasks it transitively blocks, and membership
//! in the set of maximum-length chains. Multiple chains may share the
//! maximum length; every task participating in any of them is marked.

use std::collections::VecDeque;

use super::builder::DependencyGraph;

/// Per-task results of a critical path computation
#[derive(Debug, Clone)]
pub struct CriticalPathAnalysis {
    chain_len: Vec<usize>,
    dependents: Vec<usize>,
    on_critical_path: Vec<bool>,
    max_chain_len: usize,
}

impl CriticalPathAnalysis {
    /// Length of the longest blocking chain starting at `idx` (inclusive)
    pub fn chain_len_at(&self, idx: usize) -> usize {
        self.chain_len[idx]
    }

    /// Distinct tasks transitively blocked by `idx`
    pub fn dependents_at(&self, idx: usize) -> usize {
        self.dependents[idx]
    }

    pub fn is_on_critical_path(&self, idx: usize) -> bool {
        self.on_critical_path[idx]
    }

    /// Length of the longest chain in the graph; 0 or 1 means no blocking
    /// relationships exist at all
    pub fn max_chain_len(&self) -> usize {
        self.max_chain_len
    }

    /// Ids of all tasks on any maximum-length chain, in graph order
    pub fn members<'a>(&self, graph: &'a DependencyGraph) -> Vec<&'a str> {
        (0..graph.len())
            .filter(|&i| self.on_critical_path[i])
            .map(|i| graph.id_at(i))
            .collect()
    }
}

/// Analyze the residual graph produced by the builder
///
/// The residual is acyclic, so chain lengths are computed by dynamic
/// programming over a topological order (the memoized form of the DFS
/// recurrence). A chain needs at least one edge: when no edges exist the
/// critical path set is empty rather than every isolated task.
pub fn analyze(graph: &DependencyGraph) -> CriticalPathAnalysis {
    let n = graph.len();
    let order = topological_order(graph);

    // Longest chain starting at each node, following blocks edges
    let mut chain_len = vec![1usize; n];
    for &node in order.iter().rev() {
        for &child in graph.blocks_of(node) {
            chain_len[node] = chain_len[node].max(1 + chain_len[child]);
        }
    }

    // Longest chain ending at each node, following blocked_by edges
    let mut tail_len = vec![1usize; n];
    for &node in &order {
        for &parent in graph.blocked_by_of(node) {
            tail_len[node] = tail_len[node].max(1 + tail_len[parent]);
        }
    }

    let max_chain_len = chain_len.iter().copied().max().unwrap_or(0);

    // A node lies on some maximum-length chain iff the longest chain
    // through it reaches the maximum
    let mut on_critical_path = vec![false; n];
    if max_chain_len > 1 {
        for i in 0..n {
            on_critical_path[i] = chain_len[i] + tail_len[i] - 1 == max_chain_len;
        }
    }

    let dependents = (0..n).map(|i| count_descendants(graph, i)).collect();

    CriticalPathAnalysis {
        chain_len,
        dependents,
        on_critical_path,
        max_chain_len,
    }
}

/// Kahn's algorithm over the residual blocks edges
fn topological_order(graph: &DependencyGraph) -> Vec<usize> {
    let n = graph.len();
    let mut indegree: Vec<usize> = (0..n).map(|i| graph.blocked_by_of(i).len()).collect();
    let mut queue: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(node) = queue.pop_front() {
        order.push(node);
        for &child in graph.blocks_of(node) {
            indegree[child] -= 1;
            if indegree[child] == 0 {
                queue.push_back(child);
            }
        }
    }

    debug_assert_eq!(order.len(), n, "residual graph must be acyclic");
    order
}

/// Distinct nodes reachable from `start` along blocks edges
fn count_descendants(graph: &DependencyGraph, start: usize) -> usize {
    let mut visited = vec![false; graph.len()];
    let mut stack: Vec<usize> = graph.blocks_of(start).to_vec();
    let mut count = 0;

    while let Some(node) = stack.pop() {
        if visited[node] {
            continue;
        }
        visited[node] = true;
        count += 1;
        stack.extend_from_slice(graph.blocks_of(node));
    }

    count
}
