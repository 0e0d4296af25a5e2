//! Dependency graph builder.
//!
//! Turns the full task list of one project into an index-based adjacency
//! structure (task id -> dense index, edge lists per index). The input is
//! agent-authored and occasionally inconsistent, so the builder never fails:
//! unknown referenced ids are dropped with a warning, and edges that close a
//! cycle are reported and excluded from the residual graph while everything
//! else proceeds.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use task_orchestrator_sdk::Task;
use tracing::warn;

/// Non-fatal problem found while building the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphWarning {
    /// A task referenced an id that is not in the project's task set
    UnknownReference { task_id: String, referenced: String },
    /// Edge closes a cycle; it is excluded from the residual graph
    CycleDetected { from: String, to: String },
}

impl fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphWarning::UnknownReference { task_id, referenced } => {
                write!(f, "task {} references unknown id {}", task_id, referenced)
            }
            GraphWarning::CycleDetected { from, to } => {
                write!(f, "dependency cycle on edge {} -> {}", from, to)
            }
        }
    }
}

/// Directed blocking graph of one project's tasks
///
/// Edges run blocker -> blocked. Adjacency lists hold the acyclic residual:
/// edges whose traversal re-entered an in-progress node are dropped and
/// recorded as warnings.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    blocks: Vec<Vec<usize>>,
    blocked_by: Vec<Vec<usize>>,
    warnings: Vec<GraphWarning>,
}

impl DependencyGraph {
    /// Build the graph from a project's task list
    ///
    /// Edges declared on either end (`blocks` or `blocked_by`) are
    /// materialized in both directions. Never fails on malformed input.
    pub fn build(tasks: &[Task]) -> Self {
        let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        let index: HashMap<String, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        let mut warnings = Vec::new();

        // Deduplicated edge set in deterministic order
        let mut edges: BTreeSet<(usize, usize)> = BTreeSet::new();
        for (i, task) in tasks.iter().enumerate() {
            for blocked in &task.blocks {
                match index.get(blocked) {
                    Some(&j) => {
                        edges.insert((i, j));
                    }
                    None => warnings.push(GraphWarning::UnknownReference {
                        task_id: task.id.clone(),
                        referenced: blocked.clone(),
                    }),
                }
            }
            for blocker in &task.blocked_by {
                match index.get(blocker) {
                    Some(&j) => {
                        edges.insert((j, i));
                    }
                    None => warnings.push(GraphWarning::UnknownReference {
                        task_id: task.id.clone(),
                        referenced: blocker.clone(),
                    }),
                }
            }
        }

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
        for &(from, to) in &edges {
            adjacency[from].push(to);
        }

        let excluded = detect_cycles(&adjacency, &ids, &mut warnings);

        let mut blocks: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
        let mut blocked_by: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
        for &(from, to) in &edges {
            if excluded.contains(&(from, to)) {
                continue;
            }
            blocks[from].push(to);
            blocked_by[to].push(from);
        }

        for warning in &warnings {
            warn!(%warning, "dependency graph irregularity");
        }

        Self {
            ids,
            index,
            blocks,
            blocked_by,
            warnings,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Task ids in input order; index positions match adjacency lists
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn id_at(&self, idx: usize) -> &str {
        &self.ids[idx]
    }

    /// Tasks directly blocked by `idx` (residual, cycle edges excluded)
    pub fn blocks_of(&self, idx: usize) -> &[usize] {
        &self.blocks[idx]
    }

    /// Tasks directly blocking `idx` (residual, cycle edges excluded)
    pub fn blocked_by_of(&self, idx: usize) -> &[usize] {
        &self.blocked_by[idx]
    }

    /// Number of tasks `id` directly blocks after cycle-edge exclusion
    pub fn direct_blocks_count(&self, id: &str) -> usize {
        self.index_of(id).map_or(0, |i| self.blocks[i].len())
    }

    pub fn warnings(&self) -> &[GraphWarning] {
        &self.warnings
    }
}

/// Three-color depth-first traversal over the raw adjacency
///
/// Returns the set of edges that point into an in-progress node. Traversal
/// order is index order, so the excluded set is deterministic for a given
/// input ordering.
fn detect_cycles(
    adjacency: &[Vec<usize>],
    ids: &[String],
    warnings: &mut Vec<GraphWarning>,
) -> HashSet<(usize, usize)> {
    const WHITE: u8 = 0;
    const GRAY: u8 = 1;
    const BLACK: u8 = 2;

    let mut color = vec![WHITE; adjacency.len()];
    let mut excluded = HashSet::new();

    for root in 0..adjacency.len() {
        if color[root] != WHITE {
            continue;
        }
        color[root] = GRAY;
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

        loop {
            let step = {
                let frame = match stack.last_mut() {
                    Some(frame) => frame,
                    None => break,
                };
                let node = frame.0;
                if frame.1 < adjacency[node].len() {
                    let child = adjacency[node][frame.1];
                    frame.1 += 1;
                    Some((node, child))
                } else {
                    None
                }
            };

            match step {
                None => {
                    if let Some((node, _)) = stack.pop() {
                        color[node] = BLACK;
                    }
                }
                Some((node, child)) => match color[child] {
                    WHITE => {
                        color[child] = GRAY;
                        stack.push((child, 0));
                    }
                    GRAY => {
                        // Back edge: drop this single edge, keep the rest
                        excluded.insert((node, child));
                        warnings.push(GraphWarning::CycleDetected {
                            from: ids[node].clone(),
                            to: ids[child].clone(),
                        });
                    }
                    _ => {}
                },
            }
        }
    }

    excluded
}
