//! Priority scoring.
//!
//! Converts graph and status signals into a bounded score per task. The
//! scorer is pure: it never talks to the store, and the caller is
//! responsible for persisting recomputed scores. Recompute is triggered on
//! task creation, status change, and edge addition/removal.
//!
//! The weights mirror the values the workflow was originally tuned with
//! (doing=100, review=80, blocks=10, critical path=30, dependents=5) but are
//! plain configuration, not invariants.

use serde::{Deserialize, Serialize};
use task_orchestrator_sdk::{Task, TaskStatus};

use crate::graph::{CriticalPathAnalysis, DependencyGraph};

/// Configurable scoring weights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Status contribution for `doing`
    pub status_doing: u32,
    /// Status contribution for `review`
    pub status_review: u32,
    /// Status contribution for `todo`
    pub status_todo: u32,
    /// Per directly-blocked task
    pub direct_blocks: u32,
    /// Flat bonus for critical path membership
    pub critical_path: u32,
    /// Per transitively-blocked task
    pub dependents: u32,
    /// Scores are clamped to [0, ceiling]
    pub ceiling: u8,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            status_doing: 100,
            status_review: 80,
            status_todo: 0,
            direct_blocks: 10,
            critical_path: 30,
            dependents: 5,
            ceiling: 100,
        }
    }
}

impl ScoreWeights {
    fn status_weight(&self, status: TaskStatus) -> u32 {
        match status {
            TaskStatus::Doing => self.status_doing,
            TaskStatus::Review => self.status_review,
            TaskStatus::Todo => self.status_todo,
            TaskStatus::Done => 0,
        }
    }
}

/// A task with its recomputed score
#[derive(Debug, Clone)]
pub struct ScoredTask {
    pub task: Task,
    pub score: u8,
}

/// Score every task and return them sorted for selection
///
/// Ordering is score descending, then `created_order` ascending, then id.
/// Fully deterministic, so downstream selection never flaps between
/// equivalent reprioritizations.
pub fn score_tasks(
    tasks: &[Task],
    graph: &DependencyGraph,
    analysis: &CriticalPathAnalysis,
    weights: &ScoreWeights,
) -> Vec<ScoredTask> {
    let mut scored: Vec<ScoredTask> = tasks
        .iter()
        .map(|task| ScoredTask {
            score: score_one(task, graph, analysis, weights),
            task: task.clone(),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.task.created_order.cmp(&b.task.created_order))
            .then(a.task.id.cmp(&b.task.id))
    });
    scored
}

fn score_one(
    task: &Task,
    graph: &DependencyGraph,
    analysis: &CriticalPathAnalysis,
    weights: &ScoreWeights,
) -> u8 {
    let mut raw = weights.status_weight(task.status);

    if let Some(idx) = graph.index_of(&task.id) {
        raw += weights.direct_blocks * graph.blocks_of(idx).len() as u32;
        if analysis.is_on_critical_path(idx) {
            raw += weights.critical_path;
        }
        raw += weights.dependents * analysis.dependents_at(idx) as u32;
    }

    raw.min(weights.ceiling as u32) as u8
}
