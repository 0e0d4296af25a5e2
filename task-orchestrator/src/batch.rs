//! Coherent batch selection.
//!
//! When an agent commits to a unit of work it promotes a small batch of
//! `todo` tasks to `doing` in one round-trip instead of one task at a time.
//! Three strategies are tried in order and the first that yields enough
//! coherent matches wins; the plain top-N fallback always succeeds.

use serde::{Deserialize, Serialize};
use task_orchestrator_sdk::TaskStatus;

use crate::scoring::ScoredTask;

/// Batch selection bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum tasks promoted together
    pub max_size: usize,
    /// Minimum matches for a coherence strategy to win
    pub min_coherent: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: 5,
            min_coherent: 3,
        }
    }
}

/// Which strategy produced the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStrategy {
    /// Same feature tag as the top-scored task
    FeatureTag,
    /// Same assignee as the top-scored task
    Assignee,
    /// Plain top-N by score
    TopScore,
}

/// Result of a selection run
#[derive(Debug, Clone)]
pub struct SelectedBatch {
    pub strategy: BatchStrategy,
    /// Task ids in selection order, never duplicated, len <= max_size
    pub task_ids: Vec<String>,
}

/// Select a bounded batch from a prioritized, sorted task list
///
/// Only `todo` tasks are considered. Output is deterministic given the same
/// input ordering.
pub fn select_batch(sorted: &[ScoredTask], cfg: &BatchConfig) -> SelectedBatch {
    let todo: Vec<&ScoredTask> = sorted
        .iter()
        .filter(|s| s.task.status == TaskStatus::Todo)
        .collect();

    let top = match todo.first() {
        Some(top) => top,
        None => {
            return SelectedBatch {
                strategy: BatchStrategy::TopScore,
                task_ids: Vec::new(),
            }
        }
    };

    if let Some(tag) = top.task.feature_tag.as_deref() {
        let matching: Vec<String> = todo
            .iter()
            .filter(|s| s.task.feature_tag.as_deref() == Some(tag))
            .take(cfg.max_size)
            .map(|s| s.task.id.clone())
            .collect();
        if matching.len() >= cfg.min_coherent {
            return SelectedBatch {
                strategy: BatchStrategy::FeatureTag,
                task_ids: matching,
            };
        }
    }

    if let Some(assignee) = top.task.assignee.as_deref() {
        let matching: Vec<String> = todo
            .iter()
            .filter(|s| s.task.assignee.as_deref() == Some(assignee))
            .take(cfg.max_size)
            .map(|s| s.task.id.clone())
            .collect();
        if matching.len() >= cfg.min_coherent {
            return SelectedBatch {
                strategy: BatchStrategy::Assignee,
                task_ids: matching,
            };
        }
    }

    SelectedBatch {
        strategy: BatchStrategy::TopScore,
        task_ids: todo
            .iter()
            .take(cfg.max_size)
            .map(|s| s.task.id.clone())
            .collect(),
    }
}
