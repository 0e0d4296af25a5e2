//! Shared data model for the task orchestration engine.
//!
//! This crate defines the types exchanged between the orchestration engine
//! and the external task store, the error taxonomy, and the `TaskStore`
//! collaborator trait. The engine crate (`task-orchestrator`) builds on
//! these; the store backend is expected to live elsewhere.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Local};

// Re-export async trait for convenience
pub use async_trait::async_trait;

// ============================================================================
// Task Lifecycle Types
// ============================================================================

/// Lifecycle status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    Doing,
    Review,
    Done,
}

impl TaskStatus {
    /// Stable lowercase name, matching the wire format
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stall annotation on a task in `doing`
///
/// Both are sub-states of `doing`, carried alongside the status rather than
/// as extra top-level states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskAnnotation {
    /// Work stalled, needs a different capability
    Escalated,
    /// Work stalled on an external dependency
    Blocked,
}

// ============================================================================
// Core Entities
// ============================================================================

/// A unit of work tracked in the external task store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Opaque identifier assigned by the store
    pub id: String,

    /// Project this task belongs to
    pub project_id: String,

    /// Short human-readable title
    pub title: String,

    /// Lifecycle status
    pub status: TaskStatus,

    /// Derived priority in [0, 100]; only the recompute routine writes this
    #[serde(default)]
    pub priority_score: u8,

    /// Agent or person currently responsible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    /// Optional grouping label for related work
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_tag: Option<String>,

    /// Ids of tasks this task blocks (inverse of `blocked_by`)
    #[serde(default)]
    pub blocks: BTreeSet<String>,

    /// Ids of tasks blocking this task (inverse of `blocks`)
    #[serde(default)]
    pub blocked_by: BTreeSet<String>,

    /// Stall annotation; only meaningful while status is `doing`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<TaskAnnotation>,

    /// Monotonic creation counter, used as a deterministic tie-break
    #[serde(default)]
    pub created_order: u64,

    /// Optimistic-concurrency token, bumped by the store on every write
    #[serde(default)]
    pub version: u64,
}

/// Per-status task counts for a project
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub todo: usize,
    pub doing: usize,
    pub review: usize,
    pub done: usize,
}

impl TaskCounts {
    /// Tally counts from a task list
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut counts = TaskCounts::default();
        for task in tasks {
            match task.status {
                TaskStatus::Todo => counts.todo += 1,
                TaskStatus::Doing => counts.doing += 1,
                TaskStatus::Review => counts.review += 1,
                TaskStatus::Done => counts.done += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.todo + self.doing + self.review + self.done
    }
}

/// A named collection of tasks; the authoritative copy lives in the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tech_summary: String,
    #[serde(default)]
    pub task_counts: TaskCounts,
    pub last_synced_at: DateTime<Local>,
}

/// Point-in-time summary of a project, produced by the registry cache
/// after every observed store mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub project_id: String,
    pub project_title: String,
    pub todo_count: usize,
    pub doing_count: usize,
    pub review_count: usize,
    pub observed_at: DateTime<Local>,
}

// ============================================================================
// Knowledge Modules
// ============================================================================

/// Priority tier of a knowledge module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleTier {
    Critical,
    High,
    Medium,
}

/// A unit of reference content, loaded selectively by keyword match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeModule {
    pub id: String,

    /// Trigger keywords; may mix languages, matched case-insensitively
    #[serde(default)]
    pub keywords: Vec<String>,

    pub tier: ModuleTier,

    /// Where the module content lives (path, URL, store key)
    pub content_ref: String,
}

// ============================================================================
// Store Requests
// ============================================================================

/// Creation request for a new task
///
/// `fast_track` is the hot-task fast path: the task is created directly in
/// `doing`, bypassing the intake queue. Reserved for production incidents,
/// team-wide blockers, hard deadlines, and tasks with 3+ direct dependents;
/// guarding against routine use is the caller's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub project_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_tag: Option<String>,
    /// Ids of existing tasks that block the new one
    #[serde(default)]
    pub blocked_by: BTreeSet<String>,
    #[serde(default)]
    pub fast_track: bool,
}

/// Partial update for an existing task
///
/// Only set fields are applied. `expected_version` carries the version the
/// caller last read; the store rejects the write with a conflict when it no
/// longer matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_score: Option<u8>,
    /// Outer `Some` applies the change; inner `None` clears the annotation
    #[serde(
        default,
        deserialize_with = "deserialize_explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub annotation: Option<Option<TaskAnnotation>>,
    /// Blocker ids to add; both ends of each edge are updated together
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub add_blocked_by: BTreeSet<String>,
    /// Blocker ids to remove; both ends of each edge are updated together
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub remove_blocked_by: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<u64>,
}

/// Distinguishes an absent field (no change) from an explicit `null` (clear)
fn deserialize_explicit_null<'de, T, D>(
    deserializer: D,
) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

// ============================================================================
// Errors
// ============================================================================

/// A project offered to the caller when recovery cannot decide alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectChoice {
    pub id: String,
    pub title: String,
}

/// Error taxonomy of the orchestration engine
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Referenced entity absent; propagate, do not retry
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Dependency edge forms a cycle; logged and dropped, never fatal
    #[error("dependency cycle detected on edge {from} -> {to}")]
    CycleDetected { from: String, to: String },

    /// Optimistic version mismatch on write
    #[error("concurrent modification of task {id}")]
    ConcurrencyConflict { id: String },

    /// Illegal state-machine move; always surfaced, never coerced
    #[error("invalid transition {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    /// Recovery cannot determine a unique project; the caller must choose
    #[error("ambiguous project selection ({} candidates)", candidates.len())]
    AmbiguousProjectSelection { candidates: Vec<ProjectChoice> },

    /// A store call exceeded its configured bound
    #[error("task store timeout during {operation}")]
    Timeout { operation: &'static str },

    /// Transport or backend failure talking to the task store
    #[error("task store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

// ============================================================================
// Task Store Collaborator
// ============================================================================

/// Thin interface over the external task/project CRUD API
///
/// Reads are idempotent-safe on retry; writes carry `expected_version` for
/// optimistic conflict detection. Implementations must keep `blocks` and
/// `blocked_by` mutual inverses when applying edge changes.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// List projects, optionally narrowed to a single id
    async fn find_projects(&self, id: Option<&str>) -> Result<Vec<Project>>;

    /// List tasks of a project, optionally filtered by status and assignee
    async fn find_tasks(
        &self,
        project_id: &str,
        status: Option<TaskStatus>,
        assignee: Option<&str>,
    ) -> Result<Vec<Task>>;

    /// Create a task; `fast_track` requests decide the initial status
    async fn create_task(&self, req: CreateTaskRequest) -> Result<Task>;

    /// Apply a partial update to a task
    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task>;
}
