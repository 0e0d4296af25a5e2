//! Task lifecycle state machine.
//!
//! Top-level states move `todo -> doing -> review -> done`, with `review ->
//! doing` for rejected reviews. `escalated` and `blocked` are annotations on
//! a `doing` task, not extra states, which keeps the transition table small.
//! Fast-tracked creation enters `doing` directly, bypassing the intake
//! queue.

use task_orchestrator_sdk::{
    OrchestratorError, Result, Task, TaskAnnotation, TaskStatus,
};

/// Initial status for a creation request
///
/// Fast-tracked tasks are born in `doing`. The fast path is reserved for
/// production incidents, team-wide blockers, hard deadlines, and tasks with
/// 3+ direct dependents; rejecting routine fast-track requests is the
/// caller's policy decision, not the state machine's.
pub fn initial_status(fast_track: bool) -> TaskStatus {
    if fast_track {
        TaskStatus::Doing
    } else {
        TaskStatus::Todo
    }
}

/// Check a top-level move without applying it
pub fn check_transition(from: TaskStatus, to: TaskStatus) -> Result<()> {
    use TaskStatus::*;
    match (from, to) {
        (Todo, Doing) | (Doing, Review) | (Review, Done) | (Review, Doing) => Ok(()),
        _ => Err(OrchestratorError::InvalidTransition { from, to }),
    }
}

/// Apply a legal transition to a task
///
/// Leaving `doing` clears any stall annotation; the annotation describes the
/// stalled work, not the task forever.
pub fn apply_transition(task: &mut Task, to: TaskStatus) -> Result<()> {
    check_transition(task.status, to)?;
    if task.status == TaskStatus::Doing {
        task.annotation = None;
    }
    task.status = to;
    Ok(())
}

/// Set or clear a stall annotation
///
/// Annotations are sub-states of `doing`; on any other status this is an
/// illegal move and fails like one.
pub fn annotate(task: &mut Task, annotation: Option<TaskAnnotation>) -> Result<()> {
    if task.status != TaskStatus::Doing {
        return Err(OrchestratorError::InvalidTransition {
            from: task.status,
            to: TaskStatus::Doing,
        });
    }
    task.annotation = annotation;
    Ok(())
}
