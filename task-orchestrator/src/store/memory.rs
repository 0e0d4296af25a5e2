//! In-memory task store.
//!
//! Backs tests and local experiments. Mirrors the semantics the engine
//! relies on from the real store: monotonic `created_order`, version
//! bumping on every write, optimistic conflict checks, and mutual-inverse
//! maintenance of `blocks`/`blocked_by` when edges change. A single
//! injected conflict can simulate a concurrent writer.

use chrono::Local;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use task_orchestrator_sdk::{
    async_trait, CreateTaskRequest, OrchestratorError, Project, Result, Task, TaskPatch,
    TaskStatus, TaskStore,
};
use uuid::Uuid;

use crate::state;

#[derive(Default)]
struct Inner {
    projects: BTreeMap<String, Project>,
    tasks: BTreeMap<String, Task>,
    next_order: u64,
}

/// Mutex-guarded `TaskStore` implementation
#[derive(Default)]
pub struct MemoryTaskStore {
    inner: Mutex<Inner>,
    conflict_once: AtomicBool,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a project
    pub fn add_project(&self, id: &str, title: &str) {
        let mut inner = self.lock();
        inner.projects.insert(
            id.to_string(),
            Project {
                id: id.to_string(),
                title: title.to_string(),
                description: String::new(),
                tech_summary: String::new(),
                task_counts: Default::default(),
                last_synced_at: Local::now(),
            },
        );
    }

    /// Seed a task as-is, assigning the next creation order
    pub fn add_task(&self, mut task: Task) {
        let mut inner = self.lock();
        task.created_order = inner.next_order;
        inner.next_order += 1;
        inner.tasks.insert(task.id.clone(), task);
    }

    /// Make the next `update_task` fail with a conflict, simulating a
    /// concurrent writer
    pub fn inject_conflict_once(&self) {
        self.conflict_once.store(true, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn counts_for(inner: &Inner, project_id: &str) -> task_orchestrator_sdk::TaskCounts {
        let tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect();
        task_orchestrator_sdk::TaskCounts::from_tasks(&tasks)
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn find_projects(&self, id: Option<&str>) -> Result<Vec<Project>> {
        let inner = self.lock();
        let refresh = |p: &Project| {
            let mut project = p.clone();
            project.task_counts = Self::counts_for(&inner, &project.id);
            project.last_synced_at = Local::now();
            project
        };
        match id {
            None => Ok(inner.projects.values().map(refresh).collect()),
            Some(id) => match inner.projects.get(id) {
                Some(project) => Ok(vec![refresh(project)]),
                None => Err(OrchestratorError::NotFound {
                    kind: "project",
                    id: id.to_string(),
                }),
            },
        }
    }

    async fn find_tasks(
        &self,
        project_id: &str,
        status: Option<TaskStatus>,
        assignee: Option<&str>,
    ) -> Result<Vec<Task>> {
        let inner = self.lock();
        if !inner.projects.contains_key(project_id) {
            return Err(OrchestratorError::NotFound {
                kind: "project",
                id: project_id.to_string(),
            });
        }
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.project_id == project_id)
            .filter(|t| status.map_or(true, |s| t.status == s))
            .filter(|t| assignee.map_or(true, |a| t.assignee.as_deref() == Some(a)))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.created_order);
        Ok(tasks)
    }

    async fn create_task(&self, req: CreateTaskRequest) -> Result<Task> {
        let mut inner = self.lock();
        if !inner.projects.contains_key(&req.project_id) {
            return Err(OrchestratorError::NotFound {
                kind: "project",
                id: req.project_id.clone(),
            });
        }
        for blocker in &req.blocked_by {
            if !inner.tasks.contains_key(blocker) {
                return Err(OrchestratorError::NotFound {
                    kind: "task",
                    id: blocker.clone(),
                });
            }
        }

        let task = Task {
            id: Uuid::new_v4().to_string(),
            project_id: req.project_id,
            title: req.title,
            status: state::initial_status(req.fast_track),
            priority_score: 0,
            assignee: req.assignee,
            feature_tag: req.feature_tag,
            blocks: Default::default(),
            blocked_by: req.blocked_by.clone(),
            annotation: None,
            created_order: inner.next_order,
            version: 0,
        };
        inner.next_order += 1;

        // Both ends of every new edge change together
        for blocker in &req.blocked_by {
            if let Some(other) = inner.tasks.get_mut(blocker) {
                other.blocks.insert(task.id.clone());
                other.version += 1;
            }
        }
        inner.tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        if self.conflict_once.swap(false, Ordering::SeqCst) {
            return Err(OrchestratorError::ConcurrencyConflict { id: id.to_string() });
        }

        let mut inner = self.lock();
        let mut task = match inner.tasks.get(id) {
            Some(task) => task.clone(),
            None => {
                return Err(OrchestratorError::NotFound {
                    kind: "task",
                    id: id.to_string(),
                })
            }
        };

        if let Some(expected) = patch.expected_version {
            if expected != task.version {
                return Err(OrchestratorError::ConcurrencyConflict { id: id.to_string() });
            }
        }

        for blocker in &patch.add_blocked_by {
            if !inner.tasks.contains_key(blocker) {
                return Err(OrchestratorError::NotFound {
                    kind: "task",
                    id: blocker.clone(),
                });
            }
        }

        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(assignee) = patch.assignee {
            task.assignee = Some(assignee);
        }
        if let Some(feature_tag) = patch.feature_tag {
            task.feature_tag = Some(feature_tag);
        }
        if let Some(score) = patch.priority_score {
            task.priority_score = score;
        }
        if let Some(annotation) = patch.annotation {
            task.annotation = annotation;
        }
        for blocker in &patch.add_blocked_by {
            task.blocked_by.insert(blocker.clone());
            if let Some(other) = inner.tasks.get_mut(blocker) {
                other.blocks.insert(id.to_string());
                other.version += 1;
            }
        }
        for blocker in &patch.remove_blocked_by {
            task.blocked_by.remove(blocker);
            if let Some(other) = inner.tasks.get_mut(blocker) {
                other.blocks.remove(id);
                other.version += 1;
            }
        }
        task.version += 1;

        inner.tasks.insert(id.to_string(), task.clone());
        Ok(task)
    }
}
