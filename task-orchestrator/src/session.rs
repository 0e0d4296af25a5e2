//! Orchestration session facade.
//!
//! Ties the engine together for one caller: reprioritization runs, task
//! creation, lifecycle moves, batch promotion, and context recovery. Every
//! mutation ends with a reprioritization of the touched project and a
//! write-through of the observed state into the registry cache, so the
//! cache tracks the store without its own sync protocol.
//!
//! Concurrency conflicts are absorbed here, once: a conflicting write is
//! retried a single time against a fresh read, then surfaced.

use std::sync::Arc;
use task_orchestrator_sdk::{
    CreateTaskRequest, OrchestratorError, Project, Result, Task, TaskAnnotation, TaskCounts,
    TaskPatch, TaskStatus, TaskStore,
};
use tracing::{debug, info, warn};

use crate::batch::{self, SelectedBatch};
use crate::config::OrchestratorConfig;
use crate::graph::{analyze, DependencyGraph, GraphWarning};
use crate::recovery::{ContextRecoveryResolver, ResolvedContext};
use crate::registry::RegistryCache;
use crate::scoring::{score_tasks, ScoredTask};
use crate::state;

/// Outcome of one reprioritization run over a project
#[derive(Debug, Clone)]
pub struct PrioritizationRun {
    /// Tasks sorted by score descending, with persisted scores
    pub scored: Vec<ScoredTask>,
    /// Graph problems found along the way, already logged
    pub warnings: Vec<GraphWarning>,
}

/// One caller's handle on the orchestration engine
pub struct Session {
    store: Arc<dyn TaskStore>,
    cache: RegistryCache,
    config: OrchestratorConfig,
}

impl Session {
    pub fn new(store: Arc<dyn TaskStore>, cache: RegistryCache, config: OrchestratorConfig) -> Self {
        Self { store, cache, config }
    }

    /// Re-establish working context after a memory loss
    pub async fn recover(&self) -> Result<ResolvedContext> {
        let resolver = ContextRecoveryResolver::new(
            self.store.clone(),
            self.cache.clone(),
            self.config.recovery.clone(),
        );
        resolver.resolve().await
    }

    /// First line of any response produced under a recovered context
    pub fn status_header(ctx: &ResolvedContext) -> String {
        format!("[{}] {}", ctx.project_id, ctx.project_title)
    }

    /// Same header for an explicitly named project
    pub async fn project_header(&self, project_id: &str) -> Result<String> {
        let project = self.fetch_project(project_id).await?;
        Ok(format!("[{}] {}", project.id, project.title))
    }

    /// Rebuild the graph, rescore every task, and persist changed scores
    pub async fn prioritize(&self, project_id: &str) -> Result<PrioritizationRun> {
        let project = self.fetch_project(project_id).await?;
        let tasks = self.store.find_tasks(project_id, None, None).await?;

        let graph = DependencyGraph::build(&tasks);
        for warning in graph.warnings() {
            warn!(project_id, %warning, "dependency graph warning");
        }
        let analysis = analyze(&graph);
        let mut scored = score_tasks(&tasks, &graph, &analysis, &self.config.weights);

        // Persist only the deltas, carrying fresh versions back into the run
        for entry in &mut scored {
            if entry.score == entry.task.priority_score {
                continue;
            }
            let patch = TaskPatch {
                priority_score: Some(entry.score),
                expected_version: Some(entry.task.version),
                ..Default::default()
            };
            entry.task = self.update_with_retry(project_id, &entry.task.id, patch).await?;
        }

        debug!(project_id, tasks = tasks.len(), "reprioritization complete");
        self.write_through(&project, TaskCounts::from_tasks(&tasks));
        Ok(PrioritizationRun {
            scored,
            warnings: graph.warnings().to_vec(),
        })
    }

    /// Create a task and fold it into the project's priorities
    pub async fn create_task(&self, req: CreateTaskRequest) -> Result<Task> {
        let project_id = req.project_id.clone();
        let created = self.store.create_task(req).await?;
        info!(%project_id, task_id = %created.id, status = %created.status, "task created");

        let run = self.prioritize(&project_id).await?;
        // Return the scored copy so the caller sees the settled priority
        Ok(run
            .scored
            .into_iter()
            .map(|s| s.task)
            .find(|t| t.id == created.id)
            .unwrap_or(created))
    }

    /// Move a task through the lifecycle state machine
    pub async fn set_status(
        &self,
        project_id: &str,
        task_id: &str,
        to: TaskStatus,
    ) -> Result<Task> {
        let task = self.fetch_task(project_id, task_id).await?;
        state::check_transition(task.status, to)?;

        let patch = TaskPatch {
            status: Some(to),
            // Leaving `doing` retires the stall annotation with it
            annotation: if task.status == TaskStatus::Doing && task.annotation.is_some() {
                Some(None)
            } else {
                None
            },
            expected_version: Some(task.version),
            ..Default::default()
        };
        let updated = self.update_with_retry(project_id, task_id, patch).await?;
        info!(project_id, task_id, from = %task.status, to = %to, "status changed");

        self.prioritize(project_id).await?;
        Ok(updated)
    }

    /// Set or clear a stall annotation on a `doing` task
    pub async fn annotate(
        &self,
        project_id: &str,
        task_id: &str,
        annotation: Option<TaskAnnotation>,
    ) -> Result<Task> {
        let task = self.fetch_task(project_id, task_id).await?;
        if task.status != TaskStatus::Doing {
            return Err(OrchestratorError::InvalidTransition {
                from: task.status,
                to: TaskStatus::Doing,
            });
        }

        let patch = TaskPatch {
            annotation: Some(annotation),
            expected_version: Some(task.version),
            ..Default::default()
        };
        let updated = self.update_with_retry(project_id, task_id, patch).await?;

        // Annotation-only activity still counts as an observation
        let project = self.fetch_project(project_id).await?;
        let tasks = self.store.find_tasks(project_id, None, None).await?;
        self.write_through(&project, TaskCounts::from_tasks(&tasks));
        Ok(updated)
    }

    /// Record that `blocker_id` blocks `task_id`, then rescore
    ///
    /// A cycle closed by the new edge is not rejected here; the next graph
    /// build drops the edge from the residual and reports a warning.
    pub async fn add_dependency(
        &self,
        project_id: &str,
        task_id: &str,
        blocker_id: &str,
    ) -> Result<PrioritizationRun> {
        let task = self.fetch_task(project_id, task_id).await?;
        let patch = TaskPatch {
            add_blocked_by: [blocker_id.to_string()].into(),
            expected_version: Some(task.version),
            ..Default::default()
        };
        self.update_with_retry(project_id, task_id, patch).await?;
        info!(project_id, task_id, blocker_id, "dependency added");

        self.prioritize(project_id).await
    }

    /// Promote a coherent batch of `todo` tasks to `doing`
    pub async fn promote_batch(&self, project_id: &str) -> Result<SelectedBatch> {
        let run = self.prioritize(project_id).await?;
        let selected = batch::select_batch(&run.scored, &self.config.batch);
        info!(
            project_id,
            strategy = ?selected.strategy,
            size = selected.task_ids.len(),
            "batch selected"
        );

        for task_id in &selected.task_ids {
            let version = run
                .scored
                .iter()
                .find(|s| &s.task.id == task_id)
                .map(|s| s.task.version);
            let patch = TaskPatch {
                status: Some(TaskStatus::Doing),
                expected_version: version,
                ..Default::default()
            };
            self.update_with_retry(project_id, task_id, patch).await?;
        }

        if !selected.task_ids.is_empty() {
            self.prioritize(project_id).await?;
        }
        Ok(selected)
    }

    async fn fetch_project(&self, project_id: &str) -> Result<Project> {
        self.store
            .find_projects(Some(project_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| OrchestratorError::NotFound {
                kind: "project",
                id: project_id.to_string(),
            })
    }

    async fn fetch_task(&self, project_id: &str, task_id: &str) -> Result<Task> {
        self.store
            .find_tasks(project_id, None, None)
            .await?
            .into_iter()
            .find(|t| t.id == task_id)
            .ok_or_else(|| OrchestratorError::NotFound {
                kind: "task",
                id: task_id.to_string(),
            })
    }

    /// Apply a patch, retrying exactly once on a version conflict
    ///
    /// The retry re-reads the task and re-stamps `expected_version`; a second
    /// conflict is surfaced to the caller unchanged.
    async fn update_with_retry(
        &self,
        project_id: &str,
        task_id: &str,
        patch: TaskPatch,
    ) -> Result<Task> {
        match self.store.update_task(task_id, patch.clone()).await {
            Err(OrchestratorError::ConcurrencyConflict { .. }) => {
                warn!(project_id, task_id, "write conflict, retrying against a fresh read");
                let fresh = self.fetch_task(project_id, task_id).await?;
                let retry = TaskPatch {
                    expected_version: Some(fresh.version),
                    ..patch
                };
                self.store.update_task(task_id, retry).await
            }
            other => other,
        }
    }

    /// Fire-and-forget write-through into the registry cache
    ///
    /// A cache write must never stall or fail an engine operation; a lost
    /// write only ages the snapshot by one observation.
    fn write_through(&self, project: &Project, counts: TaskCounts) {
        let cache = self.cache.clone();
        let project = project.clone();
        tokio::spawn(async move {
            let result =
                tokio::task::spawn_blocking(move || cache.record_observation(&project, counts))
                    .await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "registry cache write failed"),
                Err(e) => warn!(error = %e, "registry cache write task panicked"),
            }
        });
    }
}
