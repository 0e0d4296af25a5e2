//! Common test utilities for orchestrator tests

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use task_orchestrator::config::OrchestratorConfig;
use task_orchestrator::registry::RegistryCache;
use task_orchestrator::session::Session;
use task_orchestrator::store::MemoryTaskStore;
use task_orchestrator_sdk::{
    async_trait, CreateTaskRequest, Project, Result, Task, TaskPatch, TaskStatus, TaskStore,
};
use tempfile::TempDir;

/// Session over a fresh in-memory store and a temp registry directory
///
/// The `TempDir` must stay alive for the session's lifetime.
pub fn memory_session() -> (Session, Arc<MemoryTaskStore>, TempDir) {
    let store = Arc::new(MemoryTaskStore::new());
    let tmp = tempfile::tempdir().unwrap();
    let cache = RegistryCache::open(tmp.path().to_path_buf()).unwrap();
    let session = Session::new(store.clone(), cache, OrchestratorConfig::default());
    (session, store, tmp)
}

/// Creation request with only the interesting fields set
pub fn create_request(project: &str, title: &str) -> CreateTaskRequest {
    CreateTaskRequest {
        project_id: project.to_string(),
        title: title.to_string(),
        assignee: None,
        feature_tag: None,
        blocked_by: BTreeSet::new(),
        fast_track: false,
    }
}

/// Seed a task directly in a given status
pub fn seeded_task(id: &str, project: &str, status: TaskStatus) -> Task {
    Task {
        id: id.to_string(),
        project_id: project.to_string(),
        title: id.to_string(),
        status,
        priority_score: 0,
        assignee: None,
        feature_tag: None,
        blocks: BTreeSet::new(),
        blocked_by: BTreeSet::new(),
        annotation: None,
        created_order: 0,
        version: 0,
    }
}

/// Store wrapper that delays every call, for timeout tests
pub struct SlowStore {
    inner: Arc<MemoryTaskStore>,
    delay: Duration,
}

impl SlowStore {
    pub fn new(inner: Arc<MemoryTaskStore>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl TaskStore for SlowStore {
    async fn find_projects(&self, id: Option<&str>) -> Result<Vec<Project>> {
        tokio::time::sleep(self.delay).await;
        self.inner.find_projects(id).await
    }

    async fn find_tasks(
        &self,
        project_id: &str,
        status: Option<TaskStatus>,
        assignee: Option<&str>,
    ) -> Result<Vec<Task>> {
        tokio::time::sleep(self.delay).await;
        self.inner.find_tasks(project_id, status, assignee).await
    }

    async fn create_task(&self, req: CreateTaskRequest) -> Result<Task> {
        tokio::time::sleep(self.delay).await;
        self.inner.create_task(req).await
    }

    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        tokio::time::sleep(self.delay).await;
        self.inner.update_task(id, patch).await
    }
}
