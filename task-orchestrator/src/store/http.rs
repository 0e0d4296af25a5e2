//! HTTP client for the task store API.
//!
//! Thin JSON wrapper over the store's CRUD surface. Error mapping is the
//! whole job: 404 becomes `NotFound`, 409 becomes `ConcurrencyConflict`,
//! transport timeouts become `Timeout`. Retry policy lives a layer up in
//! the session, not here.

use serde::de::DeserializeOwned;
use std::time::Duration;
use task_orchestrator_sdk::{
    async_trait, CreateTaskRequest, OrchestratorError, Project, Result, Task, TaskPatch,
    TaskStatus, TaskStore,
};

/// reqwest-backed `TaskStore`
pub struct HttpTaskStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTaskStore {
    /// Build a client with a per-call timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OrchestratorError::Store(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(operation: &'static str, e: reqwest::Error) -> OrchestratorError {
        if e.is_timeout() {
            OrchestratorError::Timeout { operation }
        } else {
            OrchestratorError::Store(format!("{}: {}", operation, e))
        }
    }

    async fn decode<T: DeserializeOwned>(
        operation: &'static str,
        kind: &'static str,
        id: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| OrchestratorError::Store(format!("{}: {}", operation, e)));
        }
        match status {
            reqwest::StatusCode::NOT_FOUND => Err(OrchestratorError::NotFound {
                kind,
                id: id.to_string(),
            }),
            reqwest::StatusCode::CONFLICT => Err(OrchestratorError::ConcurrencyConflict {
                id: id.to_string(),
            }),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(OrchestratorError::Store(format!(
                    "{}: HTTP {} {}",
                    operation, status, body
                )))
            }
        }
    }
}

#[async_trait]
impl TaskStore for HttpTaskStore {
    async fn find_projects(&self, id: Option<&str>) -> Result<Vec<Project>> {
        match id {
            None => {
                let response = self
                    .client
                    .get(self.url("/projects"))
                    .send()
                    .await
                    .map_err(|e| Self::transport_error("find_projects", e))?;
                Self::decode("find_projects", "project", "*", response).await
            }
            Some(id) => {
                let response = self
                    .client
                    .get(self.url(&format!("/projects/{}", id)))
                    .send()
                    .await
                    .map_err(|e| Self::transport_error("find_projects", e))?;
                let project: Project =
                    Self::decode("find_projects", "project", id, response).await?;
                Ok(vec![project])
            }
        }
    }

    async fn find_tasks(
        &self,
        project_id: &str,
        status: Option<TaskStatus>,
        assignee: Option<&str>,
    ) -> Result<Vec<Task>> {
        let mut request = self
            .client
            .get(self.url(&format!("/projects/{}/tasks", project_id)));
        if let Some(status) = status {
            request = request.query(&[("status", status.as_str())]);
        }
        if let Some(assignee) = assignee {
            request = request.query(&[("assignee", assignee)]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Self::transport_error("find_tasks", e))?;
        Self::decode("find_tasks", "project", project_id, response).await
    }

    async fn create_task(&self, req: CreateTaskRequest) -> Result<Task> {
        let response = self
            .client
            .post(self.url(&format!("/projects/{}/tasks", req.project_id)))
            .json(&req)
            .send()
            .await
            .map_err(|e| Self::transport_error("create_task", e))?;
        Self::decode("create_task", "project", &req.project_id, response).await
    }

    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        let response = self
            .client
            .patch(self.url(&format!("/tasks/{}", id)))
            .json(&patch)
            .send()
            .await
            .map_err(|e| Self::transport_error("update_task", e))?;
        Self::decode("update_task", "task", id, response).await
    }
}
