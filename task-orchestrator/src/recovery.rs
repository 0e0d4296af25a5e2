//! Context recovery after working-memory loss.
//!
//! Invoked at the start of a session that carries no state. Strategies are
//! evaluated in strict order and evaluation stops at the first success:
//!
//! 1. any project with tasks in `doing` (store query)
//! 2. any project with tasks in `review` (store query)
//! 3. a single fresh registry cache snapshot, offered as a suggestion
//! 4. explicit failure with the enumerated candidate list
//!
//! The resolver never guesses and never defaults to "the last project
//! used": silent defaulting is how cross-project task corruption happened
//! in the first place. Store timeouts degrade to the cache strategy instead
//! of failing outright, trading freshness for availability.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use task_orchestrator_sdk::{
    OrchestratorError, Project, ProjectChoice, Result, TaskStatus, TaskStore,
};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::registry::RegistryCache;

/// Recovery tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Maximum snapshot age for a cache suggestion
    pub freshness_window_secs: u64,
    /// Bound on each store call during recovery
    pub store_timeout_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            freshness_window_secs: 86_400,
            store_timeout_secs: 10,
        }
    }
}

/// Which strategy resolved the context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextSource {
    /// A single project had tasks in `doing`
    ActiveDoing,
    /// A single project had tasks in `review`
    ActiveReview,
    /// Offered from a fresh registry snapshot, not confirmed by the store
    CacheSuggestion { age_secs: i64 },
}

/// Successfully re-established working context
#[derive(Debug, Clone)]
pub struct ResolvedContext {
    pub project_id: String,
    pub project_title: String,
    pub source: ContextSource,
}

/// Strict-order context recovery over store and cache
pub struct ContextRecoveryResolver {
    store: Arc<dyn TaskStore>,
    cache: RegistryCache,
    config: RecoveryConfig,
}

impl ContextRecoveryResolver {
    pub fn new(store: Arc<dyn TaskStore>, cache: RegistryCache, config: RecoveryConfig) -> Self {
        Self { store, cache, config }
    }

    /// Run the strategy chain; first success wins
    pub async fn resolve(&self) -> Result<ResolvedContext> {
        let projects = match self.bounded("find_projects", self.store.find_projects(None)).await {
            Ok(projects) => projects,
            Err(OrchestratorError::Timeout { operation }) => {
                warn!(operation, "task store timed out, falling back to registry cache");
                return self.cache_suggestion(None);
            }
            Err(e) => return Err(e),
        };

        for (status, source) in [
            (TaskStatus::Doing, ContextSource::ActiveDoing),
            (TaskStatus::Review, ContextSource::ActiveReview),
        ] {
            let mut active = match self.projects_with_tasks(&projects, status).await {
                Ok(active) => active,
                Err(OrchestratorError::Timeout { operation }) => {
                    warn!(operation, "task store timed out, falling back to registry cache");
                    return self.cache_suggestion(Some(&projects));
                }
                Err(e) => return Err(e),
            };

            match active.len() {
                0 => continue,
                1 => {
                    let choice = active.swap_remove(0);
                    debug!(project_id = %choice.id, status = %status, "context recovered from active tasks");
                    return Ok(ResolvedContext {
                        project_id: choice.id,
                        project_title: choice.title,
                        source,
                    });
                }
                // Several projects are mid-flight; picking one would be a
                // guess, and guessing is exactly what this resolver forbids
                _ => {
                    return Err(OrchestratorError::AmbiguousProjectSelection { candidates: active })
                }
            }
        }

        self.cache_suggestion(Some(&projects))
    }

    /// Strategy (c): a single fresh cache snapshot is offered as a
    /// suggestion; anything else is an explicit ambiguity
    fn cache_suggestion(&self, projects: Option<&[Project]>) -> Result<ResolvedContext> {
        let window = self.config.freshness_window_secs as i64;
        let mut fresh: Vec<_> = self
            .cache
            .load_all()
            .into_iter()
            .filter(|(_, age)| age.num_seconds() <= window)
            .collect();

        if fresh.len() == 1 {
            let (entry, age) = fresh.swap_remove(0);
            debug!(project_id = %entry.id, "offering registry cache suggestion");
            return Ok(ResolvedContext {
                project_id: entry.id,
                project_title: entry.title,
                source: ContextSource::CacheSuggestion {
                    age_secs: age.num_seconds(),
                },
            });
        }

        let candidates = match projects {
            Some(projects) => projects
                .iter()
                .map(|p| ProjectChoice {
                    id: p.id.clone(),
                    title: p.title.clone(),
                })
                .collect(),
            None => self
                .cache
                .load_all()
                .into_iter()
                .map(|(entry, _)| ProjectChoice {
                    id: entry.id,
                    title: entry.title,
                })
                .collect(),
        };
        Err(OrchestratorError::AmbiguousProjectSelection { candidates })
    }

    /// Projects that currently have at least one task in `status`
    async fn projects_with_tasks(
        &self,
        projects: &[Project],
        status: TaskStatus,
    ) -> Result<Vec<ProjectChoice>> {
        let queries = projects.iter().map(|project| async move {
            let tasks = self
                .bounded(
                    "find_tasks",
                    self.store.find_tasks(&project.id, Some(status), None),
                )
                .await?;
            Ok::<_, OrchestratorError>((project, tasks))
        });

        let mut active = Vec::new();
        for result in join_all(queries).await {
            let (project, tasks) = result?;
            if !tasks.is_empty() {
                active.push(ProjectChoice {
                    id: project.id.clone(),
                    title: project.title.clone(),
                });
            }
        }
        Ok(active)
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match timeout(Duration::from_secs(self.config.store_timeout_secs), fut).await {
            Ok(result) => result,
            Err(_) => Err(OrchestratorError::Timeout { operation }),
        }
    }
}
