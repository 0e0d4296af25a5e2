//! Recovery resolver strategy-order and fallback tests

use super::common::{memory_session, seeded_task, SlowStore};
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use task_orchestrator::recovery::{ContextRecoveryResolver, ContextSource, RecoveryConfig};
use task_orchestrator::registry::{RegistryCache, RegistryEntry};
use task_orchestrator::store::MemoryTaskStore;
use task_orchestrator_sdk::{OrchestratorError, TaskCounts, TaskStatus, TaskStore};
use tempfile::TempDir;

fn empty_cache() -> (RegistryCache, TempDir) {
    let tmp = tempfile::tempdir().unwrap();
    (RegistryCache::open(tmp.path().to_path_buf()).unwrap(), tmp)
}

fn cache_entry(id: &str, age_days: i64) -> RegistryEntry {
    RegistryEntry {
        id: id.to_string(),
        title: format!("Project {}", id),
        description: String::new(),
        tech_summary: String::new(),
        task_counts: TaskCounts::default(),
        updated_at: Local::now() - chrono::Duration::days(age_days),
    }
}

fn resolver(store: Arc<dyn TaskStore>, cache: RegistryCache) -> ContextRecoveryResolver {
    ContextRecoveryResolver::new(store, cache, RecoveryConfig::default())
}

#[tokio::test]
async fn test_single_doing_project_wins() {
    let store = Arc::new(MemoryTaskStore::new());
    store.add_project("p1", "Parser");
    store.add_project("p2", "Billing");
    store.add_task(seeded_task("t1", "p1", TaskStatus::Doing));
    store.add_task(seeded_task("t2", "p2", TaskStatus::Todo));

    let (cache, _tmp) = empty_cache();
    let ctx = resolver(store, cache).resolve().await.unwrap();
    assert_eq!(ctx.project_id, "p1");
    assert_eq!(ctx.project_title, "Parser");
    assert_eq!(ctx.source, ContextSource::ActiveDoing);
}

#[tokio::test]
async fn test_review_when_nothing_in_doing() {
    let store = Arc::new(MemoryTaskStore::new());
    store.add_project("p1", "Parser");
    store.add_task(seeded_task("t1", "p1", TaskStatus::Review));

    let (cache, _tmp) = empty_cache();
    let ctx = resolver(store, cache).resolve().await.unwrap();
    assert_eq!(ctx.project_id, "p1");
    assert_eq!(ctx.source, ContextSource::ActiveReview);
}

#[tokio::test]
async fn test_doing_outranks_review() {
    // Review work in one project never overrides doing work in another
    let store = Arc::new(MemoryTaskStore::new());
    store.add_project("p1", "Parser");
    store.add_project("p2", "Billing");
    store.add_task(seeded_task("t1", "p1", TaskStatus::Review));
    store.add_task(seeded_task("t2", "p2", TaskStatus::Doing));

    let (cache, _tmp) = empty_cache();
    let ctx = resolver(store, cache).resolve().await.unwrap();
    assert_eq!(ctx.project_id, "p2");
    assert_eq!(ctx.source, ContextSource::ActiveDoing);
}

#[tokio::test]
async fn test_multiple_doing_projects_is_ambiguous() {
    let store = Arc::new(MemoryTaskStore::new());
    store.add_project("p1", "Parser");
    store.add_project("p2", "Billing");
    store.add_task(seeded_task("t1", "p1", TaskStatus::Doing));
    store.add_task(seeded_task("t2", "p2", TaskStatus::Doing));

    let (cache, _tmp) = empty_cache();
    match resolver(store, cache).resolve().await {
        Err(OrchestratorError::AmbiguousProjectSelection { candidates }) => {
            let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
            assert_eq!(ids, vec!["p1", "p2"]);
        }
        other => panic!("expected ambiguity, got {:?}", other.map(|c| c.project_id)),
    }
}

#[tokio::test]
async fn test_single_fresh_cache_snapshot_suggested() {
    let store = Arc::new(MemoryTaskStore::new());
    store.add_project("p1", "Parser");
    store.add_task(seeded_task("t1", "p1", TaskStatus::Todo));

    let (cache, _tmp) = empty_cache();
    cache.record(&cache_entry("p1", 0)).unwrap();

    let ctx = resolver(store, cache).resolve().await.unwrap();
    assert_eq!(ctx.project_id, "p1");
    assert!(matches!(ctx.source, ContextSource::CacheSuggestion { .. }));
}

#[tokio::test]
async fn test_stale_cache_snapshot_not_suggested() {
    // Snapshot is older than the 24h freshness window
    let store = Arc::new(MemoryTaskStore::new());
    store.add_project("p1", "Parser");

    let (cache, _tmp) = empty_cache();
    cache.record(&cache_entry("p1", 2)).unwrap();

    let result = resolver(store, cache).resolve().await;
    assert!(matches!(
        result,
        Err(OrchestratorError::AmbiguousProjectSelection { .. })
    ));
}

#[tokio::test]
async fn test_two_fresh_snapshots_are_ambiguous() {
    let store = Arc::new(MemoryTaskStore::new());
    store.add_project("p1", "Parser");
    store.add_project("p2", "Billing");

    let (cache, _tmp) = empty_cache();
    cache.record(&cache_entry("p1", 0)).unwrap();
    cache.record(&cache_entry("p2", 0)).unwrap();

    let result = resolver(store, cache).resolve().await;
    assert!(matches!(
        result,
        Err(OrchestratorError::AmbiguousProjectSelection { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_store_timeout_falls_back_to_cache() {
    let inner = Arc::new(MemoryTaskStore::new());
    inner.add_project("p1", "Parser");
    inner.add_task(seeded_task("t1", "p1", TaskStatus::Doing));

    // Store answers long after the per-call bound
    let slow = Arc::new(SlowStore::new(inner, Duration::from_secs(60)));
    let (cache, _tmp) = empty_cache();
    cache.record(&cache_entry("p1", 0)).unwrap();

    let ctx = resolver(slow, cache).resolve().await.unwrap();
    assert_eq!(ctx.project_id, "p1");
    assert!(matches!(ctx.source, ContextSource::CacheSuggestion { .. }));
}

#[tokio::test]
async fn test_nothing_known_is_explicit_failure() {
    let store = Arc::new(MemoryTaskStore::new());
    let (cache, _tmp) = empty_cache();

    match resolver(store, cache).resolve().await {
        Err(OrchestratorError::AmbiguousProjectSelection { candidates }) => {
            assert!(candidates.is_empty());
        }
        other => panic!("expected ambiguity, got {:?}", other.map(|c| c.project_id)),
    }
}

#[tokio::test]
async fn test_session_recover_and_header() {
    let (session, store, _tmp) = memory_session();
    store.add_project("p1", "Parser Rework");
    store.add_task(seeded_task("t1", "p1", TaskStatus::Doing));

    let ctx = session.recover().await.unwrap();
    assert_eq!(
        task_orchestrator::session::Session::status_header(&ctx),
        "[p1] Parser Rework"
    );
}
