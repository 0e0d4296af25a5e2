//! Session facade tests over the in-memory store

use super::common::{create_request, memory_session};
use std::collections::HashSet;
use std::time::Duration;
use task_orchestrator::graph::GraphWarning;
use task_orchestrator_sdk::{OrchestratorError, TaskAnnotation, TaskStatus, TaskStore};

#[tokio::test]
async fn test_fast_track_task_starts_in_doing() {
    let (session, store, _tmp) = memory_session();
    store.add_project("p1", "Parser");

    let mut req = create_request("p1", "hotfix auth outage");
    req.fast_track = true;
    let task = session.create_task(req).await.unwrap();

    assert_eq!(task.status, TaskStatus::Doing);
    // Active status dominates every other signal
    assert_eq!(task.priority_score, 100);
}

#[tokio::test]
async fn test_prioritize_persists_chain_scores() {
    let (session, store, _tmp) = memory_session();
    store.add_project("p1", "Parser");

    let head = session.create_task(create_request("p1", "head")).await.unwrap();
    let mut mid_req = create_request("p1", "mid");
    mid_req.blocked_by.insert(head.id.clone());
    let mid = session.create_task(mid_req).await.unwrap();
    let mut tail_req = create_request("p1", "tail");
    tail_req.blocked_by.insert(mid.id.clone());
    let tail = session.create_task(tail_req).await.unwrap();

    let tasks = store.find_tasks("p1", None, None).await.unwrap();
    let score = |id: &str| {
        tasks
            .iter()
            .find(|t| t.id == id)
            .unwrap()
            .priority_score
    };
    assert_eq!(score(&head.id), 50);
    assert_eq!(score(&mid.id), 45);
    assert_eq!(score(&tail.id), 30);
}

#[tokio::test]
async fn test_lifecycle_flow_clears_annotation() {
    let (session, store, _tmp) = memory_session();
    store.add_project("p1", "Parser");

    let mut req = create_request("p1", "stuck work");
    req.fast_track = true;
    let task = session.create_task(req).await.unwrap();

    let annotated = session
        .annotate("p1", &task.id, Some(TaskAnnotation::Blocked))
        .await
        .unwrap();
    assert_eq!(annotated.annotation, Some(TaskAnnotation::Blocked));

    let reviewed = session
        .set_status("p1", &task.id, TaskStatus::Review)
        .await
        .unwrap();
    assert_eq!(reviewed.status, TaskStatus::Review);
    assert!(reviewed.annotation.is_none());

    let done = session
        .set_status("p1", &task.id, TaskStatus::Done)
        .await
        .unwrap();
    assert_eq!(done.status, TaskStatus::Done);
}

#[tokio::test]
async fn test_illegal_transition_rejected() {
    let (session, store, _tmp) = memory_session();
    store.add_project("p1", "Parser");
    let task = session.create_task(create_request("p1", "queued")).await.unwrap();

    let result = session.set_status("p1", &task.id, TaskStatus::Done).await;
    assert!(matches!(
        result,
        Err(OrchestratorError::InvalidTransition {
            from: TaskStatus::Todo,
            to: TaskStatus::Done,
        })
    ));
}

#[tokio::test]
async fn test_annotation_outside_doing_rejected() {
    let (session, store, _tmp) = memory_session();
    store.add_project("p1", "Parser");
    let task = session.create_task(create_request("p1", "queued")).await.unwrap();

    let result = session
        .annotate("p1", &task.id, Some(TaskAnnotation::Escalated))
        .await;
    assert!(matches!(
        result,
        Err(OrchestratorError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_conflict_retried_once_and_succeeds() {
    let (session, store, _tmp) = memory_session();
    store.add_project("p1", "Parser");
    let task = session.create_task(create_request("p1", "contended")).await.unwrap();

    store.inject_conflict_once();
    let updated = session
        .set_status("p1", &task.id, TaskStatus::Doing)
        .await
        .unwrap();
    assert_eq!(updated.status, TaskStatus::Doing);
}

#[tokio::test]
async fn test_promote_batch_bounded_and_coherent() {
    let (session, store, _tmp) = memory_session();
    store.add_project("p1", "Parser");
    for i in 0..7 {
        let mut req = create_request("p1", &format!("auth step {}", i));
        req.feature_tag = Some("auth".to_string());
        session.create_task(req).await.unwrap();
    }

    let batch = session.promote_batch("p1").await.unwrap();
    assert_eq!(batch.task_ids.len(), 5);
    let unique: HashSet<_> = batch.task_ids.iter().collect();
    assert_eq!(unique.len(), 5);

    let doing = store
        .find_tasks("p1", Some(TaskStatus::Doing), None)
        .await
        .unwrap();
    assert_eq!(doing.len(), 5);
}

#[tokio::test]
async fn test_promote_batch_with_nothing_queued() {
    let (session, store, _tmp) = memory_session();
    store.add_project("p1", "Parser");

    let batch = session.promote_batch("p1").await.unwrap();
    assert!(batch.task_ids.is_empty());
}

#[tokio::test]
async fn test_unknown_project_not_found() {
    let (session, _store, _tmp) = memory_session();
    let result = session.prioritize("ghost").await;
    assert!(matches!(
        result,
        Err(OrchestratorError::NotFound { kind: "project", .. })
    ));
}

#[tokio::test]
async fn test_cycle_reported_as_warning_not_error() {
    let (session, store, _tmp) = memory_session();
    store.add_project("p1", "Parser");

    let a = session.create_task(create_request("p1", "a")).await.unwrap();
    let mut b_req = create_request("p1", "b");
    b_req.blocked_by.insert(a.id.clone());
    let b = session.create_task(b_req).await.unwrap();

    // Closing the loop a -> b -> a is accepted, then excluded with a warning
    let run = session.add_dependency("p1", &a.id, &b.id).await.unwrap();
    assert!(run
        .warnings
        .iter()
        .any(|w| matches!(w, GraphWarning::CycleDetected { .. })));
    assert_eq!(run.scored.len(), 2);
}

#[tokio::test]
async fn test_project_header_names_the_project() {
    let (session, store, _tmp) = memory_session();
    store.add_project("p1", "Parser Rework");

    let header = session.project_header("p1").await.unwrap();
    assert_eq!(header, "[p1] Parser Rework");

    let missing = session.project_header("ghost").await;
    assert!(matches!(
        missing,
        Err(OrchestratorError::NotFound { kind: "project", .. })
    ));
}

#[tokio::test]
async fn test_annotate_refreshes_registry_snapshot() {
    let (session, store, tmp) = memory_session();
    store.add_project("p1", "Parser");

    let mut req = create_request("p1", "stuck work");
    req.fast_track = true;
    let task = session.create_task(req).await.unwrap();

    let path = tmp.path().join("p1.json");
    let observed_at = |content: &str| {
        let value: serde_json::Value = serde_json::from_str(content).unwrap();
        value["updated_at"].as_str().unwrap().to_string()
    };
    let mut first = String::new();
    for _ in 0..100 {
        if let Ok(content) = std::fs::read_to_string(&path) {
            first = observed_at(&content);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!first.is_empty());

    session
        .annotate("p1", &task.id, Some(TaskAnnotation::Blocked))
        .await
        .unwrap();

    // The annotation alone must re-stamp the snapshot
    let mut refreshed = first.clone();
    for _ in 0..100 {
        if let Ok(content) = std::fs::read_to_string(&path) {
            refreshed = observed_at(&content);
            if refreshed != first {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_ne!(refreshed, first);
}

#[tokio::test]
async fn test_write_through_lands_in_registry() {
    let (session, store, tmp) = memory_session();
    store.add_project("p1", "Parser");
    session.create_task(create_request("p1", "tracked")).await.unwrap();

    // The cache write is fire-and-forget; poll briefly for it
    let path = tmp.path().join("p1.json");
    for _ in 0..100 {
        if path.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("\"Parser\""));
}
