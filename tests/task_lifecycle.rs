//! Integration tests for the task lifecycle: create/update/archive semantics,
//! filter conjunction, and the events emitted for each mutation.
//! These use the service + SQLite directly — no HTTP server involved.

use missiond::config::MissionConfig;
use missiond::error::ApiError;
use missiond::tasks::model::{NewTask, TaskFilter, TaskPatch, TaskStatus};
use missiond::AppContext;
use std::sync::Arc;
use tempfile::TempDir;

async fn make_ctx(dir: &TempDir) -> Arc<AppContext> {
    let config = MissionConfig::new(
        None,
        None,
        Some(dir.path().join("data")),
        Some(dir.path().join("workspace")),
        Some("error".to_string()),
        None,
    );
    Arc::new(AppContext::init(config).await.expect("context init failed"))
}

fn new_task(id: &str, title: &str, assignee: Option<&str>) -> NewTask {
    NewTask {
        id: id.to_string(),
        title: title.to_string(),
        description: None,
        priority: None,
        assignee: assignee.map(str::to_string),
        category: None,
        due_date: None,
    }
}

/// Pull the next event off a receiver and return its `type` field.
async fn next_event_type(rx: &mut tokio::sync::broadcast::Receiver<String>) -> String {
    let raw = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("broadcast channel closed");
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    value["type"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn create_defaults_and_emits_created() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;
    let mut rx = ctx.broadcaster.subscribe();

    let task = ctx
        .tasks
        .create(new_task("T001", "Fix bug", Some("olex")))
        .await
        .unwrap();

    assert_eq!(task.status, "NEW");
    assert_eq!(task.priority, "MEDIUM", "priority defaults to MEDIUM");
    assert!(task.completed_at.is_none());
    assert_eq!(next_event_type(&mut rx).await, "created");
}

#[tokio::test]
async fn status_transitions_emit_status_changed_exactly() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;

    ctx.tasks
        .create(new_task("T001", "Fix bug", None))
        .await
        .unwrap();

    let mut rx = ctx.broadcaster.subscribe();

    // NEW -> IN_PROGRESS
    let patch = TaskPatch {
        status: Some(TaskStatus::InProgress),
        ..Default::default()
    };
    ctx.tasks.update("T001", &patch).await.unwrap();
    assert_eq!(next_event_type(&mut rx).await, "status_changed");

    // Non-status change
    let patch = TaskPatch {
        assignee: Some("olex".to_string()),
        ..Default::default()
    };
    ctx.tasks.update("T001", &patch).await.unwrap();
    assert_eq!(next_event_type(&mut rx).await, "updated");

    // IN_PROGRESS -> COMPLETED sets completed_at
    let patch = TaskPatch {
        status: Some(TaskStatus::Completed),
        ..Default::default()
    };
    let task = ctx.tasks.update("T001", &patch).await.unwrap();
    assert_eq!(next_event_type(&mut rx).await, "status_changed");
    assert!(task.completed_at.is_some());

    // Writing the same status again is an `updated`, not a transition
    let patch = TaskPatch {
        status: Some(TaskStatus::Completed),
        ..Default::default()
    };
    ctx.tasks.update("T001", &patch).await.unwrap();
    assert_eq!(next_event_type(&mut rx).await, "updated");
}

#[tokio::test]
async fn archive_is_idempotent_in_effect() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;

    ctx.tasks
        .create(new_task("T001", "Fix bug", None))
        .await
        .unwrap();

    let mut rx = ctx.broadcaster.subscribe();

    let first = ctx.tasks.archive("T001").await.unwrap();
    assert_eq!(first.status, "ARCHIVED");
    assert_eq!(next_event_type(&mut rx).await, "deleted");

    // Second archive never fails — unconditional SET, not conditional
    let second = ctx.tasks.archive("T001").await.unwrap();
    assert_eq!(second.status, "ARCHIVED");
    assert_eq!(next_event_type(&mut rx).await, "deleted");
}

#[tokio::test]
async fn list_filters_are_a_conjunction() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;

    ctx.tasks
        .create(new_task("T1", "One", Some("olex")))
        .await
        .unwrap();
    ctx.tasks
        .create(new_task("T2", "Two", Some("ruv")))
        .await
        .unwrap();

    let filter = TaskFilter {
        status: Some("NEW".to_string()),
        assignee: Some("olex".to_string()),
        ..Default::default()
    };
    let tasks = ctx.tasks.list(&filter).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, "T1");

    // Omitted filters impose no constraint
    let all = ctx.tasks.list(&TaskFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn empty_patch_is_rejected_without_mutation() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;

    let created = ctx
        .tasks
        .create(new_task("T001", "Fix bug", None))
        .await
        .unwrap();

    let err = ctx
        .tasks
        .update("T001", &TaskPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));

    let after = ctx.tasks.get("T001").await.unwrap();
    assert_eq!(
        after.updated_at, created.updated_at,
        "rejected patch must not touch the row"
    );
}

#[tokio::test]
async fn duplicate_id_is_a_conflict() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;

    ctx.tasks
        .create(new_task("T001", "First", None))
        .await
        .unwrap();
    let err = ctx
        .tasks
        .create(new_task("T001", "Second", None))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
}

#[tokio::test]
async fn update_of_unknown_id_is_not_found() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;

    let patch = TaskPatch {
        title: Some("nope".to_string()),
        ..Default::default()
    };
    let err = ctx.tasks.update("T404", &patch).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn relationships_union_both_directions() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;

    for id in ["T1", "T2", "T3"] {
        ctx.tasks.create(new_task(id, id, None)).await.unwrap();
    }
    ctx.tasks.add_dependency("T1", "T2").await.unwrap();
    ctx.tasks.add_dependency("T3", "T1").await.unwrap();

    let edges = ctx.tasks.relationships("T1").await.unwrap();
    assert_eq!(edges.len(), 2, "dependent and dependency edges both count");
}

#[tokio::test]
async fn cycles_are_permitted_by_default() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;

    ctx.tasks.create(new_task("T1", "One", None)).await.unwrap();
    ctx.tasks.create(new_task("T2", "Two", None)).await.unwrap();

    ctx.tasks.add_dependency("T1", "T2").await.unwrap();
    ctx.tasks.add_dependency("T2", "T1").await.unwrap();
    ctx.tasks.add_dependency("T1", "T1").await.unwrap();
}

#[tokio::test]
async fn cycles_are_rejected_when_flag_is_off() {
    let dir = TempDir::new().unwrap();
    let mut config = MissionConfig::new(
        None,
        None,
        Some(dir.path().join("data")),
        Some(dir.path().join("workspace")),
        Some("error".to_string()),
        None,
    );
    config.tasks.allow_dependency_cycles = false;
    let ctx = Arc::new(AppContext::init(config).await.unwrap());

    ctx.tasks.create(new_task("T1", "One", None)).await.unwrap();
    ctx.tasks.create(new_task("T2", "Two", None)).await.unwrap();

    let err = ctx.tasks.add_dependency("T1", "T1").await.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));

    ctx.tasks.add_dependency("T1", "T2").await.unwrap();
    let err = ctx.tasks.add_dependency("T2", "T1").await.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
}

#[tokio::test]
async fn link_rows_append_with_generated_ids() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;

    ctx.tasks
        .create(new_task("T001", "Fix bug", None))
        .await
        .unwrap();

    let first = ctx
        .tasks
        .link("T001", "file", Some("src/main.rs"), None)
        .await
        .unwrap();
    let second = ctx
        .tasks
        .link("T001", "decision", None, Some("chose sqlite"))
        .await
        .unwrap();
    assert!(second > first, "link ids are monotonically generated");

    let links = ctx.tasks.store().links("T001").await.unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].link_type, "file");
    assert_eq!(links[0].link_url.as_deref(), Some("src/main.rs"));
    assert_eq!(links[1].link_text.as_deref(), Some("chose sqlite"));
}
