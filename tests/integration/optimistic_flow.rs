//! Controller scenarios against the in-memory task service: optimistic
//! application, rollback, delete resync and stale-load discard.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use tasklist::controller::{Applied, EditError, EditOutcome, ListError, TaskListController};
use tasklist::forms::{AddOutcome, AddTaskForm};
use tasklist::service::memory::{InMemoryTaskService, Operation, ServiceCall};
use tasklist_proto::identity::Identity;
use tasklist_proto::task::TaskPatch;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn alice() -> Identity {
    Identity::new("u-alice", "alice@example.com")
}

fn bob() -> Identity {
    Identity::new("u-bob", "bob@example.com")
}

/// Controller signed in as alice with her list loaded.
async fn signed_in(
    service: &Arc<InMemoryTaskService>,
) -> TaskListController<InMemoryTaskService> {
    let mut controller = TaskListController::new(Arc::clone(service));
    controller.set_identity(Some(&alice()));
    controller.settle().await;
    service.clear_calls();
    controller
}

// ---------------------------------------------------------------------------
// Full round trip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_toggle_delete_round_trip() {
    let service = Arc::new(InMemoryTaskService::new());
    let mut controller = signed_in(&service).await;
    assert!(controller.tasks().is_empty());

    let mut form = AddTaskForm::new(Arc::clone(&service));
    for c in "A".chars() {
        form.input.insert(c);
    }
    assert!(form.submit(Some(&alice())));
    assert!(matches!(form.wait().await, Some(AddOutcome::Added(_))));
    controller.load();
    controller.settle().await;

    assert_eq!(controller.tasks().len(), 1);
    let task = controller.tasks()[0].clone();
    assert_eq!(task.text, "A");
    assert!(!task.completed);
    assert_eq!(task.owner_id, "u-alice");

    controller.toggle_complete(&task.id);
    assert!(controller.tasks()[0].completed);
    assert_eq!(
        controller.settle().await,
        vec![Applied::Toggle {
            id: task.id.clone(),
            ok: true
        }]
    );
    assert!(service.get(&task.id).unwrap().completed);

    controller.delete(&task.id);
    assert!(controller.tasks().is_empty());
    controller.settle().await;
    assert!(service.get(&task.id).is_none());

    controller.load();
    controller.settle().await;
    assert!(controller.tasks().is_empty());
    assert_eq!(controller.error(), None);
}

// ---------------------------------------------------------------------------
// Toggle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn double_toggle_returns_to_original() {
    let service = Arc::new(InMemoryTaskService::new());
    let id = service.seed("u-alice", "A");
    let mut controller = signed_in(&service).await;

    controller.toggle_complete(&id);
    assert!(controller.task(&id).unwrap().completed);
    controller.toggle_complete(&id);
    assert!(!controller.task(&id).unwrap().completed);
    assert_eq!(controller.in_flight(), 2);

    controller.settle().await;
    assert!(!controller.task(&id).unwrap().completed);
    assert!(!service.get(&id).unwrap().completed);
    assert_eq!(
        service.calls(),
        vec![
            ServiceCall::Update {
                id: id.clone(),
                patch: TaskPatch::completed(true)
            },
            ServiceCall::Update {
                id,
                patch: TaskPatch::completed(false)
            },
        ]
    );
}

#[tokio::test]
async fn failed_toggle_reverts_and_sets_error() {
    let service = Arc::new(InMemoryTaskService::new());
    let id = service.seed("u-alice", "A");
    let mut controller = signed_in(&service).await;
    service.fail_next(Operation::Update);

    controller.toggle_complete(&id);
    assert!(controller.task(&id).unwrap().completed);
    assert_eq!(
        controller.settle().await,
        vec![Applied::Toggle {
            id: id.clone(),
            ok: false
        }]
    );

    assert!(!controller.task(&id).unwrap().completed);
    assert_eq!(controller.error(), Some(ListError::Toggle));
    assert_eq!(
        controller.error().unwrap().to_string(),
        "Failed to update task status."
    );
}

#[tokio::test]
async fn toggles_on_different_tasks_are_independent() {
    let service = Arc::new(InMemoryTaskService::new());
    let a = service.seed("u-alice", "A");
    let b = service.seed("u-alice", "B");
    let mut controller = signed_in(&service).await;
    service.fail_next(Operation::Update);

    controller.toggle_complete(&a);
    controller.toggle_complete(&b);
    assert!(controller.task(&a).unwrap().completed);
    assert!(controller.task(&b).unwrap().completed);

    let applied = controller.settle().await;
    assert_eq!(applied.len(), 2);
    let failed: Vec<_> = applied
        .iter()
        .filter_map(|applied| match applied {
            Applied::Toggle { id, ok: false } => Some(id.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(failed.len(), 1);
    let failed = &failed[0];
    let other = if *failed == a { &b } else { &a };

    assert!(!controller.task(failed).unwrap().completed);
    assert!(!service.get(failed).unwrap().completed);
    assert!(controller.task(other).unwrap().completed);
    assert!(service.get(other).unwrap().completed);
    assert_eq!(controller.error(), Some(ListError::Toggle));
}

// ---------------------------------------------------------------------------
// Edit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_text_trims_and_calls_once() {
    let service = Arc::new(InMemoryTaskService::new());
    let id = service.seed("u-alice", "A");
    let mut controller = signed_in(&service).await;

    assert_eq!(controller.update_text(&id, "  B  "), EditOutcome::Submitted);
    assert_eq!(controller.task(&id).unwrap().text, "B");
    controller.settle().await;

    assert_eq!(
        service.calls(),
        vec![ServiceCall::Update {
            id: id.clone(),
            patch: TaskPatch::text("B")
        }]
    );
    assert_eq!(service.get(&id).unwrap().text, "B");
    assert_eq!(controller.edit_error(&id), None);
}

#[tokio::test]
async fn unchanged_or_blank_edit_never_calls() {
    let service = Arc::new(InMemoryTaskService::new());
    let id = service.seed("u-alice", "A");
    let mut controller = signed_in(&service).await;

    assert_eq!(controller.update_text(&id, "A"), EditOutcome::Unchanged);
    assert_eq!(controller.update_text(&id, " A "), EditOutcome::Unchanged);
    assert_eq!(controller.update_text(&id, ""), EditOutcome::Unchanged);
    assert_eq!(controller.update_text(&id, "   "), EditOutcome::Unchanged);

    assert!(service.calls().is_empty());
    assert_eq!(controller.error(), None);
    assert_eq!(controller.edit_error(&id), None);
}

#[tokio::test]
async fn failed_edit_restores_text_with_inline_error() {
    let service = Arc::new(InMemoryTaskService::new());
    let id = service.seed("u-alice", "A");
    let mut controller = signed_in(&service).await;
    service.fail_next(Operation::Update);

    controller.update_text(&id, "B");
    controller.settle().await;

    assert_eq!(controller.task(&id).unwrap().text, "A");
    assert_eq!(controller.edit_error(&id), Some(EditError));
    assert_eq!(controller.error(), None);

    // A later successful edit clears the inline error.
    controller.update_text(&id, "C");
    assert_eq!(controller.edit_error(&id), None);
    controller.settle().await;
    assert_eq!(controller.task(&id).unwrap().text, "C");
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_delete_resyncs_from_store() {
    let service = Arc::new(InMemoryTaskService::new());
    let keep = service.seed("u-alice", "keep");
    let doomed = service.seed("u-alice", "doomed");
    let mut controller = signed_in(&service).await;
    service.fail_next(Operation::Remove);

    controller.delete(&doomed);
    assert_eq!(controller.tasks().len(), 1);
    assert_eq!(controller.tasks()[0].id, keep);

    controller.settle().await;
    assert_eq!(controller.tasks().len(), 2);
    assert!(controller.task(&doomed).is_some());
    assert_eq!(controller.error(), Some(ListError::Delete));
}

#[tokio::test]
async fn delete_of_absent_task_succeeds() {
    let service = Arc::new(InMemoryTaskService::new());
    let id = service.seed("u-alice", "A");
    let mut controller = signed_in(&service).await;

    controller.delete(&id);
    controller.delete(&id);
    let applied = controller.settle().await;
    assert!(applied.iter().all(|a| matches!(a, Applied::Delete { ok: true, .. })));
    assert_eq!(controller.error(), None);
}

// ---------------------------------------------------------------------------
// Loading and identity changes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_load_for_previous_identity_is_discarded() {
    let service = Arc::new(InMemoryTaskService::new());
    service.seed("u-alice", "alice's task");
    service.seed("u-bob", "bob's task");
    service.delay_next_list(Duration::from_millis(100));

    let mut controller = TaskListController::new(Arc::clone(&service));
    controller.set_identity(Some(&alice()));
    controller.set_identity(Some(&bob()));

    let applied = controller.settle().await;
    assert_eq!(applied, vec![Applied::Loaded, Applied::StaleLoad]);
    assert_eq!(controller.tasks().len(), 1);
    assert_eq!(controller.tasks()[0].text, "bob's task");
    assert!(!controller.is_loading());
}

#[tokio::test]
async fn sign_out_clears_list_without_calling() {
    let service = Arc::new(InMemoryTaskService::new());
    service.seed("u-alice", "A");
    let mut controller = signed_in(&service).await;
    assert_eq!(controller.tasks().len(), 1);

    controller.set_identity(None);
    assert!(controller.tasks().is_empty());
    assert!(!controller.is_loading());
    assert_eq!(controller.in_flight(), 0);
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn load_failure_shows_error_then_retry_recovers() {
    let service = Arc::new(InMemoryTaskService::new());
    service.seed("u-alice", "A");
    service.fail_next(Operation::List);

    let mut controller = TaskListController::new(Arc::clone(&service));
    controller.set_identity(Some(&alice()));
    controller.settle().await;
    assert_eq!(controller.error(), Some(ListError::Load));
    assert!(controller.tasks().is_empty());

    controller.load();
    assert_eq!(controller.error(), None);
    controller.settle().await;
    assert_eq!(controller.tasks().len(), 1);
}

#[tokio::test]
async fn list_is_newest_first() {
    let service = Arc::new(InMemoryTaskService::new());
    service.seed("u-alice", "first");
    service.seed("u-alice", "second");
    service.seed("u-alice", "third");
    let controller = signed_in(&service).await;

    let texts: Vec<&str> = controller.tasks().iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["third", "second", "first"]);
}
