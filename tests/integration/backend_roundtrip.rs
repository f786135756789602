//! Remote client against an in-process development backend.
//!
//! Each test starts the backend on `127.0.0.1:0` and connects a
//! [`RemoteBackend`] to it, then drives the session and controller exactly
//! as the TUI does.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use tasklist::controller::{EditError, EditOutcome, ListError, TaskListController};
use tasklist::forms::{AddOutcome, AddTaskForm, TextInput};
use tasklist::identity::{AuthError, IdentityProvider};
use tasklist::remote::{RemoteBackend, RemoteError, RemoteOptions};
use tasklist::service::{ServiceError, TaskService};
use tasklist::session::{DEFAULT_AUTH_TIMEOUT, Session, SessionContext};
use tasklist_backend::accounts::AccountRegistry;
use tasklist_backend::server::{BackendState, start_server, start_server_with_state};
use tasklist_proto::task::{TaskId, TaskPatch};
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn start_backend() -> String {
    let (addr, _handle) = start_server("127.0.0.1:0").await.unwrap();
    format!("ws://{addr}/ws")
}

async fn connect(url: &str) -> Arc<RemoteBackend> {
    Arc::new(
        RemoteBackend::connect(url, RemoteOptions::default())
            .await
            .unwrap(),
    )
}

async fn wait_for(rx: &mut watch::Receiver<Session>, pred: impl Fn(&Session) -> bool) -> Session {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| pred(s)))
        .await
        .expect("session did not reach expected state")
        .unwrap()
        .clone()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_scenario_through_session_and_controller() {
    let url = start_backend().await;
    let backend = connect(&url).await;
    let session = SessionContext::start(Arc::clone(&backend), DEFAULT_AUTH_TIMEOUT);
    let mut rx = session.watch();

    // The backend announces "signed out" on connect.
    let settled = wait_for(&mut rx, |s| !s.loading).await;
    assert_eq!(settled, Session::settled(None));

    let me = session.signup("alice@example.com", "secret1").await.unwrap();
    let current = wait_for(&mut rx, |s| s.identity.is_some()).await;
    assert_eq!(current.identity.as_ref(), Some(&me));

    let mut controller = TaskListController::new(Arc::clone(&backend));
    controller.set_identity(current.identity.as_ref());
    controller.settle().await;
    assert!(controller.tasks().is_empty());

    backend.create(&me.id, "  A  ").await.unwrap();
    controller.load();
    controller.settle().await;
    assert_eq!(controller.tasks().len(), 1);
    let task = controller.tasks()[0].clone();
    assert_eq!(task.text, "A");
    assert!(!task.completed);

    controller.toggle_complete(&task.id);
    controller.settle().await;
    controller.load();
    controller.settle().await;
    assert!(controller.task(&task.id).unwrap().completed);

    assert_eq!(controller.update_text(&task.id, " B "), EditOutcome::Submitted);
    controller.settle().await;
    controller.load();
    controller.settle().await;
    assert_eq!(controller.task(&task.id).unwrap().text, "B");

    controller.delete(&task.id);
    controller.settle().await;
    controller.load();
    controller.settle().await;
    assert!(controller.tasks().is_empty());
    assert_eq!(controller.error(), None);

    session.logout().await.unwrap();
    let current = wait_for(&mut rx, |s| s.identity.is_none()).await;
    assert_eq!(current, Session::settled(None));
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() {
    let url = start_backend().await;
    let backend = connect(&url).await;
    backend.signup("bob@example.com", "secret1").await.unwrap();
    backend.logout().await.unwrap();

    let err = backend.login("bob@example.com", "nope-nope").await.unwrap_err();
    assert_eq!(err, AuthError::InvalidCredentials);
    assert_eq!(err.to_string(), "Invalid email or password.");

    let err = backend
        .login("nobody@example.com", "secret1")
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::InvalidCredentials);
}

#[tokio::test]
async fn signup_errors_map_to_messages() {
    let url = start_backend().await;
    let backend = connect(&url).await;

    assert_eq!(
        backend.signup("not-an-email", "secret1").await,
        Err(AuthError::InvalidEmail)
    );
    assert_eq!(
        backend.signup("carol@example.com", "123").await,
        Err(AuthError::WeakPassword)
    );
    backend.signup("carol@example.com", "secret1").await.unwrap();
    assert_eq!(
        backend.signup("carol@example.com", "secret1").await,
        Err(AuthError::EmailAlreadyInUse)
    );
}

#[tokio::test]
async fn tasks_require_sign_in() {
    let url = start_backend().await;
    let backend = connect(&url).await;

    let err = backend.list_for_owner("u-anyone").await.unwrap_err();
    assert!(matches!(err, ServiceError::Fetch(_)), "got {err:?}");

    let mut controller = TaskListController::new(Arc::clone(&backend));
    controller.set_identity(Some(&tasklist_proto::identity::Identity::new(
        "u-anyone",
        "x@example.com",
    )));
    controller.settle().await;
    assert_eq!(controller.error(), Some(ListError::Load));
}

#[tokio::test]
async fn other_users_tasks_are_off_limits() {
    let url = start_backend().await;
    let alice = connect(&url).await;
    let bob = connect(&url).await;

    let alice_id = alice.signup("alice@example.com", "secret1").await.unwrap();
    let bob_id = bob.signup("bob@example.com", "secret1").await.unwrap();
    let task = alice.create(&alice_id.id, "private").await.unwrap();

    assert!(bob.list_for_owner(&bob_id.id).await.unwrap().is_empty());
    assert!(matches!(
        bob.list_for_owner(&alice_id.id).await,
        Err(ServiceError::Fetch(_))
    ));
    assert!(matches!(
        bob.update(&task, TaskPatch::completed(true)).await,
        Err(ServiceError::Write(_))
    ));
    assert!(matches!(bob.remove(&task).await, Err(ServiceError::Write(_))));

    let tasks = alice.list_for_owner(&alice_id.id).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert!(!tasks[0].completed);
}

#[tokio::test]
async fn remove_of_absent_task_is_ok_and_update_is_not_found() {
    let url = start_backend().await;
    let backend = connect(&url).await;
    backend.signup("dave@example.com", "secret1").await.unwrap();

    let ghost = TaskId::new("no-such-task");
    backend.remove(&ghost).await.unwrap();
    assert_eq!(
        backend.update(&ghost, TaskPatch::text("x")).await,
        Err(ServiceError::NotFound(ghost))
    );
}

#[tokio::test]
async fn invalid_arguments_are_rejected_before_sending() {
    let url = start_backend().await;
    let backend = connect(&url).await;

    assert!(matches!(
        backend.create("", "A").await,
        Err(ServiceError::InvalidArgument(_))
    ));
    assert!(matches!(
        backend.create("u-1", "   ").await,
        Err(ServiceError::InvalidArgument(_))
    ));
    assert!(matches!(
        backend.update(&TaskId::new(""), TaskPatch::completed(true)).await,
        Err(ServiceError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn oversized_text_fails_instead_of_hanging() {
    let url = start_backend().await;
    let backend = connect(&url).await;
    let me = backend.signup("erin@example.com", "secret1").await.unwrap();
    let huge = "x".repeat(100 * 1024);

    let result = tokio::time::timeout(Duration::from_secs(5), backend.create(&me.id, &huge))
        .await
        .expect("oversized create never resolved");
    assert!(matches!(result, Err(ServiceError::InvalidArgument(_))), "got {result:?}");

    // The add form settles with an error and accepts the next submission.
    let mut form = AddTaskForm::new(Arc::clone(&backend));
    form.input = TextInput::with_value(&huge);
    assert!(form.submit(Some(&me)));
    let outcome = tokio::time::timeout(Duration::from_secs(5), form.wait())
        .await
        .expect("add form stuck submitting");
    assert_eq!(outcome, Some(AddOutcome::Failed));
    assert_eq!(form.error(), Some(ListError::Add));
    form.input = TextInput::with_value("A");
    assert!(form.submit(Some(&me)));
    assert!(matches!(form.wait().await, Some(AddOutcome::Added(_))));

    // An oversized edit rolls back with the inline error.
    let mut controller = TaskListController::new(Arc::clone(&backend));
    controller.set_identity(Some(&me));
    controller.settle().await;
    let id = controller.tasks()[0].id.clone();
    assert_eq!(controller.update_text(&id, &huge), EditOutcome::Submitted);
    tokio::time::timeout(Duration::from_secs(5), controller.settle())
        .await
        .expect("oversized edit never resolved");
    assert_eq!(controller.task(&id).unwrap().text, "A");
    assert_eq!(controller.edit_error(&id), Some(EditError));
    assert_eq!(controller.in_flight(), 0);
}

#[tokio::test]
async fn federated_sign_in_uses_configured_account() {
    let state = Arc::new(BackendState::with_config(
        64 * 1024,
        AccountRegistry::with_config(Some("fed@example.com".to_string()), 5),
    ));
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", state)
        .await
        .unwrap();
    let backend = connect(&format!("ws://{addr}/ws")).await;

    let first = backend.login_federated().await.unwrap();
    assert_eq!(first.email, "fed@example.com");
    backend.logout().await.unwrap();
    let second = backend.login_federated().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn federated_sign_in_without_account_is_unexpected() {
    let url = start_backend().await;
    let backend = connect(&url).await;
    let err = backend.login_federated().await.unwrap_err();
    assert!(matches!(err, AuthError::Unexpected(_)), "got {err:?}");
}

#[tokio::test]
async fn connect_to_closed_port_fails() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = RemoteBackend::connect(&format!("ws://{addr}/ws"), RemoteOptions::default()).await;
    assert!(
        matches!(
            result,
            Err(RemoteError::Unreachable(_) | RemoteError::WebSocket(_))
        ),
        "expected connection failure"
    );
}

#[tokio::test]
async fn non_websocket_url_is_rejected() {
    let result = RemoteBackend::connect("http://127.0.0.1:1/ws", RemoteOptions::default()).await;
    assert!(matches!(result, Err(RemoteError::InvalidUrl { .. })));
}
