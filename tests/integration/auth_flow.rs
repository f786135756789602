//! Sign-in, sign-up and sign-out flows driven through the app's key
//! handling, offline (in-memory service and local identity provider).

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tasklist::app::{App, Focus, LOGOUT_FAILED, Screen};
use tasklist::identity::IdentityProvider;
use tasklist::identity::local::LocalIdentityProvider;
use tasklist::service::memory::{InMemoryTaskService, Operation};
use tasklist::session::{DEFAULT_AUTH_TIMEOUT, SessionContext};

type TestApp = App<InMemoryTaskService, LocalIdentityProvider>;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    app: TestApp,
    provider: Arc<LocalIdentityProvider>,
    service: Arc<InMemoryTaskService>,
}

fn harness_with(provider: LocalIdentityProvider) -> Harness {
    let provider = Arc::new(provider);
    let service = Arc::new(InMemoryTaskService::new());
    let session = SessionContext::start(Arc::clone(&provider), DEFAULT_AUTH_TIMEOUT);
    Harness {
        app: App::new(session, Arc::clone(&service)),
        provider,
        service,
    }
}

fn press(app: &mut TestApp, code: KeyCode) {
    app.handle_key_event(KeyEvent::new(code, KeyModifiers::NONE));
}

fn ctrl(app: &mut TestApp, c: char) {
    app.handle_key_event(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL));
}

fn type_str(app: &mut TestApp, s: &str) {
    for c in s.chars() {
        press(app, KeyCode::Char(c));
    }
}

/// Ticks the app until `pred` holds, yielding to spawned calls in between.
async fn pump_until(app: &mut TestApp, pred: impl Fn(&TestApp) -> bool) {
    for _ in 0..400 {
        app.tick();
        if pred(app) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

/// Ticks for a short while so background calls can finish.
async fn pump(app: &mut TestApp) {
    for _ in 0..20 {
        app.tick();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn fill_login(app: &mut TestApp, email: &str, password: &str) {
    pump_until(app, |a| a.screen() == Screen::Login).await;
    type_str(app, email);
    press(app, KeyCode::Tab);
    type_str(app, password);
    press(app, KeyCode::Enter);
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wrong_credentials_stay_on_login_with_message() {
    let mut h = harness_with(LocalIdentityProvider::new());
    h.provider.signup("a@b.co", "secret1").await.unwrap();
    h.provider.logout().await.unwrap();

    fill_login(&mut h.app, "a@b.co", "wrong-pw").await;
    pump_until(&mut h.app, |a| !a.auth_form().is_submitting()).await;

    assert_eq!(h.app.screen(), Screen::Login);
    assert_eq!(h.app.auth_form().error(), Some("Invalid email or password."));
    assert!(h.service.calls().is_empty());
}

#[tokio::test]
async fn successful_login_shows_tasks_and_loads_list() {
    let mut h = harness_with(LocalIdentityProvider::new());
    let me = h.provider.signup("a@b.co", "secret1").await.unwrap();
    h.provider.logout().await.unwrap();
    h.service.seed(&me.id, "existing");

    fill_login(&mut h.app, "a@b.co", "secret1").await;
    pump_until(&mut h.app, |a| a.controller().tasks().len() == 1).await;

    assert_eq!(h.app.screen(), Screen::Tasks);
    assert_eq!(h.app.identity().unwrap().email, "a@b.co");
    assert_eq!(h.app.controller().tasks()[0].text, "existing");
    assert_eq!(h.app.auth_form().error(), None);
    assert_eq!(h.app.auth_form().password.value(), "");
}

#[tokio::test]
async fn disabled_account_message() {
    let mut h = harness_with(LocalIdentityProvider::new());
    h.provider.signup("a@b.co", "secret1").await.unwrap();
    h.provider.logout().await.unwrap();
    assert!(h.provider.set_disabled("a@b.co", true));

    fill_login(&mut h.app, "a@b.co", "secret1").await;
    pump_until(&mut h.app, |a| a.auth_form().error().is_some()).await;
    assert_eq!(
        h.app.auth_form().error(),
        Some("This user account has been disabled.")
    );
}

// ---------------------------------------------------------------------------
// Signup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn signup_password_mismatch_never_reaches_provider() {
    let mut h = harness_with(LocalIdentityProvider::new());
    pump_until(&mut h.app, |a| a.screen() == Screen::Login).await;
    ctrl(&mut h.app, 'n');
    assert_eq!(h.app.screen(), Screen::Signup);

    type_str(&mut h.app, "new@b.co");
    press(&mut h.app, KeyCode::Tab);
    type_str(&mut h.app, "secret1");
    press(&mut h.app, KeyCode::Tab);
    type_str(&mut h.app, "secret2");
    press(&mut h.app, KeyCode::Enter);
    pump(&mut h.app).await;

    assert_eq!(h.app.screen(), Screen::Signup);
    assert_eq!(h.app.auth_form().error(), Some("Passwords do not match."));
    // The account was never created, so signing up properly still works.
    assert!(h.provider.signup("new@b.co", "secret1").await.is_ok());
}

#[tokio::test]
async fn weak_password_message() {
    let mut h = harness_with(LocalIdentityProvider::new());
    pump_until(&mut h.app, |a| a.screen() == Screen::Login).await;
    ctrl(&mut h.app, 'n');
    type_str(&mut h.app, "new@b.co");
    press(&mut h.app, KeyCode::Tab);
    type_str(&mut h.app, "123");
    press(&mut h.app, KeyCode::Tab);
    type_str(&mut h.app, "123");
    press(&mut h.app, KeyCode::Enter);

    pump_until(&mut h.app, |a| a.auth_form().error().is_some()).await;
    assert_eq!(
        h.app.auth_form().error(),
        Some("Password is too weak (should be at least 6 characters).")
    );
}

// ---------------------------------------------------------------------------
// Federated sign-in
// ---------------------------------------------------------------------------

#[tokio::test]
async fn federated_sign_in_reaches_tasks() {
    let mut h = harness_with(LocalIdentityProvider::new().with_federated_account("fed@b.co"));
    pump_until(&mut h.app, |a| a.screen() == Screen::Login).await;
    ctrl(&mut h.app, 'g');
    pump_until(&mut h.app, |a| a.screen() == Screen::Tasks).await;
    assert_eq!(h.app.identity().unwrap().email, "fed@b.co");
}

#[tokio::test]
async fn cancelled_federated_sign_in_shows_nothing() {
    let mut h = harness_with(LocalIdentityProvider::new().with_federated_account("fed@b.co"));
    h.provider.cancel_next_federated();
    pump_until(&mut h.app, |a| a.screen() == Screen::Login).await;

    ctrl(&mut h.app, 'g');
    assert!(h.app.auth_form().is_submitting());
    pump_until(&mut h.app, |a| !a.auth_form().is_submitting()).await;

    assert_eq!(h.app.screen(), Screen::Login);
    assert_eq!(h.app.auth_form().error(), None);
}

// ---------------------------------------------------------------------------
// Logout and the tasks screen
// ---------------------------------------------------------------------------

async fn signed_in_harness() -> Harness {
    let mut h = harness_with(LocalIdentityProvider::new());
    pump_until(&mut h.app, |a| a.screen() == Screen::Login).await;
    h.provider.signup("a@b.co", "secret1").await.unwrap();
    pump_until(&mut h.app, |a| a.screen() == Screen::Tasks).await;
    pump_until(&mut h.app, |a| !a.controller().is_loading()).await;
    h
}

#[tokio::test]
async fn logout_returns_to_login() {
    let mut h = signed_in_harness().await;
    ctrl(&mut h.app, 'o');
    pump_until(&mut h.app, |a| a.screen() == Screen::Login).await;
    assert!(h.app.controller().tasks().is_empty());
    assert_eq!(h.app.logout_error(), None);
}

#[tokio::test]
async fn failed_logout_shows_message_and_stays() {
    let mut h = signed_in_harness().await;
    h.provider.fail_next_logout();
    ctrl(&mut h.app, 'o');
    pump_until(&mut h.app, |a| a.logout_error().is_some()).await;

    assert_eq!(h.app.logout_error(), Some(LOGOUT_FAILED));
    assert_eq!(LOGOUT_FAILED, "Failed to log out.");
    assert_eq!(h.app.screen(), Screen::Tasks);
}

#[tokio::test]
async fn keyboard_add_toggle_edit_delete() {
    let mut h = signed_in_harness().await;
    assert_eq!(h.app.focus(), Focus::NewTask);

    type_str(&mut h.app, "  walk the dog ");
    press(&mut h.app, KeyCode::Enter);
    pump_until(&mut h.app, |a| a.controller().tasks().len() == 1).await;
    let id = h.app.controller().tasks()[0].id.clone();
    assert_eq!(h.app.controller().tasks()[0].text, "walk the dog");

    press(&mut h.app, KeyCode::Tab);
    assert_eq!(h.app.focus(), Focus::List);

    press(&mut h.app, KeyCode::Char(' '));
    assert!(h.app.controller().tasks()[0].completed);
    pump_until(&mut h.app, |a| a.controller().in_flight() == 0).await;
    assert!(h.service.get(&id).unwrap().completed);

    press(&mut h.app, KeyCode::Char('e'));
    assert!(h.app.editing().is_some());
    press(&mut h.app, KeyCode::End);
    type_str(&mut h.app, "!");
    press(&mut h.app, KeyCode::Enter);
    assert!(h.app.editing().is_none());
    assert_eq!(h.app.controller().tasks()[0].text, "walk the dog!");
    pump_until(&mut h.app, |a| a.controller().in_flight() == 0).await;
    assert_eq!(h.service.get(&id).unwrap().text, "walk the dog!");

    press(&mut h.app, KeyCode::Char('d'));
    assert!(h.app.controller().tasks().is_empty());
    pump_until(&mut h.app, |a| a.controller().in_flight() == 0).await;
    assert!(h.service.get(&id).is_none());
}

#[tokio::test]
async fn escape_cancels_edit_without_saving() {
    let mut h = signed_in_harness().await;
    let me = h.app.identity().unwrap();
    h.service.seed(&me.id, "A");
    press(&mut h.app, KeyCode::Tab);
    press(&mut h.app, KeyCode::Char('r'));
    pump_until(&mut h.app, |a| a.controller().tasks().len() == 1).await;
    h.service.clear_calls();

    press(&mut h.app, KeyCode::Enter);
    type_str(&mut h.app, "BBB");
    press(&mut h.app, KeyCode::Esc);
    pump(&mut h.app).await;

    assert!(h.app.editing().is_none());
    assert_eq!(h.app.controller().tasks()[0].text, "A");
    assert!(h.service.calls().is_empty());
    assert!(!h.app.should_quit);
}

#[tokio::test]
async fn failed_add_keeps_input_and_shows_error() {
    let mut h = signed_in_harness().await;
    h.service.fail_next(Operation::Create);

    type_str(&mut h.app, "A");
    press(&mut h.app, KeyCode::Enter);
    pump_until(&mut h.app, |a| a.add_form().error().is_some()).await;

    assert_eq!(
        h.app.add_form().error().unwrap().to_string(),
        "Could not add task. Please try again."
    );
    assert_eq!(h.app.add_form().input.value(), "A");
    assert!(h.app.controller().tasks().is_empty());
}
