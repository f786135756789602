//! Application state and event handling.
//!
//! [`App`] ties the session, the task list controller and the input forms
//! together. The UI loop calls [`App::tick`] once per frame to fold in
//! anything that finished in the background, and [`App::handle_key_event`]
//! for every key press.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tasklist_proto::identity::Identity;
use tasklist_proto::task::{Task, TaskId};
use tokio::sync::{mpsc, watch};

use crate::controller::TaskListController;
use crate::forms::{AddOutcome, AddTaskForm, AuthForm, AuthMode, AuthRequest, TextInput};
use crate::identity::{AuthError, IdentityProvider};
use crate::service::TaskService;
use crate::session::{Session, SessionContext};

/// Message shown when signing out fails.
pub const LOGOUT_FAILED: &str = "Failed to log out.";

/// Which screen is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Waiting for the first identity notification.
    Loading,
    /// Email/password sign-in.
    Login,
    /// Account creation.
    Signup,
    /// The signed-in user's tasks.
    Tasks,
}

/// Which part of the tasks screen receives keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// The new-task input (default).
    NewTask,
    /// The task list.
    List,
}

/// Results of identity calls made in the background.
enum UiEvent {
    Auth(Result<Identity, AuthError>),
    Logout(Result<(), AuthError>),
}

/// Main application state.
pub struct App<S, P> {
    session: SessionContext<P>,
    session_rx: watch::Receiver<Session>,
    controller: TaskListController<S>,
    add_form: AddTaskForm<S>,
    auth_form: AuthForm,
    focus: Focus,
    selected: usize,
    editing: Option<(TaskId, TextInput)>,
    logout_pending: bool,
    logout_error: Option<&'static str>,
    mode_label: String,
    timestamp_format: String,
    events_tx: mpsc::UnboundedSender<UiEvent>,
    events_rx: mpsc::UnboundedReceiver<UiEvent>,
    /// Whether the app should quit.
    pub should_quit: bool,
}

impl<S, P> App<S, P>
where
    S: TaskService + 'static,
    P: IdentityProvider + 'static,
{
    /// Creates the app around a started session and a task service.
    pub fn new(session: SessionContext<P>, service: Arc<S>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            session_rx: session.watch(),
            session,
            controller: TaskListController::new(Arc::clone(&service)),
            add_form: AddTaskForm::new(service),
            auth_form: AuthForm::new(),
            focus: Focus::NewTask,
            selected: 0,
            editing: None,
            logout_pending: false,
            logout_error: None,
            mode_label: "offline".to_string(),
            timestamp_format: "%H:%M".to_string(),
            events_tx,
            events_rx,
            should_quit: false,
        }
    }

    /// Sets the backend description shown in the status bar.
    #[must_use]
    pub fn with_mode_label(mut self, label: impl Into<String>) -> Self {
        self.mode_label = label.into();
        self
    }

    /// Sets the chrono format used for task timestamps.
    #[must_use]
    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    /// Current screen, derived from the session and the auth form mode.
    #[must_use]
    pub fn screen(&self) -> Screen {
        let session = self.session_rx.borrow();
        if session.loading {
            Screen::Loading
        } else if session.identity.is_some() {
            Screen::Tasks
        } else {
            match self.auth_form.mode() {
                AuthMode::Login => Screen::Login,
                AuthMode::Signup => Screen::Signup,
            }
        }
    }

    /// Signed-in identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.session_rx.borrow().identity.clone()
    }

    /// The task list controller.
    #[must_use]
    pub const fn controller(&self) -> &TaskListController<S> {
        &self.controller
    }

    /// The new-task form.
    #[must_use]
    pub const fn add_form(&self) -> &AddTaskForm<S> {
        &self.add_form
    }

    /// The sign-in / sign-up form.
    #[must_use]
    pub const fn auth_form(&self) -> &AuthForm {
        &self.auth_form
    }

    /// Focused part of the tasks screen.
    #[must_use]
    pub const fn focus(&self) -> Focus {
        self.focus
    }

    /// Index of the selected task.
    #[must_use]
    pub const fn selected(&self) -> usize {
        self.selected
    }

    /// The task being edited and its input.
    #[must_use]
    pub fn editing(&self) -> Option<(&TaskId, &TextInput)> {
        self.editing.as_ref().map(|(id, input)| (id, input))
    }

    /// Error from the last failed sign-out.
    #[must_use]
    pub const fn logout_error(&self) -> Option<&'static str> {
        self.logout_error
    }

    /// Backend description for the status bar.
    #[must_use]
    pub fn mode_label(&self) -> &str {
        &self.mode_label
    }

    /// Chrono format for task timestamps.
    #[must_use]
    pub fn timestamp_format(&self) -> &str {
        &self.timestamp_format
    }

    /// Folds in session changes and finished background calls. Never waits.
    ///
    /// Only the latest session is seen: changes that happen between two
    /// ticks are merged, so a sign-out followed by a sign-in as the same
    /// user never reaches the controller.
    pub fn tick(&mut self) {
        if self.session_rx.has_changed().unwrap_or(false) {
            let session = self.session_rx.borrow_and_update().clone();
            self.on_session(&session);
        }

        self.controller.drain_completions();

        while let Some(outcome) = self.add_form.poll() {
            if let AddOutcome::Added(_) = outcome {
                self.controller.load();
            }
        }

        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(event);
        }

        self.clamp_selection();
    }

    /// Handle a key event.
    pub fn handle_key_event(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match self.screen() {
            Screen::Loading => {
                if key.code == KeyCode::Esc {
                    self.should_quit = true;
                }
            }
            Screen::Login | Screen::Signup => self.handle_auth_key(key),
            Screen::Tasks => self.handle_tasks_key(key),
        }
    }

    fn handle_auth_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab | KeyCode::BackTab => self.auth_form.focus_next(),
            KeyCode::Enter => self.submit_auth(),
            KeyCode::Char('g') if ctrl => self.login_federated(),
            KeyCode::Char('n') if ctrl => {
                if !self.auth_form.is_submitting() {
                    self.auth_form.toggle_mode();
                }
            }
            _ => {
                self.auth_form.focused_input().handle_key(key);
            }
        }
    }

    fn handle_tasks_key(&mut self, key: KeyEvent) {
        if self.editing.is_some() {
            self.handle_edit_key(key);
            return;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('o') if ctrl => {
                self.logout();
                return;
            }
            KeyCode::Esc => {
                self.should_quit = true;
                return;
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.focus = match self.focus {
                    Focus::NewTask => Focus::List,
                    Focus::List => Focus::NewTask,
                };
                return;
            }
            _ => {}
        }

        match self.focus {
            Focus::NewTask => {
                if key.code == KeyCode::Enter {
                    let identity = self.identity();
                    self.add_form.submit(identity.as_ref());
                } else {
                    self.add_form.input.handle_key(key);
                }
            }
            Focus::List => self.handle_list_key(key),
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                let last = self.controller.tasks().len().saturating_sub(1);
                self.selected = (self.selected + 1).min(last);
            }
            KeyCode::Char(' ') => {
                if let Some(id) = self.selected_task_id() {
                    self.controller.toggle_complete(&id);
                }
            }
            KeyCode::Char('d') => {
                if let Some(id) = self.selected_task_id() {
                    self.controller.delete(&id);
                    self.clamp_selection();
                }
            }
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(task) = self.selected_task() {
                    let input = TextInput::with_value(&task.text);
                    self.editing = Some((task.id.clone(), input));
                }
            }
            KeyCode::Char('r') => self.controller.load(),
            _ => {}
        }
    }

    fn handle_edit_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                if let Some((id, input)) = self.editing.take() {
                    self.controller.update_text(&id, input.value());
                }
            }
            KeyCode::Esc => self.editing = None,
            _ => {
                if let Some((_, input)) = self.editing.as_mut() {
                    input.handle_key(key);
                }
            }
        }
    }

    /// Selected task, if the list is not empty.
    #[must_use]
    pub fn selected_task(&self) -> Option<&Task> {
        self.controller.tasks().get(self.selected)
    }

    fn selected_task_id(&self) -> Option<TaskId> {
        self.selected_task().map(|t| t.id.clone())
    }

    fn clamp_selection(&mut self) {
        let len = self.controller.tasks().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
        if let Some((id, _)) = &self.editing
            && self.controller.task(id).is_none()
        {
            self.editing = None;
        }
    }

    fn submit_auth(&mut self) {
        let Some(request) = self.auth_form.submit() else {
            return;
        };
        let provider = Arc::clone(self.session.provider());
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = match request {
                AuthRequest::Login { email, password } => provider.login(&email, &password).await,
                AuthRequest::Signup { email, password } => {
                    provider.signup(&email, &password).await
                }
            };
            let _ = tx.send(UiEvent::Auth(result));
        });
    }

    fn login_federated(&mut self) {
        if !self.auth_form.begin_federated() {
            return;
        }
        let provider = Arc::clone(self.session.provider());
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(UiEvent::Auth(provider.login_federated().await));
        });
    }

    fn logout(&mut self) {
        if self.logout_pending {
            return;
        }
        self.logout_pending = true;
        self.logout_error = None;
        let provider = Arc::clone(self.session.provider());
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(UiEvent::Logout(provider.logout().await));
        });
    }

    fn on_session(&mut self, session: &Session) {
        if session.loading {
            return;
        }
        self.controller.set_identity(session.identity.as_ref());
        if session.identity.is_none() {
            self.editing = None;
            self.selected = 0;
            self.focus = Focus::NewTask;
            self.add_form.input.clear();
            self.logout_error = None;
        }
    }

    fn apply_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Auth(Ok(identity)) => {
                tracing::info!(user_id = %identity.id, "signed in");
                self.auth_form.reset();
            }
            UiEvent::Auth(Err(e)) => {
                if e.is_cancellation() {
                    tracing::debug!("federated sign-in cancelled");
                } else {
                    tracing::warn!(error = %e, "sign-in failed");
                }
                self.auth_form.finish(Some(&e));
            }
            UiEvent::Logout(result) => {
                self.logout_pending = false;
                if let Err(e) = result {
                    tracing::warn!(error = %e, "sign-out failed");
                    self.logout_error = Some(LOGOUT_FAILED);
                } else {
                    tracing::info!("signed out");
                }
            }
        }
    }
}
