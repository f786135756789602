//! Input forms: single-line text inputs, the sign-in/sign-up form and the
//! new-task form.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tasklist_proto::identity::Identity;
use tasklist_proto::task::{TaskId, normalize_text};
use tokio::sync::mpsc;

use crate::controller::ListError;
use crate::service::{ServiceError, TaskService};

/// Single-line editable text with a character cursor.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    value: String,
    /// Cursor position as a character index.
    cursor: usize,
    masked: bool,
}

impl TextInput {
    /// An empty input.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty input that renders its characters as bullets.
    #[must_use]
    pub fn masked() -> Self {
        Self {
            masked: true,
            ..Self::default()
        }
    }

    /// An input pre-filled with `value`, cursor at the end.
    #[must_use]
    pub fn with_value(value: &str) -> Self {
        Self {
            value: value.to_string(),
            cursor: value.chars().count(),
            masked: false,
        }
    }

    /// Current text.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Cursor position (character index).
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Text as it should be drawn.
    #[must_use]
    pub fn display(&self) -> String {
        if self.masked {
            "\u{2022}".repeat(self.value.chars().count())
        } else {
            self.value.clone()
        }
    }

    /// Empties the input.
    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    /// Applies an editing key. Returns `false` for keys it does not handle.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.insert(c);
            }
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.len()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.len(),
            _ => return false,
        }
        true
    }

    /// Inserts a character at the cursor.
    pub fn insert(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.value.insert(at, c);
        self.cursor += 1;
    }

    fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_index(self.cursor);
            self.value.remove(at);
        }
    }

    fn delete(&mut self) {
        if self.cursor < self.len() {
            let at = self.byte_index(self.cursor);
            self.value.remove(at);
        }
    }

    fn len(&self) -> usize {
        self.value.chars().count()
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_index)
            .map_or(self.value.len(), |(i, _)| i)
    }
}

/// Whether the auth form signs in or creates an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Email/password sign-in.
    Login,
    /// Account creation with password confirmation.
    Signup,
}

/// Focusable fields of the auth form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthField {
    /// Email address.
    Email,
    /// Password.
    Password,
    /// Password confirmation (signup only).
    Confirm,
}

/// A validated auth form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRequest {
    /// Sign in with these credentials.
    Login {
        /// Account email.
        email: String,
        /// Account password.
        password: String,
    },
    /// Create an account with these credentials.
    Signup {
        /// Account email.
        email: String,
        /// Account password.
        password: String,
    },
}

/// Sign-in / sign-up form state.
#[derive(Debug, Clone)]
pub struct AuthForm {
    mode: AuthMode,
    /// Email field.
    pub email: TextInput,
    /// Password field.
    pub password: TextInput,
    /// Confirmation field (signup only).
    pub confirm: TextInput,
    focus: AuthField,
    error: Option<String>,
    submitting: bool,
}

impl Default for AuthForm {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthForm {
    /// An empty login form.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: AuthMode::Login,
            email: TextInput::new(),
            password: TextInput::masked(),
            confirm: TextInput::masked(),
            focus: AuthField::Email,
            error: None,
            submitting: false,
        }
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Focused field.
    #[must_use]
    pub const fn focus(&self) -> AuthField {
        self.focus
    }

    /// Message to show under the form.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// `true` while a submission is outstanding.
    #[must_use]
    pub const fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Switches between login and signup, keeping the email.
    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::Login => AuthMode::Signup,
            AuthMode::Signup => AuthMode::Login,
        };
        self.password.clear();
        self.confirm.clear();
        self.focus = AuthField::Email;
        self.error = None;
    }

    /// Moves focus to the next field.
    pub const fn focus_next(&mut self) {
        self.focus = match (self.focus, self.mode) {
            (AuthField::Email, _) => AuthField::Password,
            (AuthField::Password, AuthMode::Signup) => AuthField::Confirm,
            (AuthField::Password, AuthMode::Login) | (AuthField::Confirm, _) => AuthField::Email,
        };
    }

    /// The focused input.
    pub const fn focused_input(&mut self) -> &mut TextInput {
        match self.focus {
            AuthField::Email => &mut self.email,
            AuthField::Password => &mut self.password,
            AuthField::Confirm => &mut self.confirm,
        }
    }

    /// Validates the form and marks it as submitting.
    ///
    /// Returns `None` while another submission is outstanding or when
    /// validation fails; a failed check leaves its message in
    /// [`AuthForm::error`].
    pub fn submit(&mut self) -> Option<AuthRequest> {
        if self.submitting {
            return None;
        }
        let email = self.email.value().trim().to_string();
        let password = self.password.value().to_string();
        if self.mode == AuthMode::Signup && password != self.confirm.value() {
            self.error = Some("Passwords do not match.".to_string());
            return None;
        }
        self.error = None;
        self.submitting = true;
        Some(match self.mode {
            AuthMode::Login => AuthRequest::Login { email, password },
            AuthMode::Signup => AuthRequest::Signup { email, password },
        })
    }

    /// Marks the form as submitting without validation (federated sign-in).
    /// Returns `false` if a submission is already outstanding.
    pub fn begin_federated(&mut self) -> bool {
        if self.submitting {
            return false;
        }
        self.error = None;
        self.submitting = true;
        true
    }

    /// Records the outcome of a submission. Cancellations are not shown.
    pub fn finish(&mut self, error: Option<&crate::identity::AuthError>) {
        self.submitting = false;
        self.error = error
            .filter(|e| !e.is_cancellation())
            .map(ToString::to_string);
        if self.error.is_none() {
            self.password.clear();
            self.confirm.clear();
        }
    }

    /// Clears everything back to an empty login form.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// What became of a new-task submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The task was created; the list should be reloaded.
    Added(TaskId),
    /// Creation failed; the form shows an error.
    Failed,
}

/// New-task input. Creates tasks directly through the service.
pub struct AddTaskForm<S> {
    service: Arc<S>,
    /// The text being typed.
    pub input: TextInput,
    submitting: bool,
    error: Option<ListError>,
    results_tx: mpsc::UnboundedSender<Result<TaskId, ServiceError>>,
    results_rx: mpsc::UnboundedReceiver<Result<TaskId, ServiceError>>,
}

impl<S: TaskService + 'static> AddTaskForm<S> {
    /// An empty form.
    pub fn new(service: Arc<S>) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            service,
            input: TextInput::new(),
            submitting: false,
            error: None,
            results_tx,
            results_rx,
        }
    }

    /// `true` while a create call is outstanding ("Adding...").
    #[must_use]
    pub const fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Error from the last failed submission.
    #[must_use]
    pub const fn error(&self) -> Option<ListError> {
        self.error
    }

    /// Creates a task from the input for `owner`.
    ///
    /// No-op (returns `false`) when signed out, when the trimmed input is
    /// empty, or while a previous submission is outstanding.
    pub fn submit(&mut self, owner: Option<&Identity>) -> bool {
        let Some(owner) = owner else {
            return false;
        };
        if self.submitting {
            return false;
        }
        let Some(text) = normalize_text(self.input.value()) else {
            return false;
        };

        self.submitting = true;
        self.error = None;
        let service = Arc::clone(&self.service);
        let owner_id = owner.id.clone();
        let tx = self.results_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(service.create(&owner_id, &text).await);
        });
        true
    }

    /// Applies a finished submission, if one has arrived. Never waits.
    pub fn poll(&mut self) -> Option<AddOutcome> {
        let result = self.results_rx.try_recv().ok()?;
        Some(self.finish(result))
    }

    /// Waits for the outstanding submission. Returns `None` if there is
    /// none.
    pub async fn wait(&mut self) -> Option<AddOutcome> {
        if !self.submitting {
            return None;
        }
        let result = self.results_rx.recv().await?;
        Some(self.finish(result))
    }

    fn finish(&mut self, result: Result<TaskId, ServiceError>) -> AddOutcome {
        self.submitting = false;
        match result {
            Ok(id) => {
                tracing::debug!(task_id = %id, "task added");
                self.input.clear();
                AddOutcome::Added(id)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to add task");
                self.error = Some(ListError::Add);
                AddOutcome::Failed
            }
        }
    }
}
