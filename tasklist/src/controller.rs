//! Task list controller: the signed-in user's tasks plus optimistic
//! mutations against a [`TaskService`].
//!
//! The controller is owned by one logical thread (the UI loop or a test).
//! Every mutation is applied to the local list first, then the remote call
//! is spawned onto the tokio runtime. Results come back as completions on
//! an internal channel; the owner applies them with
//! [`TaskListController::drain_completions`] each frame, or awaits them with
//! [`TaskListController::next_completion`] / [`TaskListController::settle`].
//!
//! Loads are numbered. A load result is only applied if no newer load was
//! started after it, so rapid identity changes never show another user's
//! list.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tasklist_proto::identity::Identity;
use tasklist_proto::task::{Task, TaskId, TaskPatch, normalize_text};
use tokio::sync::mpsc;

use crate::optimistic::{self, FieldLens, Snapshot};
use crate::service::{ServiceError, TaskService};

/// List-level errors shown above the task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ListError {
    /// Fetching the list failed.
    #[error("Could not load your tasks. Please try again later.")]
    Load,
    /// Toggling completion failed and was rolled back.
    #[error("Failed to update task status.")]
    Toggle,
    /// Deleting failed; the list was reloaded.
    #[error("Failed to delete task.")]
    Delete,
    /// Creating a task failed.
    #[error("Could not add task. Please try again.")]
    Add,
}

/// Inline error for a failed text edit, scoped to one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Failed to save changes. Please try again.")]
pub struct EditError;

/// Result of [`TaskListController::update_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// Nothing to save: unknown id, blank input, or same text.
    Unchanged,
    /// Applied locally and sent to the service.
    Submitted,
}

/// What a completion did to the controller state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The current load finished (successfully or not).
    Loaded,
    /// A superseded load finished and was ignored.
    StaleLoad,
    /// A completion toggle finished.
    Toggle {
        /// Target task.
        id: TaskId,
        /// Whether the service accepted it.
        ok: bool,
    },
    /// A delete finished.
    Delete {
        /// Target task.
        id: TaskId,
        /// Whether the service accepted it.
        ok: bool,
    },
    /// A text edit finished.
    Edit {
        /// Target task.
        id: TaskId,
        /// Whether the service accepted it.
        ok: bool,
    },
}

enum Completion {
    Loaded {
        generation: u64,
        result: Result<Vec<Task>, ServiceError>,
    },
    Toggled {
        snapshot: Snapshot<bool>,
        result: Result<(), ServiceError>,
    },
    Deleted {
        id: TaskId,
        result: Result<(), ServiceError>,
    },
    Edited {
        snapshot: Snapshot<String>,
        result: Result<(), ServiceError>,
    },
}

/// In-memory task list for the current identity.
pub struct TaskListController<S> {
    service: Arc<S>,
    owner_id: Option<String>,
    tasks: Vec<Task>,
    is_loading: bool,
    error: Option<ListError>,
    edit_errors: HashMap<TaskId, EditError>,
    generation: u64,
    in_flight: usize,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl<S: TaskService + 'static> TaskListController<S> {
    /// Creates a controller with no identity and an empty list.
    pub fn new(service: Arc<S>) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            service,
            owner_id: None,
            tasks: Vec::new(),
            is_loading: false,
            error: None,
            edit_errors: HashMap::new(),
            generation: 0,
            in_flight: 0,
            completions_tx,
            completions_rx,
        }
    }

    /// The service this controller talks to.
    #[must_use]
    pub const fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Tasks as currently displayed, newest first.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Looks up a displayed task.
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// `true` while the current load is outstanding.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Current list-level error.
    #[must_use]
    pub const fn error(&self) -> Option<ListError> {
        self.error
    }

    /// Inline edit error for `id`, if its last edit failed.
    #[must_use]
    pub fn edit_error(&self, id: &TaskId) -> Option<EditError> {
        self.edit_errors.get(id).copied()
    }

    /// Forgets the inline edit error for `id`.
    pub fn clear_edit_error(&mut self, id: &TaskId) {
        self.edit_errors.remove(id);
    }

    /// Identity id the list belongs to.
    #[must_use]
    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    /// Number of service calls that have not reported back yet.
    #[must_use]
    pub const fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Switches to a new identity and reloads. Same identity is a no-op.
    pub fn set_identity(&mut self, identity: Option<&Identity>) {
        let owner_id = identity.map(|i| i.id.clone());
        if owner_id == self.owner_id {
            return;
        }
        tracing::debug!(
            owner_id = owner_id.as_deref().unwrap_or("-"),
            "identity changed"
        );
        self.owner_id = owner_id;
        self.edit_errors.clear();
        self.load();
    }

    /// Fetches the owner's tasks, superseding any load still outstanding.
    ///
    /// Signed out, this clears the list without calling the service.
    pub fn load(&mut self) {
        self.generation += 1;
        let generation = self.generation;

        let Some(owner_id) = self.owner_id.clone() else {
            self.tasks.clear();
            self.is_loading = false;
            self.error = None;
            return;
        };

        self.is_loading = true;
        self.error = None;
        let service = Arc::clone(&self.service);
        self.spawn(async move {
            let result = service.list_for_owner(&owner_id).await;
            Completion::Loaded { generation, result }
        });
    }

    /// Flips `completed` locally and sends the change. Unknown ids are a
    /// no-op. Returns `true` if a call was issued.
    pub fn toggle_complete(&mut self, id: &TaskId) -> bool {
        let Some(current) = self.task(id).map(|t| t.completed) else {
            return false;
        };
        let Some(snapshot) = optimistic::apply(&mut self.tasks, id, FieldLens::COMPLETED, !current)
        else {
            return false;
        };

        let service = Arc::clone(&self.service);
        let id = id.clone();
        self.spawn(async move {
            let result = service.update(&id, TaskPatch::completed(!current)).await;
            Completion::Toggled { snapshot, result }
        });
        true
    }

    /// Removes the task locally and sends the delete.
    pub fn delete(&mut self, id: &TaskId) {
        self.tasks.retain(|t| &t.id != id);
        self.edit_errors.remove(id);

        let service = Arc::clone(&self.service);
        let id = id.clone();
        self.spawn(async move {
            let result = service.remove(&id).await;
            Completion::Deleted { id, result }
        });
    }

    /// Saves new text for a task.
    ///
    /// Blank input, input equal to the current text after trimming, and
    /// unknown ids are [`EditOutcome::Unchanged`] and never reach the
    /// service.
    pub fn update_text(&mut self, id: &TaskId, text: &str) -> EditOutcome {
        let Some(trimmed) = normalize_text(text) else {
            return EditOutcome::Unchanged;
        };
        match self.task(id) {
            Some(task) if task.text != trimmed => {}
            _ => return EditOutcome::Unchanged,
        }
        let Some(snapshot) =
            optimistic::apply(&mut self.tasks, id, FieldLens::TEXT, trimmed.clone())
        else {
            return EditOutcome::Unchanged;
        };
        self.edit_errors.remove(id);

        let service = Arc::clone(&self.service);
        let id = id.clone();
        self.spawn(async move {
            let result = service.update(&id, TaskPatch::text(trimmed)).await;
            Completion::Edited { snapshot, result }
        });
        EditOutcome::Submitted
    }

    /// Applies every completion that has already arrived. Never waits.
    pub fn drain_completions(&mut self) -> Vec<Applied> {
        let mut applied = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            applied.push(self.apply(completion));
        }
        applied
    }

    /// Waits for the next completion and applies it.
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<Applied> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.completions_rx.recv().await?;
        Some(self.apply(completion))
    }

    /// Waits until every call, including follow-up reloads, has reported
    /// back.
    pub async fn settle(&mut self) -> Vec<Applied> {
        let mut applied = Vec::new();
        while let Some(a) = self.next_completion().await {
            applied.push(a);
        }
        applied
    }

    fn spawn<F>(&mut self, call: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(call.await);
        });
    }

    fn apply(&mut self, completion: Completion) -> Applied {
        self.in_flight = self.in_flight.saturating_sub(1);
        match completion {
            Completion::Loaded { generation, result } => {
                if generation != self.generation {
                    tracing::debug!(generation, current = self.generation, "stale load discarded");
                    return Applied::StaleLoad;
                }
                self.is_loading = false;
                match result {
                    Ok(tasks) => {
                        tracing::debug!(count = tasks.len(), "tasks loaded");
                        self.edit_errors
                            .retain(|id, _| tasks.iter().any(|t| &t.id == id));
                        self.tasks = tasks;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to load tasks");
                        self.tasks.clear();
                        self.error = Some(ListError::Load);
                    }
                }
                Applied::Loaded
            }
            Completion::Toggled { snapshot, result } => {
                let id = snapshot.id().clone();
                if let Err(e) = result {
                    tracing::warn!(task_id = %id, error = %e, "toggle failed, rolling back");
                    snapshot.restore(&mut self.tasks);
                    self.error = Some(ListError::Toggle);
                    return Applied::Toggle { id, ok: false };
                }
                Applied::Toggle { id, ok: true }
            }
            Completion::Deleted { id, result } => {
                if let Err(e) = result {
                    tracing::warn!(task_id = %id, error = %e, "delete failed, reloading");
                    self.load();
                    self.error = Some(ListError::Delete);
                    return Applied::Delete { id, ok: false };
                }
                Applied::Delete { id, ok: true }
            }
            Completion::Edited { snapshot, result } => {
                let id = snapshot.id().clone();
                if let Err(e) = result {
                    tracing::warn!(task_id = %id, error = %e, "edit failed, rolling back");
                    snapshot.restore(&mut self.tasks);
                    self.edit_errors.insert(id.clone(), EditError);
                    return Applied::Edit { id, ok: false };
                }
                Applied::Edit { id, ok: true }
            }
        }
    }
}
