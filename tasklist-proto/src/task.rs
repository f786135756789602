//! Task data model shared by the client and the backend.
//!
//! A [`Task`] is a short, owner-scoped text item with a completion flag.
//! Identifiers and timestamps are assigned by the store; clients only ever
//! change `text` and `completed`, through a [`TaskPatch`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for a task, assigned by the store on creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    /// Wraps an identifier issued by a store.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh time-ordered identifier (UUID v7).
    ///
    /// Only stores call this; clients never invent task ids.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Returns the string form of this id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the id is the empty string.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single user-owned to-do item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Store-assigned identifier, stable for the task's lifetime.
    pub id: TaskId,
    /// Identity id of the owner. Set at creation, never changed.
    pub owner_id: String,
    /// Trimmed, non-empty task text.
    pub text: String,
    /// Whether the task has been marked done.
    pub completed: bool,
    /// Creation time in milliseconds since epoch (store clock).
    pub created_at: u64,
    /// Last mutation time in milliseconds since epoch (store clock).
    pub updated_at: u64,
}

/// A partial update to a task's mutable fields.
///
/// Fields left as `None` are not touched. Immutable fields (`id`,
/// `owner_id`, `created_at`) cannot be expressed here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    /// Replacement text, if any.
    pub text: Option<String>,
    /// Replacement completion flag, if any.
    pub completed: Option<bool>,
}

impl TaskPatch {
    /// A patch that only sets the completion flag.
    #[must_use]
    pub const fn completed(completed: bool) -> Self {
        Self {
            text: None,
            completed: Some(completed),
        }
    }

    /// A patch that only replaces the text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            completed: None,
        }
    }

    /// Applies this patch to a task, leaving `None` fields unchanged.
    ///
    /// Does not touch `updated_at`; that belongs to the store.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(text) = &self.text {
            task.text.clone_from(text);
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
    }
}

/// Trims task text, returning `None` when nothing is left.
///
/// Every write path runs text through here so that blank tasks are never
/// stored.
#[must_use]
pub fn normalize_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
