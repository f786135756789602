//! In-memory task document store.
//!
//! Holds every task keyed by [`TaskId`]. Queries filter by owner and order
//! by creation time, newest first. Timestamps come from the store clock and
//! creation times are strictly increasing, so the ordering is total even
//! when two tasks are created within the same millisecond.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tasklist_proto::task::{Task, TaskId, TaskPatch, normalize_text};
use tokio::sync::RwLock;

/// Errors returned by [`TaskDocuments`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// Blank text or empty identifiers.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// No task with this id.
    #[error("task not found: {0}")]
    NotFound(TaskId),
}

struct Inner {
    tasks: HashMap<TaskId, Task>,
    last_timestamp: u64,
}

impl Inner {
    /// Store clock: wall time, bumped to stay strictly increasing.
    fn tick(&mut self) -> u64 {
        let now = u64::try_from(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis(),
        )
        .unwrap_or(u64::MAX);
        self.last_timestamp = now.max(self.last_timestamp.saturating_add(1));
        self.last_timestamp
    }
}

/// Thread-safe task document store.
pub struct TaskDocuments {
    inner: RwLock<Inner>,
}

impl Default for TaskDocuments {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskDocuments {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                tasks: HashMap::new(),
                last_timestamp: 0,
            }),
        }
    }

    /// Returns the tasks owned by `owner_id`, newest first.
    pub async fn list_for_owner(&self, owner_id: &str) -> Vec<Task> {
        let inner = self.inner.read().await;
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    /// Returns a single task by id.
    pub async fn get(&self, id: &TaskId) -> Option<Task> {
        self.inner.read().await.tasks.get(id).cloned()
    }

    /// Inserts a new task and returns its id.
    ///
    /// # Errors
    ///
    /// [`DocumentError::InvalidArgument`] if the owner is empty or the text
    /// is blank.
    pub async fn insert(&self, owner_id: &str, text: &str) -> Result<TaskId, DocumentError> {
        if owner_id.is_empty() {
            return Err(DocumentError::InvalidArgument("owner id is empty".into()));
        }
        let text = normalize_text(text)
            .ok_or_else(|| DocumentError::InvalidArgument("task text is blank".into()))?;

        let mut inner = self.inner.write().await;
        let now = inner.tick();
        let task = Task {
            id: TaskId::generate(),
            owner_id: owner_id.to_string(),
            text,
            completed: false,
            created_at: now,
            updated_at: now,
        };
        let id = task.id.clone();
        inner.tasks.insert(id.clone(), task);
        Ok(id)
    }

    /// Applies a patch and refreshes `updated_at`.
    ///
    /// # Errors
    ///
    /// [`DocumentError::InvalidArgument`] for blank patch text,
    /// [`DocumentError::NotFound`] for unknown ids.
    pub async fn patch(&self, id: &TaskId, patch: &TaskPatch) -> Result<(), DocumentError> {
        let mut patch = patch.clone();
        if let Some(text) = &patch.text {
            patch.text = Some(
                normalize_text(text)
                    .ok_or_else(|| DocumentError::InvalidArgument("task text is blank".into()))?,
            );
        }

        let mut inner = self.inner.write().await;
        let now = inner.tick();
        let task = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| DocumentError::NotFound(id.clone()))?;
        patch.apply_to(task);
        task.updated_at = now;
        Ok(())
    }

    /// Deletes a task.
    ///
    /// # Errors
    ///
    /// [`DocumentError::NotFound`] if no task has this id.
    pub async fn delete(&self, id: &TaskId) -> Result<(), DocumentError> {
        let mut inner = self.inner.write().await;
        inner
            .tasks
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DocumentError::NotFound(id.clone()))
    }

    /// Total number of stored tasks across all owners.
    pub async fn len(&self) -> usize {
        self.inner.read().await.tasks.len()
    }

    /// Returns `true` if the store holds no tasks.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.tasks.is_empty()
    }
}
