//! Task service facade.
//!
//! [`TaskService`] is the only way the rest of the client touches stored
//! tasks. Every operation is asynchronous and may fail; nothing is cached,
//! so each [`TaskService::list_for_owner`] is a fresh round trip.
//!
//! Implementations:
//! - [`memory::InMemoryTaskService`]: in-process store for offline mode and
//!   tests, with call recording and failure injection
//! - [`crate::remote::RemoteBackend`]: the development backend over WebSocket
//!
//! Arguments are checked with the validators in this module before any
//! store access, so both implementations reject the same inputs.

pub mod memory;

use tasklist_proto::task::{Task, TaskId, TaskPatch, normalize_text};

/// Errors returned by [`TaskService`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Empty owner or task id, or blank task text.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Reading tasks from the store failed.
    #[error("failed to fetch tasks: {0}")]
    Fetch(String),
    /// Writing to the store failed.
    #[error("failed to write task: {0}")]
    Write(String),
    /// The task to update does not exist.
    #[error("task {0} not found")]
    NotFound(TaskId),
}

/// Async facade over the task store.
pub trait TaskService: Send + Sync {
    /// Returns every task owned by `owner_id`, newest created first.
    fn list_for_owner(
        &self,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Task>, ServiceError>> + Send;

    /// Creates a task with trimmed `text`, `completed = false` and
    /// store-assigned timestamps. Returns the new id.
    fn create(
        &self,
        owner_id: &str,
        text: &str,
    ) -> impl std::future::Future<Output = Result<TaskId, ServiceError>> + Send;

    /// Applies `patch` to the task and refreshes its `updated_at`.
    fn update(
        &self,
        id: &TaskId,
        patch: TaskPatch,
    ) -> impl std::future::Future<Output = Result<(), ServiceError>> + Send;

    /// Deletes the task. Removing an id that does not exist succeeds.
    fn remove(
        &self,
        id: &TaskId,
    ) -> impl std::future::Future<Output = Result<(), ServiceError>> + Send;
}

/// Rejects an empty owner id.
///
/// # Errors
///
/// [`ServiceError::InvalidArgument`] when `owner_id` is empty.
pub fn validate_owner(owner_id: &str) -> Result<(), ServiceError> {
    if owner_id.is_empty() {
        return Err(ServiceError::InvalidArgument("owner id is required".into()));
    }
    Ok(())
}

/// Rejects an empty task id.
///
/// # Errors
///
/// [`ServiceError::InvalidArgument`] when `id` is empty.
pub fn validate_task_id(id: &TaskId) -> Result<(), ServiceError> {
    if id.is_empty() {
        return Err(ServiceError::InvalidArgument("task id is required".into()));
    }
    Ok(())
}

/// Checks create arguments and returns the trimmed text.
///
/// # Errors
///
/// [`ServiceError::InvalidArgument`] for an empty owner or blank text.
pub fn validate_create(owner_id: &str, text: &str) -> Result<String, ServiceError> {
    validate_owner(owner_id)?;
    normalize_text(text).ok_or_else(|| ServiceError::InvalidArgument("task text is required".into()))
}

/// Checks update arguments and returns the patch with its text trimmed.
///
/// # Errors
///
/// [`ServiceError::InvalidArgument`] for an empty id or blank patch text.
pub fn validate_update(id: &TaskId, patch: TaskPatch) -> Result<TaskPatch, ServiceError> {
    validate_task_id(id)?;
    let text = match patch.text {
        Some(text) => Some(normalize_text(&text).ok_or_else(|| {
            ServiceError::InvalidArgument("task text cannot be empty".into())
        })?),
        None => None,
    };
    Ok(TaskPatch { text, ..patch })
}
