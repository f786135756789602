//! In-process [`TaskService`] implementation.
//!
//! Backs offline mode and doubles as the test service: every call is
//! recorded, failures can be injected per operation, and list calls can be
//! delayed so tests control the order in which completions arrive.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tasklist_proto::task::{Task, TaskId, TaskPatch};

use super::{
    ServiceError, TaskService, validate_create, validate_owner, validate_task_id, validate_update,
};

/// Facade operations, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`TaskService::list_for_owner`].
    List,
    /// [`TaskService::create`].
    Create,
    /// [`TaskService::update`].
    Update,
    /// [`TaskService::remove`].
    Remove,
}

/// One recorded facade call, with the arguments as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    /// `list_for_owner(owner_id)`.
    List {
        /// Requested owner.
        owner_id: String,
    },
    /// `create(owner_id, text)`.
    Create {
        /// Requested owner.
        owner_id: String,
        /// Text as passed in.
        text: String,
    },
    /// `update(id, patch)`.
    Update {
        /// Target task.
        id: TaskId,
        /// Patch as passed in.
        patch: TaskPatch,
    },
    /// `remove(id)`.
    Remove {
        /// Target task.
        id: TaskId,
    },
}

#[derive(Default)]
struct Inner {
    tasks: HashMap<TaskId, Task>,
    last_timestamp: u64,
    calls: Vec<ServiceCall>,
    fail_next: HashMap<Operation, u32>,
    failing: HashSet<Operation>,
    list_delays: VecDeque<Duration>,
}

impl Inner {
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

    /// Consumes one injected failure for `op`, if any is pending.
    fn should_fail(&mut self, op: Operation) -> bool {
        if self.failing.contains(&op) {
            return true;
        }
        match self.fail_next.get_mut(&op) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }

    fn insert(&mut self, owner_id: &str, text: String) -> TaskId {
        let now = self.tick();
        let task = Task {
            id: TaskId::generate(),
            owner_id: owner_id.to_string(),
            text,
            completed: false,
            created_at: now,
            updated_at: now,
        };
        let id = task.id.clone();
        self.tasks.insert(id.clone(), task);
        id
    }
}

/// Thread-safe in-memory task store.
#[derive(Default)]
pub struct InMemoryTaskService {
    inner: Mutex<Inner>,
}

impl InMemoryTaskService {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a task directly, bypassing the call log and failure
    /// injection. Returns the new id.
    pub fn seed(&self, owner_id: &str, text: &str) -> TaskId {
        self.inner.lock().insert(owner_id, text.trim().to_string())
    }

    /// Returns a copy of a stored task.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.inner.lock().tasks.get(id).cloned()
    }

    /// Returns every call made so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.inner.lock().calls.clone()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Makes the next call of `op` fail.
    pub fn fail_next(&self, op: Operation) {
        *self.inner.lock().fail_next.entry(op).or_insert(0) += 1;
    }

    /// Makes every call of `op` fail until switched off.
    pub fn set_failing(&self, op: Operation, failing: bool) {
        let mut inner = self.inner.lock();
        if failing {
            inner.failing.insert(op);
        } else {
            inner.failing.remove(&op);
        }
    }

    /// Delays the next `list_for_owner` call by `delay` before it reads
    /// the store. Delays queue up in call order.
    pub fn delay_next_list(&self, delay: Duration) {
        self.inner.lock().list_delays.push_back(delay);
    }

    fn record(&self, call: ServiceCall) {
        self.inner.lock().calls.push(call);
    }
}

impl TaskService for InMemoryTaskService {
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Task>, ServiceError> {
        self.record(ServiceCall::List {
            owner_id: owner_id.to_string(),
        });
        validate_owner(owner_id)?;

        let delay = self.inner.lock().list_delays.pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock();
        if inner.should_fail(Operation::List) {
            return Err(ServiceError::Fetch("store unavailable".into()));
        }
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn create(&self, owner_id: &str, text: &str) -> Result<TaskId, ServiceError> {
        self.record(ServiceCall::Create {
            owner_id: owner_id.to_string(),
            text: text.to_string(),
        });
        let text = validate_create(owner_id, text)?;

        let mut inner = self.inner.lock();
        if inner.should_fail(Operation::Create) {
            return Err(ServiceError::Write("store unavailable".into()));
        }
        let id = inner.insert(owner_id, text);
        tracing::debug!(task_id = %id, owner_id, "task created");
        Ok(id)
    }

    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<(), ServiceError> {
        self.record(ServiceCall::Update {
            id: id.clone(),
            patch: patch.clone(),
        });
        let patch = validate_update(id, patch)?;

        let mut inner = self.inner.lock();
        if inner.should_fail(Operation::Update) {
            return Err(ServiceError::Write("store unavailable".into()));
        }
        let now = inner.tick();
        let task = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound(id.clone()))?;
        patch.apply_to(task);
        task.updated_at = now;
        Ok(())
    }

    async fn remove(&self, id: &TaskId) -> Result<(), ServiceError> {
        self.record(ServiceCall::Remove { id: id.clone() });
        validate_task_id(id)?;

        let mut inner = self.inner.lock();
        if inner.should_fail(Operation::Remove) {
            return Err(ServiceError::Write("store unavailable".into()));
        }
        if inner.tasks.remove(id).is_none() {
            tracing::debug!(task_id = %id, "remove of absent task");
        }
        Ok(())
    }
}
