//! Optimistic field updates with rollback.
//!
//! A [`FieldLens`] names one mutable field of a [`Task`]. [`apply`] writes a
//! new value into the local list straight away and hands back a
//! [`Snapshot`] of the old value. When the remote call succeeds the
//! snapshot is dropped; when it fails, [`Snapshot::restore`] puts the old
//! value back.

use tasklist_proto::task::{Task, TaskId};

/// Accessor pair for one field of a [`Task`].
pub struct FieldLens<T> {
    name: &'static str,
    get: fn(&Task) -> T,
    set: fn(&mut Task, T),
}

impl<T> Clone for FieldLens<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldLens<T> {}

impl<T> std::fmt::Debug for FieldLens<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FieldLens").field(&self.name).finish()
    }
}

fn get_completed(task: &Task) -> bool {
    task.completed
}

fn set_completed(task: &mut Task, value: bool) {
    task.completed = value;
}

fn get_text(task: &Task) -> String {
    task.text.clone()
}

fn set_text(task: &mut Task, value: String) {
    task.text = value;
}

impl FieldLens<bool> {
    /// The `completed` flag.
    pub const COMPLETED: Self = Self {
        name: "completed",
        get: get_completed,
        set: set_completed,
    };
}

impl FieldLens<String> {
    /// The task text.
    pub const TEXT: Self = Self {
        name: "text",
        get: get_text,
        set: set_text,
    };
}

impl<T> FieldLens<T> {
    /// Field name, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Reads the field from `task`.
    pub fn get(&self, task: &Task) -> T {
        (self.get)(task)
    }
}

/// The value a field held before an optimistic write.
#[derive(Debug)]
pub struct Snapshot<T> {
    id: TaskId,
    lens: FieldLens<T>,
    previous: T,
}

impl<T> Snapshot<T> {
    /// The task this snapshot belongs to.
    #[must_use]
    pub const fn id(&self) -> &TaskId {
        &self.id
    }

    /// The value before the optimistic write.
    #[must_use]
    pub const fn previous(&self) -> &T {
        &self.previous
    }

    /// Writes the previous value back.
    ///
    /// Returns `false` if the task is no longer in the list.
    pub fn restore(self, tasks: &mut [Task]) -> bool {
        let Some(task) = tasks.iter_mut().find(|t| t.id == self.id) else {
            tracing::debug!(task_id = %self.id, field = self.lens.name, "rollback target gone");
            return false;
        };
        (self.lens.set)(task, self.previous);
        tracing::debug!(task_id = %self.id, field = self.lens.name, "rolled back");
        true
    }
}

/// Writes `value` into the task with `id` and returns the old value.
///
/// Returns `None` (and changes nothing) if no task has this id.
pub fn apply<T>(
    tasks: &mut [Task],
    id: &TaskId,
    lens: FieldLens<T>,
    value: T,
) -> Option<Snapshot<T>> {
    let task = tasks.iter_mut().find(|t| &t.id == id)?;
    let previous = (lens.get)(task);
    (lens.set)(task, value);
    Some(Snapshot {
        id: id.clone(),
        lens,
        previous,
    })
}
