//! Task store: append-only persistence for task histories.
//!
//! The store uses the `FileSystem` port for all I/O. Directory layout:
//!
//! ```text
//! <root>/
//!   ├── tasks/<task-id>.yaml
//!   └── escalations/<task-id>.yaml
//! ```
//!
//! Writes are guarded by an optimistic check on the stored attempt count,
//! so a task processed twice is detected instead of silently overwritten.

use std::path::{Path, PathBuf};

use crate::context::ServiceContext;
use crate::error::StoreError;
use crate::task::{AttemptRecord, Task, TaskOutcome};

/// YAML-backed task store.
pub struct TaskStore<'a> {
    ctx: &'a ServiceContext,
    root: PathBuf,
}

impl<'a> TaskStore<'a> {
    /// Creates a new store rooted at the given path.
    #[must_use]
    pub fn new(ctx: &'a ServiceContext, root: &Path) -> Self {
        Self { ctx, root: root.to_path_buf() }
    }

    /// Appends one attempt to the stored history of `task`.
    ///
    /// `expected_previous` is the number of attempts the caller believes are
    /// already stored. A task without a record starts from `task`'s id,
    /// description and criteria.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the stored attempt count differs
    /// from `expected_previous`, and [`StoreError::Task`] if the record is out
    /// of sequence or the stored task is already terminal.
    pub fn append_attempt(
        &self,
        task: &Task,
        expected_previous: usize,
        record: &AttemptRecord,
    ) -> Result<(), StoreError> {
        let mut stored = self.load_or_new(task)?;
        let found = stored.attempts().len();
        if found != expected_previous {
            return Err(StoreError::Conflict {
                task_id: task.id().to_string(),
                expected: expected_previous,
                found,
            });
        }
        stored.append_attempt(record.clone())?;
        self.save(&stored)
    }

    /// Records the terminal outcome of a stored task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown task and
    /// [`StoreError::Task`] if an outcome is already stored.
    pub fn finish(&self, task_id: &str, outcome: &TaskOutcome) -> Result<(), StoreError> {
        let mut stored = self.load(task_id)?;
        stored.finish(outcome.clone())?;
        self.save(&stored)
    }

    /// Brings the stored record up to date with `task`.
    ///
    /// Attempts not yet stored are appended in order and the outcome is
    /// written last. Persisting the same task twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the store holds more attempts than
    /// `task`, [`StoreError::Diverged`] if a stored attempt differs from
    /// `task`'s, and [`StoreError::Task`] if the stored task already ended.
    pub fn persist(&self, task: &Task) -> Result<(), StoreError> {
        let stored = self.load_or_new(task)?;
        let stored_attempts = stored.attempts();
        if stored_attempts.len() > task.attempts().len() {
            return Err(StoreError::Conflict {
                task_id: task.id().to_string(),
                expected: task.attempts().len(),
                found: stored_attempts.len(),
            });
        }
        if let Some(diverged) =
            stored_attempts.iter().zip(task.attempts()).find(|(mine, theirs)| mine != theirs)
        {
            return Err(StoreError::Diverged {
                task_id: task.id().to_string(),
                attempt: diverged.0.attempt_number,
            });
        }

        if stored.is_terminal()
            && stored.outcome() == task.outcome()
            && stored_attempts.len() == task.attempts().len()
        {
            return Ok(());
        }

        for (index, record) in task.attempts().iter().enumerate().skip(stored_attempts.len()) {
            self.append_attempt(task, index, record)?;
        }
        match task.outcome() {
            Some(outcome) => self.finish(task.id(), outcome),
            None if task.attempts().is_empty() => self.save(&stored),
            None => Ok(()),
        }
    }

    /// Loads a task by ID from `<root>/tasks/<id>.yaml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the task is unknown or its record cannot be parsed.
    pub fn load(&self, task_id: &str) -> Result<Task, StoreError> {
        let path = self.task_path(task_id);
        if !self.ctx.fs.exists(&path) {
            return Err(StoreError::NotFound(task_id.to_string()));
        }
        let contents = self.ctx.fs.read_to_string(&path).map_err(|e| io_error(&path, &e))?;
        serde_yaml::from_str(&contents)
            .map_err(|source| StoreError::Serde { task_id: task_id.to_string(), source })
    }

    /// Lists all stored task IDs.
    ///
    /// # Errors
    ///
    /// Returns an error if the tasks directory cannot be listed.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let tasks_dir = self.root.join("tasks");
        if !self.ctx.fs.exists(&tasks_dir) {
            return Ok(Vec::new());
        }
        let entries = self.ctx.fs.list_dir(&tasks_dir).map_err(|e| io_error(&tasks_dir, &e))?;
        Ok(entries
            .into_iter()
            .filter_map(|name| name.strip_suffix(".yaml").map(String::from))
            .collect())
    }

    /// Writes an escalation document to `<root>/escalations/<id>.yaml`.
    ///
    /// # Errors
    ///
    /// Returns an error if file writing fails.
    pub fn save_escalation(&self, task_id: &str, content: &str) -> Result<PathBuf, StoreError> {
        let path = self.root.join("escalations").join(format!("{task_id}.yaml"));
        self.ctx.fs.write(&path, content).map_err(|e| io_error(&path, &e))?;
        Ok(path)
    }

    fn load_or_new(&self, task: &Task) -> Result<Task, StoreError> {
        match self.load(task.id()) {
            Err(StoreError::NotFound(_)) => {
                Ok(Task::new(task.id(), task.description(), task.criteria().to_vec()))
            }
            other => other,
        }
    }

    fn save(&self, task: &Task) -> Result<(), StoreError> {
        let yaml = serde_yaml::to_string(task)
            .map_err(|source| StoreError::Serde { task_id: task.id().to_string(), source })?;
        let path = self.task_path(task.id());
        self.ctx.fs.write(&path, &yaml).map_err(|e| io_error(&path, &e))
    }

    fn task_path(&self, id: &str) -> PathBuf {
        self.root.join("tasks").join(format!("{id}.yaml"))
    }
}

fn io_error(path: &Path, err: &crate::ports::PortError) -> StoreError {
    StoreError::Io { path: path.display().to_string(), message: err.to_string() }
}
