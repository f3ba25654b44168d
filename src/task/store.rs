//! Task store capability and its in-memory implementation.

use std::future::Future;

use dashmap::DashMap;

use super::Task;
use crate::{Error, Result};

/// Read access to tasks.
///
/// Persistence of tasks belongs to the surrounding service; the engine only
/// needs to load one by ID.
pub trait TaskStore: Send + Sync {
    /// Load a task.
    ///
    /// Fails with `Error::TaskNotFound` if the task does not exist.
    fn get_task(&self, task_id: &str) -> impl Future<Output = Result<Task>> + Send;
}

/// In-memory task store using a lock-free concurrent hashmap.
///
/// # Example
///
/// ```rust
/// use llmtrace_optimizer::task::{MemoryTaskStore, ModelConfig, Task, TaskStore};
///
/// # async fn example() -> llmtrace_optimizer::Result<()> {
/// let store = MemoryTaskStore::new();
/// store.insert(Task::builder("t-1", ModelConfig::new("p", "m", 0.0, 16)).build());
/// assert_eq!(store.get_task("t-1").await?.id(), "t-1");
/// # Ok(())
/// # }
/// ```
pub struct MemoryTaskStore {
    tasks: DashMap<String, Task>,
}

impl MemoryTaskStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    /// Insert or replace a task.
    pub fn insert(&self, task: Task) {
        self.tasks.insert(task.id().to_string(), task);
    }

    /// Remove a task, returning it if present.
    pub fn remove(&self, task_id: &str) -> Option<Task> {
        self.tasks.remove(task_id).map(|(_, task)| task)
    }

    /// Get the number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Task> for MemoryTaskStore {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        let store = Self::new();
        for task in iter {
            store.insert(task);
        }
        store
    }
}

impl TaskStore for MemoryTaskStore {
    async fn get_task(&self, task_id: &str) -> Result<Task> {
        self.tasks
            .get(task_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))
    }
}
