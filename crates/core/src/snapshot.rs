//! Collection snapshots.

use crate::id::TaskId;
use crate::task::Task;
use crate::Time;

/// The full task collection as returned by one successful list fetch.
///
/// Order is the server's and is never changed locally. A snapshot is
/// replaced wholesale after every mutation; it is never patched in place.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSnapshot {
    tasks: Vec<Task>,
    fetched_at: Time,
}

impl CollectionSnapshot {
    /// Capture a freshly fetched collection.
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            fetched_at: chrono::Utc::now(),
        }
    }

    /// Tasks in server order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// When the collection was fetched.
    pub fn fetched_at(&self) -> Time {
        self.fetched_at
    }

    /// Look up a task by id.
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of completed tasks.
    pub fn completed(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }
}
