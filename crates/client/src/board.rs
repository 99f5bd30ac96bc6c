//! Task board - the collection snapshot shown to the user.
//!
//! Every successful mutation is followed by a full reload; the snapshot is
//! only ever replaced, never patched. Mutations on the same task are not
//! allowed to overlap: a second one fails fast with [`ApiError::Busy`]
//! until the first has finished, which rules out lost updates from the
//! fetch-then-write sequences.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use tareas_core::{render, BoardView, CollectionSnapshot, Task, TaskId};
use tracing::debug;
use crate::error::{ApiError, Result};
use crate::tasks::{Confirmation, TaskService};

/// Holds the last fetched collection and performs mutations on it.
pub struct TaskBoard<S: TaskService> {
    service: S,
    snapshot: Mutex<Option<CollectionSnapshot>>,
    in_flight: Mutex<HashSet<TaskId>>,
}

/// Marks a task busy until dropped.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<TaskId>>,
    id: TaskId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl<S: TaskService> TaskBoard<S> {
    /// Create an empty board over `service`.
    pub fn new(service: S) -> Self {
        Self {
            service,
            snapshot: Mutex::new(None),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// The underlying task service.
    pub fn service(&self) -> &S {
        &self.service
    }

    /// The last fetched collection, if any.
    pub fn snapshot(&self) -> Option<CollectionSnapshot> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The rendered view of the last fetched collection.
    pub fn view(&self) -> Option<BoardView> {
        self.snapshot().as_ref().map(render)
    }

    /// Forget the collection, e.g. after logging out.
    pub fn clear(&self) {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Whether a mutation on `id` is in progress.
    pub fn is_busy(&self, id: TaskId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    /// Fetch the collection and replace the snapshot with it.
    pub async fn refresh(&self) -> Result<CollectionSnapshot> {
        let tasks = self.settle(self.service.list().await)?;
        let snapshot = CollectionSnapshot::new(tasks);
        debug!("Loaded {} tasks", snapshot.len());

        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Create a task.
    pub async fn create(&self, title: &str, description: &str) -> Result<CollectionSnapshot> {
        let outcome = self.service.create(title, description).await;
        self.reload_after(outcome).await
    }

    /// Change title and/or description of a task.
    pub async fn edit(
        &self,
        id: TaskId,
        title: Option<String>,
        description: Option<String>,
    ) -> Result<CollectionSnapshot> {
        let _guard = self.claim(id)?;
        let outcome = self.edit_remote(id, title, description).await;
        self.reload_after(outcome).await
    }

    /// Flip the completed flag of a task.
    pub async fn toggle(&self, id: TaskId) -> Result<CollectionSnapshot> {
        let _guard = self.claim(id)?;
        let outcome = self.service.toggle_completed(id).await;
        self.reload_after(outcome).await
    }

    /// Delete a task.
    pub async fn remove(&self, id: TaskId, confirmation: Confirmation) -> Result<CollectionSnapshot> {
        let _guard = self.claim(id)?;
        let outcome = self.service.remove(id, confirmation).await;
        self.reload_after(outcome).await
    }

    /// Assign a collaborator.
    pub async fn assign(&self, id: TaskId, email: &str) -> Result<CollectionSnapshot> {
        let _guard = self.claim(id)?;
        let outcome = self.service.assign(id, email).await;
        self.reload_after(outcome).await
    }

    /// Unassign a collaborator.
    pub async fn unassign(&self, id: TaskId, email: &str) -> Result<CollectionSnapshot> {
        let _guard = self.claim(id)?;
        let outcome = self.service.unassign(id, email).await;
        self.reload_after(outcome).await
    }

    async fn edit_remote(
        &self,
        id: TaskId,
        title: Option<String>,
        description: Option<String>,
    ) -> Result<Task> {
        let current = self.service.get(id).await?;
        self.service
            .update(id, &current.with_changes(title, description))
            .await
    }

    async fn reload_after<T>(&self, outcome: Result<T>) -> Result<CollectionSnapshot> {
        self.settle(outcome)?;
        self.refresh().await
    }

    fn claim(&self, id: TaskId) -> Result<InFlightGuard<'_>> {
        let mut busy = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !busy.insert(id) {
            return Err(ApiError::Busy(id));
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            id,
        })
    }

    /// Drop the snapshot as soon as the session is gone.
    fn settle<T>(&self, outcome: Result<T>) -> Result<T> {
        if let Err(e) = &outcome {
            if e.is_auth() {
                self.clear();
            }
        }
        outcome
    }
}
