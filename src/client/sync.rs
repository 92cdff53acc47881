//! Optimistic synchronization between [`TaskListState`] and a [`TaskApi`].
//!
//! Every mutation follows the same discipline: snapshot, apply locally, call
//! the server, then reconcile with its answer or restore the snapshot. The
//! caller gets the error to show to the user; nothing is retried.

use super::{ClientError, SyncStatus, TaskApi, TaskListState};
use crate::tasks::Task;

pub struct TaskListSync<A> {
    api: A,
    state: TaskListState,
}

impl<A: TaskApi> TaskListSync<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: TaskListState::new(),
        }
    }

    pub fn state(&self) -> &TaskListState {
        &self.state
    }

    pub fn tasks(&self) -> &[Task] {
        self.state.tasks()
    }

    pub fn status(&self) -> SyncStatus {
        self.state.status()
    }

    /// Load the authoritative list from the server.
    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        let tasks = self.api.list().await?;
        self.state.replace(tasks);
        Ok(())
    }

    pub async fn add(&mut self, text: &str) -> Result<Task, ClientError> {
        let snapshot = self.state.begin();
        let temp_id = self.state.apply_add(text);

        match self.api.create(text).await {
            Ok(task) => {
                self.state.confirm_created(temp_id, task.clone());
                self.state.commit();
                Ok(task)
            }
            Err(e) => {
                tracing::warn!("add failed, rolling back: {e}");
                self.state.rollback(snapshot);
                Err(e)
            }
        }
    }

    pub async fn toggle(&mut self, id: i64) -> Result<Task, ClientError> {
        let snapshot = self.state.begin();
        self.state.apply_toggle(id);

        match self.api.toggle(id).await {
            Ok(task) => {
                self.state.confirm_updated(task.clone());
                self.state.commit();
                Ok(task)
            }
            Err(e) => {
                tracing::warn!(task_id = id, "toggle failed, rolling back: {e}");
                self.state.rollback(snapshot);
                Err(e)
            }
        }
    }

    pub async fn delete(&mut self, id: i64) -> Result<(), ClientError> {
        let snapshot = self.state.begin();
        self.state.apply_delete(id);

        match self.api.delete(id).await {
            Ok(()) => {
                self.state.commit();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(task_id = id, "delete failed, rolling back: {e}");
                self.state.rollback(snapshot);
                Err(e)
            }
        }
    }

    /// Reorder to `ordered_ids`; on failure the previous order is restored.
    pub async fn reorder(&mut self, ordered_ids: &[i64]) -> Result<(), ClientError> {
        let snapshot = self.state.begin();
        self.state.apply_reorder(ordered_ids);

        match self.api.reorder(ordered_ids).await {
            Ok(()) => {
                self.state.commit();
                Ok(())
            }
            Err(e) => {
                tracing::warn!("reorder failed, restoring previous order: {e}");
                self.state.rollback(snapshot);
                Err(e)
            }
        }
    }

    /// Move one task to `to_index` and send the resulting full order.
    pub async fn move_task(&mut self, id: i64, to_index: usize) -> Result<(), ClientError> {
        let order = self
            .state
            .order_with_move(id, to_index)
            .ok_or(ClientError::UnknownTask(id))?;
        self.reorder(&order).await
    }
}
