//! The single in-memory copy of the task list.
//!
//! Mutations are applied here before the server has answered. Each one is
//! bracketed by [`TaskListState::begin`], which captures a [`Snapshot`], and
//! either [`TaskListState::commit`] or [`TaskListState::rollback`].

use crate::tasks::{merge_order, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    /// A local change is applied and waiting for the server.
    PendingMutation,
}

/// The list as it was before a mutation started.
#[derive(Debug, Clone)]
#[must_use = "a snapshot is needed to roll back a failed mutation"]
pub struct Snapshot {
    tasks: Vec<Task>,
    next_temp_id: i64,
}

#[derive(Debug, Default)]
pub struct TaskListState {
    tasks: Vec<Task>,
    status: SyncStatus,
    /// Unsaved tasks get negative ids until the server assigns a real one.
    next_temp_id: i64,
}

impl TaskListState {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            status: SyncStatus::Idle,
            next_temp_id: -1,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn get(&self, id: i64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Replace the list with the server's authoritative copy.
    pub fn replace(&mut self, mut tasks: Vec<Task>) {
        tasks.sort_by_key(|t| (t.position, t.id));
        self.tasks = tasks;
        self.status = SyncStatus::Idle;
    }

    pub fn begin(&mut self) -> Snapshot {
        self.status = SyncStatus::PendingMutation;
        Snapshot {
            tasks: self.tasks.clone(),
            next_temp_id: self.next_temp_id,
        }
    }

    pub fn commit(&mut self) {
        self.status = SyncStatus::Idle;
    }

    pub fn rollback(&mut self, snapshot: Snapshot) {
        self.tasks = snapshot.tasks;
        self.next_temp_id = snapshot.next_temp_id;
        self.status = SyncStatus::Idle;
    }

    /// Append a placeholder task and return its temporary id.
    pub fn apply_add(&mut self, text: &str) -> i64 {
        if self.next_temp_id >= 0 {
            self.next_temp_id = -1;
        }
        let id = self.next_temp_id;
        self.next_temp_id -= 1;

        let position = self.tasks.iter().map(|t| t.position).max().map_or(0, |p| p + 1);
        self.tasks.push(Task {
            id,
            text: text.trim().to_string(),
            completed: false,
            position,
        });
        id
    }

    /// Swap a placeholder for the task the server created.
    pub fn confirm_created(&mut self, temp_id: i64, task: Task) {
        match self.tasks.iter_mut().find(|t| t.id == temp_id) {
            Some(slot) => *slot = task,
            None => self.tasks.push(task),
        }
    }

    /// Overwrite a task with the server's copy.
    pub fn confirm_updated(&mut self, task: Task) {
        if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task.id) {
            *slot = task;
        }
    }

    /// Returns whether the task was present.
    pub fn apply_toggle(&mut self, id: i64) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.completed = !task.completed;
                true
            }
            None => false,
        }
    }

    /// Returns whether the task was present. Positions of the rest are kept.
    pub fn apply_delete(&mut self, id: i64) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    /// Reorder the same way the server does and renumber densely.
    pub fn apply_reorder(&mut self, ordered_ids: &[i64]) {
        let current: Vec<i64> = self.tasks.iter().map(|t| t.id).collect();
        let (order, _) = merge_order(&current, ordered_ids);

        let mut reordered = Vec::with_capacity(self.tasks.len());
        for (position, id) in order.iter().enumerate() {
            if let Some(idx) = self.tasks.iter().position(|t| t.id == *id) {
                let mut task = self.tasks.swap_remove(idx);
                task.position = position as i64;
                reordered.push(task);
            }
        }
        self.tasks = reordered;
    }

    /// Full id order after moving `id` to `to_index` (clamped to the end).
    pub fn order_with_move(&self, id: i64, to_index: usize) -> Option<Vec<i64>> {
        let mut ids: Vec<i64> = self.tasks.iter().map(|t| t.id).collect();
        let from = ids.iter().position(|t| *t == id)?;
        ids.remove(from);
        let to = to_index.min(ids.len());
        ids.insert(to, id);
        Some(ids)
    }
}
