//! SQLite-backed task store.
//!
//! Every query carries the owning account id in its predicate, so a row that
//! belongs to another account behaves exactly like a missing row.

use super::{merge_order, ReorderSummary, Task};
use crate::error::{Result, TodoError};
use crate::storage::{epoch_secs, Database};

const TASK_COLUMNS: &str = "id, text, completed, position";

pub struct TaskStore {
    db: Database,
}

impl TaskStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// All tasks of `account_id`, in display order.
    pub fn list(&self, account_id: i64) -> Result<Vec<Task>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE account_id = ?1 ORDER BY position ASC, id ASC"
        ))?;
        let tasks = stmt
            .query_map(rusqlite::params![account_id], row_to_task)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Append a task after the current maximum position (0 for an empty list).
    pub fn create(&self, account_id: i64, text: &str) -> Result<Task> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TodoError::Validation("Task text is required".into()));
        }

        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO tasks (account_id, text, completed, position, created_at)
             SELECT ?1, ?2, 0, COALESCE(MAX(position), -1) + 1, ?3
             FROM tasks WHERE account_id = ?1",
            rusqlite::params![account_id, text, epoch_secs()],
        )?;
        let id = conn.last_insert_rowid();
        let task = fetch_owned(&conn, account_id, id)?
            .ok_or_else(|| TodoError::Internal(format!("task {id} vanished after insert")))?;

        tracing::debug!(account_id, task_id = id, position = task.position, "task created");
        Ok(task)
    }

    /// Flip the completion flag and return the updated task.
    pub fn toggle(&self, account_id: i64, task_id: i64) -> Result<Task> {
        let conn = self.db.lock();
        let changed = conn.execute(
            "UPDATE tasks SET completed = NOT completed WHERE id = ?1 AND account_id = ?2",
            rusqlite::params![task_id, account_id],
        )?;
        if changed == 0 {
            return Err(not_found(task_id));
        }
        fetch_owned(&conn, account_id, task_id)?.ok_or_else(|| not_found(task_id))
    }

    /// Remove a task. Remaining positions are left as they are.
    pub fn delete(&self, account_id: i64, task_id: i64) -> Result<()> {
        let conn = self.db.lock();
        let deleted = conn.execute(
            "DELETE FROM tasks WHERE id = ?1 AND account_id = ?2",
            rusqlite::params![task_id, account_id],
        )?;
        if deleted == 0 {
            return Err(not_found(task_id));
        }
        tracing::debug!(account_id, task_id, "task deleted");
        Ok(())
    }

    /// Rewrite every position of the account in one transaction.
    ///
    /// Owned ids from `ordered_ids` take positions `0..k` in the given order.
    /// Repeated ids count once, ids the account does not own are skipped, and
    /// owned tasks missing from the input follow in their previous order.
    pub fn reorder(&self, account_id: i64, ordered_ids: &[i64]) -> Result<ReorderSummary> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;

        let current: Vec<i64> = {
            let mut stmt = tx.prepare(
                "SELECT id FROM tasks WHERE account_id = ?1 ORDER BY position ASC, id ASC",
            )?;
            let ids = stmt
                .query_map(rusqlite::params![account_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            ids
        };
        let (final_order, applied) = merge_order(&current, ordered_ids);

        {
            let mut stmt =
                tx.prepare("UPDATE tasks SET position = ?1 WHERE id = ?2 AND account_id = ?3")?;
            for (position, id) in final_order.iter().enumerate() {
                stmt.execute(rusqlite::params![position as i64, id, account_id])?;
            }
        }
        tx.commit()?;

        let summary = ReorderSummary {
            applied,
            appended: final_order.len() - applied,
            skipped: ordered_ids.len() - applied,
        };
        if summary.skipped > 0 || summary.appended > 0 {
            tracing::debug!(
                account_id,
                skipped = summary.skipped,
                appended = summary.appended,
                "reorder input was not a permutation"
            );
        }
        Ok(summary)
    }
}

fn fetch_owned(
    conn: &rusqlite::Connection,
    account_id: i64,
    task_id: i64,
) -> Result<Option<Task>> {
    let row = conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND account_id = ?2"),
        rusqlite::params![task_id, account_id],
        row_to_task,
    );
    match row {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        text: row.get(1)?,
        completed: row.get(2)?,
        position: row.get(3)?,
    })
}

fn not_found(task_id: i64) -> TodoError {
    TodoError::NotFound(format!("Task {task_id} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        db: Database,
        tasks: TaskStore,
        alice: i64,
        bob: i64,
    }

    fn fixture() -> Fixture {
        let db = Database::in_memory().unwrap();
        // Accounts are inserted directly to skip the slow password hash.
        let insert = |name: &str| {
            let conn = db.lock();
            conn.execute(
                "INSERT INTO accounts (username, password_hash, salt, created_at) VALUES (?1, 'h', 's', 0)",
                rusqlite::params![name],
            )
            .unwrap();
            conn.last_insert_rowid()
        };
        let alice = insert("alice");
        let bob = insert("bob");
        Fixture {
            tasks: TaskStore::new(db.clone()),
            db,
            alice,
            bob,
        }
    }

    fn ids(tasks: &[Task]) -> Vec<i64> {
        tasks.iter().map(|t| t.id).collect()
    }

    fn positions(tasks: &[Task]) -> Vec<i64> {
        tasks.iter().map(|t| t.position).collect()
    }

    #[test]
    fn create_assigns_next_position() {
        let f = fixture();

        let first = f.tasks.create(f.alice, "buy milk").unwrap();
        let second = f.tasks.create(f.alice, "walk dog").unwrap();
        assert_eq!(first.position, 0);
        assert_eq!(second.position, 1);
        assert!(!first.completed);
        assert_eq!(first.text, "buy milk");

        // Positions are per account.
        let other = f.tasks.create(f.bob, "bob's first").unwrap();
        assert_eq!(other.position, 0);
    }

    #[test]
    fn create_uses_max_position_not_count() {
        let f = fixture();
        let a = f.tasks.create(f.alice, "a").unwrap();
        f.tasks.create(f.alice, "b").unwrap();
        f.tasks.create(f.alice, "c").unwrap();
        f.tasks.delete(f.alice, a.id).unwrap();

        let d = f.tasks.create(f.alice, "d").unwrap();
        assert_eq!(d.position, 3);
    }

    #[test]
    fn create_rejects_blank_text() {
        let f = fixture();
        assert!(matches!(
            f.tasks.create(f.alice, ""),
            Err(TodoError::Validation(_))
        ));
        assert!(matches!(
            f.tasks.create(f.alice, "   "),
            Err(TodoError::Validation(_))
        ));
        assert!(f.tasks.list(f.alice).unwrap().is_empty());
    }

    #[test]
    fn toggle_twice_restores_original() {
        let f = fixture();
        let task = f.tasks.create(f.alice, "a").unwrap();

        let once = f.tasks.toggle(f.alice, task.id).unwrap();
        assert!(once.completed);
        let twice = f.tasks.toggle(f.alice, task.id).unwrap();
        assert_eq!(twice.completed, task.completed);
    }

    #[test]
    fn delete_removes_and_repeat_is_not_found() {
        let f = fixture();
        let a = f.tasks.create(f.alice, "a").unwrap();
        let b = f.tasks.create(f.alice, "b").unwrap();

        f.tasks.delete(f.alice, a.id).unwrap();
        let remaining = f.tasks.list(f.alice).unwrap();
        assert_eq!(ids(&remaining), vec![b.id]);
        // No compaction on delete.
        assert_eq!(remaining[0].position, 1);

        assert!(matches!(
            f.tasks.delete(f.alice, a.id),
            Err(TodoError::NotFound(_))
        ));
    }

    #[test]
    fn foreign_tasks_are_invisible() {
        let f = fixture();
        let task = f.tasks.create(f.alice, "private").unwrap();

        assert!(f.tasks.list(f.bob).unwrap().is_empty());
        assert!(matches!(
            f.tasks.toggle(f.bob, task.id),
            Err(TodoError::NotFound(_))
        ));
        assert!(matches!(
            f.tasks.delete(f.bob, task.id),
            Err(TodoError::NotFound(_))
        ));

        let still_there = f.tasks.list(f.alice).unwrap();
        assert_eq!(still_there.len(), 1);
        assert!(!still_there[0].completed);
    }

    #[test]
    fn reorder_permutation_rewrites_positions() {
        let f = fixture();
        let a = f.tasks.create(f.alice, "a").unwrap();
        let b = f.tasks.create(f.alice, "b").unwrap();
        let c = f.tasks.create(f.alice, "c").unwrap();

        let summary = f.tasks.reorder(f.alice, &[c.id, a.id, b.id]).unwrap();
        assert_eq!(summary.applied, 3);
        assert_eq!(summary.appended, 0);
        assert_eq!(summary.skipped, 0);

        let listed = f.tasks.list(f.alice).unwrap();
        assert_eq!(ids(&listed), vec![c.id, a.id, b.id]);
        assert_eq!(positions(&listed), vec![0, 1, 2]);
    }

    #[test]
    fn reorder_appends_omitted_tasks_densely() {
        let f = fixture();
        let a = f.tasks.create(f.alice, "a").unwrap();
        let b = f.tasks.create(f.alice, "b").unwrap();
        let c = f.tasks.create(f.alice, "c").unwrap();
        let d = f.tasks.create(f.alice, "d").unwrap();

        let summary = f.tasks.reorder(f.alice, &[d.id, b.id]).unwrap();
        assert_eq!(summary.applied, 2);
        assert_eq!(summary.appended, 2);

        let listed = f.tasks.list(f.alice).unwrap();
        assert_eq!(ids(&listed), vec![d.id, b.id, a.id, c.id]);
        assert_eq!(positions(&listed), vec![0, 1, 2, 3]);
    }

    #[test]
    fn reorder_skips_foreign_unknown_and_repeated_ids() {
        let f = fixture();
        let a = f.tasks.create(f.alice, "a").unwrap();
        let b = f.tasks.create(f.alice, "b").unwrap();
        let foreign = f.tasks.create(f.bob, "bob").unwrap();

        let summary = f
            .tasks
            .reorder(f.alice, &[foreign.id, b.id, 9_999, b.id, a.id])
            .unwrap();
        assert_eq!(summary.applied, 2);
        assert_eq!(summary.skipped, 3);

        assert_eq!(ids(&f.tasks.list(f.alice).unwrap()), vec![b.id, a.id]);
        // Bob's row is untouched.
        let bobs = f.tasks.list(f.bob).unwrap();
        assert_eq!(bobs[0].position, 0);
    }

    #[test]
    fn reorder_compacts_gaps_left_by_delete() {
        let f = fixture();
        let a = f.tasks.create(f.alice, "a").unwrap();
        let b = f.tasks.create(f.alice, "b").unwrap();
        let c = f.tasks.create(f.alice, "c").unwrap();
        f.tasks.delete(f.alice, b.id).unwrap();

        f.tasks.reorder(f.alice, &[c.id, a.id]).unwrap();
        assert_eq!(positions(&f.tasks.list(f.alice).unwrap()), vec![0, 1]);
    }

    #[test]
    fn reorder_is_all_or_nothing() {
        let f = fixture();
        let a = f.tasks.create(f.alice, "a").unwrap();
        let b = f.tasks.create(f.alice, "b").unwrap();
        let c = f.tasks.create(f.alice, "c").unwrap();

        // Fail the last update of the batch.
        f.db.lock()
            .execute_batch(
                "CREATE TRIGGER fail_third BEFORE UPDATE OF position ON tasks
                 WHEN NEW.position = 2
                 BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
            )
            .unwrap();

        let result = f.tasks.reorder(f.alice, &[c.id, a.id, b.id]);
        assert!(matches!(result, Err(TodoError::Internal(_))));

        let listed = f.tasks.list(f.alice).unwrap();
        assert_eq!(ids(&listed), vec![a.id, b.id, c.id]);
        assert_eq!(positions(&listed), vec![0, 1, 2]);
    }

    #[test]
    fn reorder_of_empty_list_is_noop() {
        let f = fixture();
        let summary = f.tasks.reorder(f.alice, &[]).unwrap();
        assert_eq!(summary, ReorderSummary::default());
    }
}
